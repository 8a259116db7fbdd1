//! Integration tests for name interning
//!
//! Tests handle identity, resolution, and cross-thread interning.

use std::sync::Arc;

use stowage_foundation::NameTable;

#[test]
fn handles_are_stable_across_lookups() {
    let table = NameTable::new();
    let a = table.intern("project://Characters/Hero");
    let b = table.find("project://Characters/Hero").unwrap();
    assert_eq!(a, b);
}

#[test]
fn resolution_survives_many_interns() {
    let table = NameTable::new();
    let names: Vec<_> = (0..500)
        .map(|i| (table.intern(&format!("Asset_{i}")), format!("Asset_{i}")))
        .collect();
    for (name, expected) in names {
        assert_eq!(&*table.resolve(name), expected.as_str());
    }
}

mod properties {
    use proptest::prelude::*;
    use stowage_foundation::NameTable;

    proptest! {
        #[test]
        fn distinct_strings_get_distinct_handles(
            a in "[a-zA-Z0-9_/]{1,24}",
            b in "[a-zA-Z0-9_/]{1,24}",
        ) {
            let table = NameTable::new();
            let name_a = table.intern(&a);
            let name_b = table.intern(&b);
            prop_assert_eq!(name_a == name_b, a == b);
        }
    }
}

#[test]
fn concurrent_interning_converges() {
    let table = Arc::new(NameTable::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                (0..100)
                    .map(|i| table.intern(&format!("Shared_{i}")))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // Every thread must have seen the same handle for the same string.
    for other in &results[1..] {
        assert_eq!(&results[0], other);
    }
    assert_eq!(table.len(), 100);
}
