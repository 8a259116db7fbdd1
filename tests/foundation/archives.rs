//! Integration tests for the memory archivers
//!
//! Tests mixed-type round-trips and the seek/patch pattern the package
//! saver relies on.

use stowage_foundation::{Archive, MemoryReader, MemoryWriter};

#[test]
fn mixed_payload_round_trips() {
    let mut writer = MemoryWriter::new();
    let mut flag = true;
    let mut count = 42u32;
    let mut offset = -7i64;
    let mut label = String::from("HeroMesh");
    let mut blob = vec![1u8, 2, 3, 4, 5];

    writer.serialize_bool(&mut flag).unwrap();
    writer.serialize_u32(&mut count).unwrap();
    writer.serialize_i64(&mut offset).unwrap();
    writer.serialize_string(&mut label).unwrap();
    writer.serialize_blob(&mut blob).unwrap();

    let bytes = writer.into_bytes();
    let mut reader = MemoryReader::new(&bytes);

    let mut flag2 = false;
    let mut count2 = 0u32;
    let mut offset2 = 0i64;
    let mut label2 = String::new();
    let mut blob2 = Vec::new();

    reader.serialize_bool(&mut flag2).unwrap();
    reader.serialize_u32(&mut count2).unwrap();
    reader.serialize_i64(&mut offset2).unwrap();
    reader.serialize_string(&mut label2).unwrap();
    reader.serialize_blob(&mut blob2).unwrap();

    assert!(flag2);
    assert_eq!(count2, 42);
    assert_eq!(offset2, -7);
    assert_eq!(label2, "HeroMesh");
    assert_eq!(blob2, vec![1, 2, 3, 4, 5]);
    assert_eq!(reader.tell(), reader.total_size());
}

#[test]
fn reserve_write_patch() {
    // The two-pass header pattern: reserve space, write the body, seek back
    // and patch the reserved region with the now-known values.
    let mut writer = MemoryWriter::new();
    writer.seek(16).unwrap();

    let mut body = String::from("object data");
    writer.serialize_string(&mut body).unwrap();
    let body_end = writer.tell();

    writer.seek(0).unwrap();
    let mut patched = body_end;
    writer.serialize_u64(&mut patched).unwrap();

    let bytes = writer.into_bytes();
    let mut reader = MemoryReader::new(&bytes);
    let mut recorded = 0u64;
    reader.serialize_u64(&mut recorded).unwrap();
    assert_eq!(recorded, body_end);

    reader.seek(16).unwrap();
    let mut restored = String::new();
    reader.serialize_string(&mut restored).unwrap();
    assert_eq!(restored, "object data");
}

#[test]
fn truncated_stream_surfaces_short_read() {
    let mut writer = MemoryWriter::new();
    let mut label = String::from("truncate me");
    writer.serialize_string(&mut label).unwrap();
    let mut bytes = writer.into_bytes();
    bytes.truncate(bytes.len() - 4);

    let mut reader = MemoryReader::new(&bytes);
    let mut restored = String::new();
    assert!(reader.serialize_string(&mut restored).is_err());
}
