//! The object behavior seam and lifecycle states.

use std::any::Any;

use stowage_foundation::{Archive, Result};

/// Behavior every typed object implements.
///
/// `serialize` is direction-agnostic: the same implementation both saves and
/// loads depending on the archive it is handed, which is what makes lazy
/// loading reuse the save path. The lifecycle hooks are invoked by the
/// garbage collector; `on_marked_garbage` is where held external resources
/// (loader buffers, file handles) must be released.
pub trait Object: Any + Send {
    /// Reads or writes this object's payload through the archive.
    ///
    /// # Errors
    ///
    /// Propagates archive errors (short reads, unresolvable references).
    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()>;

    /// Called once when the object is first marked as garbage.
    fn on_marked_garbage(&mut self) {}

    /// Called by the collector just before the object is destroyed.
    fn on_destroy(&mut self) {}

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Lifecycle state machine: `Live` → `MarkedGarbage` → destroyed.
///
/// There is no variant for "destroyed": destruction frees the slot, and the
/// generation bump makes every outstanding handle stale.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lifecycle {
    /// Object is alive and usable.
    Live,
    /// Object is queued for destruction; still findable until the sweep.
    MarkedGarbage,
}

/// Whether an object's payload has been deserialized yet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoadState {
    /// Payload is populated.
    Loaded,
    /// Shell object: allocated and registered, payload not yet read.
    NeedsLoad,
}
