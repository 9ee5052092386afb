//! # sync-store
//!
//! Storage backing and locking primitives for the Canopy sync engine.
//!
//! Two concerns live here, both consumed (not orchestrated) by
//! `sync-engine`:
//! - [`StoreBacking`] - the durable item store interface, with
//!   [`MemoryBacking`] as the in-process implementation. Other backings
//!   (browser-local filesystem, cloud object storage) implement the same
//!   trait externally.
//! - [`LockStore`] - keyed mutual exclusion with a lease auto-release,
//!   in three interchangeable flavors: [`InProcessLockStore`],
//!   [`FileLockStore`] and [`CoordinatedLockStore`]. Reentrancy is
//!   tracked through an explicit [`HeldLocks`] context value threaded
//!   through call chains, never global state.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod backing;
pub mod lock;
mod memory;

pub use backing::{BackingEvent, StoreBacking};
pub use lock::{
    with_lock, CoordinatedLockStore, FileLockStore, HeldLocks, InProcessLockStore,
    LockCoordinator, LockStore, LockToken,
};
pub use memory::MemoryBacking;
