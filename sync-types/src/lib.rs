//! # sync-types
//!
//! Wire format and identity types for the Canopy hash-tree sync engine.
//!
//! This crate provides the foundational types used across all Canopy crates:
//! - [`SyncableId`], [`SyncablePath`], [`StorageRootId`] - Addressing types
//! - [`ItemHash`], [`SyncableItemMetadata`] - Content-addressed item records
//! - [`StructHashes`], [`PullItem`] - The replica-to-replica diff exchange
//! - [`Glob`] - Subtree scoping for hashing and pulls
//! - [`SyncError`] - Error taxonomy
//!
//! Everything here is I/O-free. The types that cross the wire between
//! replicas ([`StructHashes`], [`PullItem`]) carry a MessagePack codec.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod glob;
mod hash;
mod ids;
mod metadata;
mod path;
mod pull;
mod tree;

pub use error::SyncError;
pub use glob::{Glob, Pattern, Segment};
pub use hash::ItemHash;
pub use ids::{
    ItemKind, RemoteId, StorageRootId, SyncableId, ACCESS_BUNDLE_NAME, CHANGES_BUNDLE_NAME,
};
pub use metadata::{Provenance, SyncableItemMetadata};
pub use path::SyncablePath;
pub use pull::PullItem;
pub use tree::StructHashes;
