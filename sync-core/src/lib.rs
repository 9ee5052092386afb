//! # sync-core
//!
//! Pure hash-tree diff logic for Canopy (no I/O, instant tests).
//!
//! This crate implements the content-addressing and reconciliation
//! algorithms without any storage or network access:
//! - [`TreeSnapshot`] - an owned, point-in-time view of a subtree
//! - [`snapshot_hashes`] - projecting a snapshot into the [`StructHashes`]
//!   cursor sent to a peer
//! - [`organize_for_pull`] - the diff a replica answers a puller with
//! - [`push_order`] - the trust-boundary-first ordering of child pushes
//!
//! All functions here are **pure**: same input, same output, no side
//! effects. The actual walking of a storage backing and the network
//! round-trips live in `sync-engine`, which feeds snapshots in and
//! interprets the results.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod order;
pub mod snapshot;

pub use diff::organize_for_pull;
pub use order::push_order;
pub use snapshot::{snapshot_hashes, TreeSnapshot};

pub use sync_types::StructHashes;
