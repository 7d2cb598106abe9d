//! Resync: document transfer and cleanup for reMarkable tablets
//!
//! Mirrors local directories onto the tablet's flat, id-keyed document
//! store, pulls documents back out, and cleans the store of trash, orphans,
//! duplicates and empty folders. The store's metadata is read once per run
//! into a [`metadata::MetadataIndex`]; push and pull work on an arena
//! [`tree::DocumentTree`] resolved against it.

pub mod cleanup;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod policy;
pub mod render;
pub mod sync;
pub mod tooling;
pub mod tree;
pub mod types;

pub use error::{Result, SyncError};
