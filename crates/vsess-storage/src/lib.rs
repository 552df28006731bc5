//! Local storage for the video session service.
//!
//! This crate provides:
//! - Streaming upload persistence under the storage root
//! - A staging area and atomic artifact publication
//! - Artifact lookup for download
//! - The asset registry trait and its in-memory implementation

pub mod error;
pub mod fs_utils;
pub mod local;
pub mod registry;

pub use error::{StorageError, StorageResult};
pub use local::{LocalStore, StoredUpload, UploadWriter};
pub use registry::{AssetRegistry, InMemoryRegistry};
