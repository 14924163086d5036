//! Storage directory access for uploads, downloads and the listing page.
//!
//! All operations act on plain files under their original names. Path
//! traversal is not prevented: names are joined onto the storage directory
//! as submitted.

pub mod store;

pub use store::{FileStore, PendingUpload, StoreError};
