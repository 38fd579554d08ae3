//! Media payloads and the collaborators that hold them
//!
//! - `Blob`: in-memory bytes tagged with a MIME type and a file name
//! - `LocalReferences`: revocable local URLs for in-process playback
//! - `Uploader`: hands a blob to durable storage and returns its URL

pub mod blob;
pub mod local_ref;
pub mod upload;

pub use blob::{mime_from_extension, Blob, BlobInfo};
pub use local_ref::{LocalRef, LocalReferences, ObjectUrlRegistry, PlaybackRef};
pub use upload::{DirectoryUploader, Uploader};
