//! Story drafts and submission
//!
//! The submission form collects text fields, tags, images and the recording
//! from a `RecordingSession`, then hands the media to an `Uploader`.

mod draft;
mod record;

pub use draft::{StoryDraft, StoryType, DEFAULT_LANGUAGE, INDIAN_STATES};
pub use record::{submit, Story};
