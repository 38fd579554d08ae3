use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::draft::{StoryDraft, StoryType};
use crate::error::StoryError;
use crate::media::{Blob, Uploader};

/// A submitted village story
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub story_type: Option<StoryType>,
    pub village_name: String,
    pub state: String,
    pub language: String,
    pub author_name: String,
    pub author_age: Option<u8>,
    pub voice_description: String,
    pub tags: Vec<String>,
    /// Durable URLs of the uploaded images, in submission order
    pub images: Vec<String>,
    pub voice_recording_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validate a draft, upload its media and build the story record
///
/// Images are uploaded in order, then the voice recording. Files that are
/// not images are skipped.
pub async fn submit(
    draft: StoryDraft,
    images: &[Blob],
    voice_recording: Option<&Blob>,
    uploader: &dyn Uploader,
) -> Result<Story, StoryError> {
    let author_age = draft.validate()?;

    let mut image_urls = Vec::with_capacity(images.len());
    for image in images {
        if !image.is_image() {
            warn!("Skipping {} ({}): not an image", image.name(), image.mime_type());
            continue;
        }
        image_urls.push(upload(uploader, image).await?);
    }

    let voice_recording_url = match voice_recording {
        Some(recording) => Some(upload(uploader, recording).await?),
        None => None,
    };

    let story = Story {
        id: Uuid::new_v4(),
        title: draft.title.trim().to_string(),
        content: draft.content,
        story_type: draft.story_type,
        village_name: draft.village_name.trim().to_string(),
        state: draft.state.trim().to_string(),
        language: draft.language,
        author_name: draft.author_name.trim().to_string(),
        author_age,
        voice_description: draft.voice_description,
        tags: draft.tags,
        images: image_urls,
        voice_recording_url,
        created_at: Utc::now(),
    };

    info!(
        "Story {} submitted from {} ({} images, voice: {})",
        story.id,
        story.village_name,
        story.images.len(),
        story.voice_recording_url.is_some()
    );

    Ok(story)
}

async fn upload(uploader: &dyn Uploader, blob: &Blob) -> Result<String, StoryError> {
    uploader.upload(blob).await.map_err(|e| StoryError::Upload {
        name: blob.name().to_string(),
        message: format!("{:#}", e),
    })
}
