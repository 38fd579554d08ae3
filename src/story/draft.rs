use serde::{Deserialize, Serialize};

use crate::error::StoryError;

/// States offered by the submission form
pub const INDIAN_STATES: [&str; 28] = [
    "Andhra Pradesh", "Arunachal Pradesh", "Assam", "Bihar", "Chhattisgarh", "Goa",
    "Gujarat", "Haryana", "Himachal Pradesh", "Jharkhand", "Karnataka", "Kerala",
    "Madhya Pradesh", "Maharashtra", "Manipur", "Meghalaya", "Mizoram", "Nagaland",
    "Odisha", "Punjab", "Rajasthan", "Sikkim", "Tamil Nadu", "Telangana", "Tripura",
    "Uttar Pradesh", "Uttarakhand", "West Bengal",
];

pub const DEFAULT_LANGUAGE: &str = "Telugu";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryType {
    Festival,
    Tradition,
    Food,
    Legend,
    Memory,
    DailyLife,
    Craft,
    Song,
    Proverb,
    FolkTale,
}

/// A story as it is being filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryDraft {
    pub title: String,
    pub content: String,
    pub story_type: Option<StoryType>,
    pub village_name: String,
    pub state: String,
    pub language: String,
    pub author_name: String,
    /// Raw form input; parsed on validation
    pub author_age: String,
    pub voice_description: String,
    pub tags: Vec<String>,
}

impl Default for StoryDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            story_type: None,
            village_name: String::new(),
            state: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            author_name: String::new(),
            author_age: String::new(),
            voice_description: String::new(),
            tags: Vec::new(),
        }
    }
}

impl StoryDraft {
    /// Add a trimmed tag; blank and duplicate tags are ignored
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    /// Check required fields and return the parsed author age
    pub fn validate(&self) -> Result<Option<u8>, StoryError> {
        let required = [
            ("title", &self.title),
            ("village_name", &self.village_name),
            ("state", &self.state),
            ("author_name", &self.author_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StoryError::MissingField(field));
            }
        }

        if !INDIAN_STATES.contains(&self.state.trim()) {
            return Err(StoryError::UnknownState(self.state.clone()));
        }

        parse_age(&self.author_age)
    }
}

fn parse_age(raw: &str) -> Result<Option<u8>, StoryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u8>() {
        Ok(age) if (1..=120).contains(&age) => Ok(Some(age)),
        _ => Err(StoryError::InvalidAge(raw.to_string())),
    }
}
