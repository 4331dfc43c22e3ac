use serde::{Deserialize, Serialize};

use super::repo::Tag;

#[derive(Debug, Serialize)]
pub struct TagOut {
    pub id: i64,
    pub name: String,
}

impl From<Tag> for TagOut {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

/// Tag item as it appears nested in recipe payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct TagPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteTagRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PatchTagRequest {
    pub name: Option<String>,
}
