//! Generated image records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ImageId, UserId};

/// A stored image generated for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Image id.
    pub id: ImageId,
    /// Owner.
    pub user_id: UserId,
    /// Object path inside the storage bucket (`<user_id>/<file>`).
    pub storage_path: String,
    /// The prompt that produced the image.
    pub prompt: String,
    /// Image model identifier.
    pub model: String,
    /// Credits debited for the generation.
    pub cost: i64,
    /// When the image was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for the atomic "record image and debit credits" operation.
#[derive(Debug, Clone)]
pub struct NewImage {
    /// Image id to assign.
    pub id: ImageId,
    /// Owner, whose balance is debited.
    pub user_id: UserId,
    /// Object path of the already-uploaded image.
    pub storage_path: String,
    /// Prompt text.
    pub prompt: String,
    /// Image model identifier.
    pub model: String,
    /// Credits to debit.
    pub cost: i64,
}

impl NewImage {
    /// Build the record persisted for this image.
    #[must_use]
    pub fn into_record(self) -> ImageRecord {
        ImageRecord {
            id: self.id,
            user_id: self.user_id,
            storage_path: self.storage_path,
            prompt: self.prompt,
            model: self.model,
            cost: self.cost,
            created_at: Utc::now(),
        }
    }
}

/// Build the storage object path for a new image.
///
/// Objects are grouped per user so bucket policies can scope access by prefix.
#[must_use]
pub fn storage_path(user_id: &UserId, image_id: &ImageId, extension: &str) -> String {
    format!("{user_id}/{image_id}.{extension}")
}

/// Map an image content type to a file extension, defaulting to `png`.
#[must_use]
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    match essence {
        "image/jpeg" | "image/jpg" => "jpeg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
