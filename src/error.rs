use std::path::PathBuf;

use thiserror::Error;

use crate::messages::MessageId;

pub type GalleryResult<T> = std::result::Result<T, GalleryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select at least one category")]
    EmptyCategories,
    #[error("message text cannot be empty")]
    EmptyText,
}

#[derive(Debug, Clone, Error)]
pub enum GalleryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("none of the selected messages can be deleted (they are built-in)")]
    NothingDeletable,
    #[error("could not load messages from {}: {reason}", path.display())]
    CatalogLoad { path: PathBuf, reason: String },
    #[error("message #{0} is built-in and cannot be changed")]
    NotCustom(MessageId),
    #[error("message #{0} not found")]
    NotFound(MessageId),
    #[error("failed to persist {key}: {reason}")]
    Persistence { key: &'static str, reason: String },
}

impl GalleryError {
    /// Errors the user caused and can fix; everything else is an environment problem.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            GalleryError::Validation(_)
                | GalleryError::NothingDeletable
                | GalleryError::NotCustom(_)
                | GalleryError::NotFound(_)
        )
    }
}
