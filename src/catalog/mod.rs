use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{GalleryError, GalleryResult};
use crate::messages::Message;

/// Reads the built-in message catalog.
///
/// Any failure comes back as [`GalleryError::CatalogLoad`] so the caller can show
/// it in place of the gallery.
pub fn load_catalog(path: &Path) -> GalleryResult<Vec<Message>> {
    let raw = fs::read_to_string(path).map_err(|err| GalleryError::CatalogLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let messages = parse_catalog(&raw).map_err(|reason| GalleryError::CatalogLoad {
        path: path.to_path_buf(),
        reason,
    })?;
    tracing::info!(count = messages.len(), path = %path.display(), "catalog loaded");
    Ok(messages)
}

pub fn parse_catalog(raw: &str) -> Result<Vec<Message>, String> {
    let mut messages: Vec<Message> =
        serde_json::from_str(raw).map_err(|err| format!("malformed catalog: {err}"))?;
    let mut seen = HashSet::with_capacity(messages.len());
    for message in &mut messages {
        message.is_custom = false;
        if message.categories.is_empty() {
            tracing::warn!(id = message.id, "catalog message has no category");
        }
        if !seen.insert(message.id) {
            tracing::warn!(id = message.id, "duplicate catalog id");
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn parses_both_category_shapes() {
        let raw = r#"[
            {"id": 1, "text": "Te quiero", "category": "amor"},
            {"id": 2, "text": "Gracias", "categories": ["amistad", "familia"]},
            {"id": 3, "text": "Sneaky", "category": "amor", "isCustom": true}
        ]"#;
        let messages = parse_catalog(raw).expect("catalog");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].primary_category(), Some("amor"));
        assert_eq!(messages[1].categories.len(), 2);
        assert!(messages.iter().all(|m| !m.is_custom));
    }

    #[test]
    fn malformed_catalog_is_reported_not_panicked() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("messages.json");
        fs::write(&path, "{\"id\": 1")?;

        assert_matches!(load_catalog(&path), Err(GalleryError::CatalogLoad { .. }));
        Ok(())
    }

    #[test]
    fn missing_catalog_names_the_path() {
        let err = load_catalog(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
        assert!(!err.is_user_facing());
    }
}
