use std::collections::HashSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{GalleryError, GalleryResult, ValidationError};
use crate::storage::Persistence;

pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MessageWire", into = "MessageWire")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub categories: Vec<String>,
    pub is_custom: bool,
}

impl Message {
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|category| category == name)
    }
}

/// On-disk shape. Older records carry a single `category`, newer ones a
/// `categories` list; both are written so either reader understands the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageWire {
    id: MessageId,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default)]
    is_custom: bool,
}

impl From<MessageWire> for Message {
    fn from(wire: MessageWire) -> Self {
        let categories = match (wire.categories, wire.category) {
            (Some(list), _) if !list.is_empty() => list,
            (_, Some(single)) => vec![single],
            _ => Vec::new(),
        };
        Self {
            id: wire.id,
            text: wire.text,
            categories,
            is_custom: wire.is_custom,
        }
    }
}

impl From<Message> for MessageWire {
    fn from(message: Message) -> Self {
        let category = message.categories.first().cloned();
        Self {
            id: message.id,
            text: message.text,
            categories: Some(message.categories),
            category,
            is_custom: message.is_custom,
        }
    }
}

/// Built-in catalog plus user-authored messages.
///
/// Only the custom collection is mutable, and every mutation is written through
/// [`Persistence`] before the call returns.
pub struct MessageStore {
    catalog: Vec<Message>,
    custom: Vec<Message>,
    persistence: Persistence,
}

impl MessageStore {
    pub fn new(catalog: Vec<Message>, persistence: Persistence) -> Self {
        let custom = persistence.load_custom_messages();
        tracing::debug!(
            catalog = catalog.len(),
            custom = custom.len(),
            "message store loaded"
        );
        Self {
            catalog,
            custom,
            persistence,
        }
    }

    /// Custom messages (newest first) followed by the catalog in file order.
    pub fn merged(&self) -> impl Iterator<Item = &Message> + '_ {
        self.custom.iter().chain(self.catalog.iter())
    }

    pub fn len(&self) -> usize {
        self.custom.len() + self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn custom(&self) -> &[Message] {
        &self.custom
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.merged().find(|message| message.id == id)
    }

    pub fn is_custom(&self, id: MessageId) -> bool {
        self.custom.iter().any(|message| message.id == id)
    }

    /// Distinct category names in first-seen merge order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        for message in self.merged() {
            for category in &message.categories {
                seen.insert(category.clone());
            }
        }
        seen.into_iter().collect()
    }

    /// Creates one message per category and returns their ids front-to-back.
    pub fn add(&mut self, text: &str, categories: &[String]) -> GalleryResult<Vec<MessageId>> {
        let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        self.add_at(text, categories, now_ms)
    }

    pub(crate) fn add_at(
        &mut self,
        text: &str,
        categories: &[String],
        now_ms: i64,
    ) -> GalleryResult<Vec<MessageId>> {
        let mut unique = IndexSet::new();
        for category in categories {
            let category = category.trim();
            if !category.is_empty() {
                unique.insert(category.to_string());
            }
        }
        if unique.is_empty() {
            return Err(ValidationError::EmptyCategories.into());
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }

        let floor = self
            .custom
            .iter()
            .map(|message| message.id + 1)
            .max()
            .unwrap_or(MessageId::MIN);
        let base = now_ms.max(floor);
        let mut ids = Vec::with_capacity(unique.len());
        for (index, category) in unique.into_iter().enumerate() {
            let id = base + index as MessageId;
            self.custom.insert(
                0,
                Message {
                    id,
                    text: text.to_string(),
                    categories: vec![category],
                    is_custom: true,
                },
            );
            ids.push(id);
        }
        ids.reverse();
        self.persist();
        tracing::info!(count = ids.len(), "added custom messages");
        Ok(ids)
    }

    pub fn update(&mut self, id: MessageId, text: &str) -> GalleryResult<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let index = self.custom_index(id)?;
        self.custom[index].text = trimmed.to_string();
        self.persist();
        Ok(())
    }

    pub fn remove(&mut self, id: MessageId) -> GalleryResult<Message> {
        let index = self.custom_index(id)?;
        let removed = self.custom.remove(index);
        self.persist();
        Ok(removed)
    }

    /// Removes every custom message in `ids`; anything else is skipped.
    pub fn remove_many(&mut self, ids: &HashSet<MessageId>) -> Vec<MessageId> {
        let mut removed = Vec::new();
        self.custom.retain(|message| {
            if ids.contains(&message.id) {
                removed.push(message.id);
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            self.persist();
        }
        removed
    }

    fn custom_index(&self, id: MessageId) -> GalleryResult<usize> {
        if let Some(index) = self.custom.iter().position(|message| message.id == id) {
            return Ok(index);
        }
        if self.catalog.iter().any(|message| message.id == id) {
            Err(GalleryError::NotCustom(id))
        } else {
            Err(GalleryError::NotFound(id))
        }
    }

    fn persist(&self) {
        if let Err(err) = self.persistence.save_custom_messages(&self.custom) {
            tracing::error!(%err, "custom messages kept in memory only");
        }
    }
}
