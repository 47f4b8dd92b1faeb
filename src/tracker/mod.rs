use indexmap::IndexSet;

use crate::messages::MessageId;
use crate::storage::Persistence;

pub type FavoriteSet = IndexSet<MessageId>;
pub type SelectionSet = IndexSet<MessageId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionToggle {
    pub selected: bool,
    pub count: usize,
}

/// Favorites (persisted) and the current multi-select (session only).
pub struct Tracker {
    favorites: FavoriteSet,
    selection: SelectionSet,
    persistence: Persistence,
}

impl Tracker {
    pub fn new(persistence: Persistence) -> Self {
        let favorites = persistence.load_favorites();
        Self {
            favorites,
            selection: SelectionSet::new(),
            persistence,
        }
    }

    pub fn favorites(&self) -> &FavoriteSet {
        &self.favorites
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn is_favorite(&self, id: MessageId) -> bool {
        self.favorites.contains(&id)
    }

    pub fn is_selected(&self, id: MessageId) -> bool {
        self.selection.contains(&id)
    }

    /// Returns whether `id` is a favorite afterwards.
    pub fn toggle_favorite(&mut self, id: MessageId) -> bool {
        let now_favorite = if self.favorites.shift_remove(&id) {
            false
        } else {
            self.favorites.insert(id);
            true
        };
        self.persist();
        now_favorite
    }

    pub fn toggle_selection(&mut self, id: MessageId) -> SelectionToggle {
        let selected = if self.selection.shift_remove(&id) {
            false
        } else {
            self.selection.insert(id);
            true
        };
        SelectionToggle {
            selected,
            count: self.selection.len(),
        }
    }

    /// Returns the ids that were selected.
    pub fn clear_selection(&mut self) -> Vec<MessageId> {
        self.selection.drain(..).collect()
    }

    /// Favorites every selected id; returns how many were new.
    pub fn bulk_favorite(&mut self) -> usize {
        let before = self.favorites.len();
        self.favorites.extend(self.selection.iter().copied());
        let added = self.favorites.len() - before;
        self.persist();
        added
    }

    pub fn forget_favorites(&mut self, ids: &[MessageId]) {
        let before = self.favorites.len();
        self.favorites.retain(|id| !ids.contains(id));
        if self.favorites.len() != before {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(err) = self.persistence.save_favorites(&self.favorites) {
            tracing::error!(%err, "favorites kept in memory only");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_favorite_is_its_own_inverse() {
        let persistence = Persistence::in_memory();
        let mut tracker = Tracker::new(persistence.clone());
        tracker.toggle_favorite(1);
        let before = tracker.favorites().clone();

        assert!(tracker.toggle_favorite(9));
        assert!(!tracker.toggle_favorite(9));
        assert_eq!(tracker.favorites(), &before);
        assert_eq!(persistence.load_favorites(), before);
    }

    #[test]
    fn selection_reports_membership_and_count() {
        let mut tracker = Tracker::new(Persistence::in_memory());
        assert_eq!(
            tracker.toggle_selection(4),
            SelectionToggle {
                selected: true,
                count: 1
            }
        );
        tracker.toggle_selection(5);
        assert_eq!(
            tracker.toggle_selection(4),
            SelectionToggle {
                selected: false,
                count: 1
            }
        );
        assert_eq!(tracker.clear_selection(), vec![5]);
        assert!(tracker.selection().is_empty());
    }

    #[test]
    fn bulk_favorite_unions_without_duplicates() {
        let persistence = Persistence::in_memory();
        let mut tracker = Tracker::new(persistence.clone());
        tracker.toggle_favorite(2);
        tracker.toggle_selection(2);
        tracker.toggle_selection(3);

        assert_eq!(tracker.bulk_favorite(), 1);
        let stored: Vec<_> = persistence.load_favorites().into_iter().collect();
        assert_eq!(stored, vec![2, 3]);
        // the selection itself is untouched; callers clear it
        assert_eq!(tracker.selection().len(), 2);
    }

    #[test]
    fn selection_is_not_persisted() {
        let persistence = Persistence::in_memory();
        let mut tracker = Tracker::new(persistence.clone());
        tracker.toggle_selection(8);
        assert!(Tracker::new(persistence).selection().is_empty());
    }

    #[test]
    fn forget_favorites_drops_only_listed_ids() {
        let persistence = Persistence::in_memory();
        let mut tracker = Tracker::new(persistence.clone());
        tracker.toggle_favorite(1);
        tracker.toggle_favorite(2);
        tracker.forget_favorites(&[2, 77]);
        let stored: Vec<_> = persistence.load_favorites().into_iter().collect();
        assert_eq!(stored, vec![1]);
    }
}
