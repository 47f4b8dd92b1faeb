use std::time::Instant;

use strum::IntoStaticStr;

use crate::app::state::{GalleryState, PendingDeletion};
use crate::config::ThemeName;
use crate::error::GalleryResult;
use crate::filter::FilterToken;
use crate::messages::MessageId;
use crate::render::CardRenderer;
use crate::tracker::SelectionToggle;

/// Every user-facing operation on the gallery.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum GalleryAction {
    /// Filter-bar click: `all` resets, anything else flips.
    SelectFilter(FilterToken),
    SubmitMessage {
        text: String,
        categories: Vec<String>,
    },
    EditMessage {
        id: MessageId,
        text: String,
    },
    RequestDelete(MessageId),
    RequestBulkDelete,
    ConfirmDelete(PendingDeletion),
    ToggleFavorite(MessageId),
    BulkFavorite,
    ToggleSelection(MessageId),
    ClearSelection,
    LoadMore,
    ToggleTheme,
}

impl GalleryAction {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The message the action is aimed at, if any.
    pub fn target(&self) -> Option<MessageId> {
        match self {
            GalleryAction::EditMessage { id, .. }
            | GalleryAction::RequestDelete(id)
            | GalleryAction::ToggleFavorite(id)
            | GalleryAction::ToggleSelection(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The view was reset and page 1 scheduled.
    Reset,
    Added(Vec<MessageId>),
    ConfirmationNeeded(PendingDeletion),
    Deleted(usize),
    Favorite { id: MessageId, is_favorite: bool },
    FavoritesAdded(usize),
    Selection(SelectionToggle),
    SelectionCleared(usize),
    /// Whether a page load was scheduled.
    Loading(bool),
    Theme(ThemeName),
}

pub struct ActionDispatcher<'a, R> {
    gallery: &'a mut GalleryState<R>,
}

impl<'a, R: CardRenderer> ActionDispatcher<'a, R> {
    pub fn new(gallery: &'a mut GalleryState<R>) -> Self {
        Self { gallery }
    }

    pub fn dispatch(&mut self, action: GalleryAction, now: Instant) -> GalleryResult<ActionOutcome> {
        tracing::debug!(action = action.name(), message_id = ?action.target(), "dispatch");
        let outcome = match action {
            GalleryAction::SelectFilter(token) => {
                self.gallery.toggle_filter(token, now);
                ActionOutcome::Reset
            }
            GalleryAction::SubmitMessage { text, categories } => {
                ActionOutcome::Added(self.gallery.submit_message(&text, &categories, now)?)
            }
            GalleryAction::EditMessage { id, text } => {
                self.gallery.edit_message(id, &text, now)?;
                ActionOutcome::Reset
            }
            GalleryAction::RequestDelete(id) => {
                ActionOutcome::ConfirmationNeeded(self.gallery.request_delete(id)?)
            }
            GalleryAction::RequestBulkDelete => {
                ActionOutcome::ConfirmationNeeded(self.gallery.plan_bulk_delete()?)
            }
            GalleryAction::ConfirmDelete(pending) => {
                ActionOutcome::Deleted(self.gallery.confirm_deletion(pending, now))
            }
            GalleryAction::ToggleFavorite(id) => ActionOutcome::Favorite {
                id,
                is_favorite: self.gallery.toggle_favorite(id)?,
            },
            GalleryAction::BulkFavorite => {
                ActionOutcome::FavoritesAdded(self.gallery.bulk_favorite(now))
            }
            GalleryAction::ToggleSelection(id) => {
                ActionOutcome::Selection(self.gallery.toggle_selection(id)?)
            }
            GalleryAction::ClearSelection => {
                ActionOutcome::SelectionCleared(self.gallery.clear_selection())
            }
            GalleryAction::LoadMore => ActionOutcome::Loading(self.gallery.on_proximity(now)),
            GalleryAction::ToggleTheme => ActionOutcome::Theme(self.gallery.toggle_theme()),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{DeletionScope, GalleryOptions};
    use crate::error::GalleryError;
    use crate::messages::tests::catalog_message;
    use crate::render::CardBoard;
    use crate::storage::Persistence;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn gallery() -> GalleryState {
        let catalog = vec![
            catalog_message(1, "uno", &["amor"]),
            catalog_message(2, "dos", &["amistad"]),
        ];
        let options = GalleryOptions {
            load_delay: Duration::ZERO,
            ..GalleryOptions::default()
        };
        let mut gallery =
            GalleryState::new(Ok(catalog), Persistence::in_memory(), options, CardBoard::new());
        let now = Instant::now();
        gallery.reset_and_render(now);
        gallery.poll(now);
        gallery
    }

    #[test]
    fn names_and_targets() {
        assert_eq!(GalleryAction::ToggleFavorite(3).name(), "toggle-favorite");
        assert_eq!(GalleryAction::ToggleFavorite(3).target(), Some(3));
        assert_eq!(GalleryAction::RequestBulkDelete.name(), "request-bulk-delete");
        assert_eq!(GalleryAction::LoadMore.target(), None);
    }

    #[test]
    fn delete_round_trip_goes_through_confirmation() {
        let mut gallery = gallery();
        let now = Instant::now();
        let mut dispatcher = ActionDispatcher::new(&mut gallery);

        let added = dispatcher.dispatch(
            GalleryAction::SubmitMessage {
                text: "hola".into(),
                categories: vec!["amor".into()],
            },
            now,
        );
        let id = match added {
            Ok(ActionOutcome::Added(ids)) => ids[0],
            other => panic!("unexpected {other:?}"),
        };

        let pending = match dispatcher.dispatch(GalleryAction::RequestDelete(id), now) {
            Ok(ActionOutcome::ConfirmationNeeded(pending)) => pending,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(pending.scope, DeletionScope::Single);
        assert_matches!(
            dispatcher.dispatch(GalleryAction::ConfirmDelete(pending), now),
            Ok(ActionOutcome::Deleted(1))
        );
        assert!(gallery.store().custom().is_empty());
    }

    #[test]
    fn refused_actions_surface_errors() {
        let mut gallery = gallery();
        let now = Instant::now();
        let mut dispatcher = ActionDispatcher::new(&mut gallery);
        assert_matches!(
            dispatcher.dispatch(GalleryAction::RequestBulkDelete, now),
            Err(GalleryError::NothingDeletable)
        );
        assert_matches!(
            dispatcher.dispatch(GalleryAction::ToggleFavorite(404), now),
            Err(GalleryError::NotFound(404))
        );
        assert_matches!(
            dispatcher.dispatch(
                GalleryAction::EditMessage {
                    id: 1,
                    text: "x".into()
                },
                now
            ),
            Err(GalleryError::NotCustom(1))
        );
    }

    #[test]
    fn selection_and_favorites_report_state() {
        let mut gallery = gallery();
        let now = Instant::now();
        let mut dispatcher = ActionDispatcher::new(&mut gallery);
        assert_matches!(
            dispatcher.dispatch(GalleryAction::ToggleSelection(2), now),
            Ok(ActionOutcome::Selection(SelectionToggle {
                selected: true,
                count: 1
            }))
        );
        assert_matches!(
            dispatcher.dispatch(GalleryAction::ToggleFavorite(1), now),
            Ok(ActionOutcome::Favorite {
                id: 1,
                is_favorite: true
            })
        );
        assert_matches!(
            dispatcher.dispatch(GalleryAction::ClearSelection, now),
            Ok(ActionOutcome::SelectionCleared(1))
        );
        assert_matches!(
            dispatcher.dispatch(GalleryAction::ToggleTheme, now),
            Ok(ActionOutcome::Theme(ThemeName::Light))
        );
    }
}
