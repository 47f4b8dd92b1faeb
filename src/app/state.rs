use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::app::actions::{ActionDispatcher, ActionOutcome, GalleryAction};
use crate::config::{AppConfig, ThemeName, DEFAULT_LOAD_DELAY_MS, DEFAULT_PAGE_SIZE};
use crate::error::{GalleryError, GalleryResult};
use crate::filter::{FilterSet, FilterToken};
use crate::messages::{Message, MessageId, MessageStore};
use crate::pagination::{LoadTicket, PageOutcome, Paginator};
use crate::render::{CardBoard, CardRenderer, CardView};
use crate::storage::Persistence;
use crate::tracker::{SelectionToggle, Tracker};

#[derive(Debug, Clone, Copy)]
pub struct GalleryOptions {
    pub page_size: usize,
    pub load_delay: Duration,
    /// Used when no theme has been persisted yet.
    pub default_theme: ThemeName,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            load_delay: Duration::from_millis(DEFAULT_LOAD_DELAY_MS),
            default_theme: ThemeName::default(),
        }
    }
}

impl From<&AppConfig> for GalleryOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size,
            load_delay: config.load_delay(),
            default_theme: config.theme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionScope {
    Single,
    Bulk,
}

/// A deletion that has been validated but not yet confirmed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub scope: DeletionScope,
    pub ids: Vec<MessageId>,
}

/// Owns every gallery component and keeps the rendered view in step with them.
///
/// Mutations go to the component that owns the data; the view then either gets a
/// targeted card update or a full reset followed by a fresh first page.
pub struct GalleryState<R = CardBoard> {
    store: MessageStore,
    tracker: Tracker,
    filters: FilterSet,
    paginator: Paginator,
    pending: Option<LoadTicket>,
    renderer: R,
    persistence: Persistence,
    theme: ThemeName,
    catalog_error: Option<GalleryError>,
}

impl<R: CardRenderer> GalleryState<R> {
    pub fn new(
        catalog: GalleryResult<Vec<Message>>,
        persistence: Persistence,
        options: GalleryOptions,
        renderer: R,
    ) -> Self {
        let (catalog, catalog_error) = match catalog {
            Ok(messages) => (messages, None),
            Err(err) => {
                tracing::error!(%err, "catalog unavailable");
                (Vec::new(), Some(err))
            }
        };
        let store = MessageStore::new(catalog, persistence.clone());
        let tracker = Tracker::new(persistence.clone());
        let theme = persistence.load_theme().unwrap_or(options.default_theme);
        Self {
            store,
            tracker,
            filters: FilterSet::all(),
            paginator: Paginator::new(options.page_size, options.load_delay),
            pending: None,
            renderer,
            persistence,
            theme,
            catalog_error,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn theme(&self) -> ThemeName {
        self.theme
    }

    pub fn catalog_error(&self) -> Option<&GalleryError> {
        self.catalog_error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.paginator.is_loading()
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(LoadTicket::ready_at)
    }

    pub fn take_persistence_failure(&self) -> Option<GalleryError> {
        self.persistence.take_failure()
    }

    pub fn filtered(&self) -> Vec<&Message> {
        self.filters
            .apply(self.store.merged(), self.tracker.favorites())
    }

    /// Drops everything rendered and schedules page 1 of the current filter.
    pub fn reset_and_render(&mut self, now: Instant) {
        self.paginator.reset();
        self.pending = None;
        self.renderer.clear();
        self.renderer.set_loading(false);
        if let Some(err) = &self.catalog_error {
            self.renderer.show_error(&err.to_string());
            return;
        }
        self.load_next(now);
    }

    /// Schedules the next page; `false` when a load is already in flight.
    pub fn load_next(&mut self, now: Instant) -> bool {
        match self.paginator.begin_load(now) {
            Some(ticket) => {
                self.pending = Some(ticket);
                self.renderer.set_loading(true);
                true
            }
            None => false,
        }
    }

    /// Completes the outstanding load once its deadline has passed. Returns
    /// whether the view changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let ticket = match self.pending.take() {
            Some(ticket) if ticket.is_ready(now) => ticket,
            other => {
                self.pending = other;
                return false;
            }
        };

        let filtered = self
            .filters
            .apply(self.store.merged(), self.tracker.favorites());
        let outcome = self.paginator.complete_load(ticket, &filtered);
        self.renderer.set_loading(false);
        match outcome {
            None => false,
            Some(PageOutcome::Empty) => {
                tracing::debug!(filters = %self.filters, "no messages match");
                self.renderer.show_empty();
                self.renderer.set_more_available(false);
                true
            }
            Some(PageOutcome::Page {
                items,
                page,
                has_more,
            }) => {
                tracing::debug!(page, count = items.len(), has_more, "page loaded");
                self.renderer
                    .render_page(&items, self.tracker.selection(), self.tracker.favorites());
                self.renderer.set_more_available(has_more);
                true
            }
        }
    }

    /// Completes the outstanding load without waiting for its deadline.
    pub fn finish_pending(&mut self) -> bool {
        match self.pending_deadline() {
            Some(deadline) => self.poll(deadline),
            None => false,
        }
    }

    /// Scroll-proximity trigger.
    pub fn on_proximity(&mut self, now: Instant) -> bool {
        if self.catalog_error.is_some() || self.paginator.is_loading() {
            return false;
        }
        let len = self.filtered().len();
        if !self.paginator.has_more(len) {
            return false;
        }
        self.load_next(now)
    }

    pub fn toggle_filter(&mut self, token: FilterToken, now: Instant) {
        self.filters.toggle(token);
        tracing::debug!(filters = %self.filters, "filters changed");
        self.reset_and_render(now);
    }

    pub fn set_filters(&mut self, filters: FilterSet, now: Instant) {
        self.filters = filters;
        tracing::debug!(filters = %self.filters, "filters replaced");
        self.reset_and_render(now);
    }

    pub fn submit_message(
        &mut self,
        text: &str,
        categories: &[String],
        now: Instant,
    ) -> GalleryResult<Vec<MessageId>> {
        let ids = self.store.add(text, categories)?;
        self.filters = FilterSet::only(FilterToken::Custom);
        self.reset_and_render(now);
        Ok(ids)
    }

    pub fn edit_message(&mut self, id: MessageId, text: &str, now: Instant) -> GalleryResult<()> {
        self.store.update(id, text)?;
        self.reset_and_render(now);
        Ok(())
    }

    pub fn request_delete(&self, id: MessageId) -> GalleryResult<PendingDeletion> {
        if self.store.is_custom(id) {
            return Ok(PendingDeletion {
                scope: DeletionScope::Single,
                ids: vec![id],
            });
        }
        match self.store.get(id) {
            Some(_) => Err(GalleryError::NotCustom(id)),
            None => Err(GalleryError::NotFound(id)),
        }
    }

    /// Selected custom messages; built-in ones in the selection are skipped.
    pub fn plan_bulk_delete(&self) -> GalleryResult<PendingDeletion> {
        let ids: Vec<MessageId> = self
            .tracker
            .selection()
            .iter()
            .copied()
            .filter(|id| self.store.is_custom(*id))
            .collect();
        if ids.is_empty() {
            return Err(GalleryError::NothingDeletable);
        }
        Ok(PendingDeletion {
            scope: DeletionScope::Bulk,
            ids,
        })
    }

    /// Returns how many messages were removed.
    pub fn confirm_deletion(&mut self, pending: PendingDeletion, now: Instant) -> usize {
        let requested: HashSet<MessageId> = pending.ids.iter().copied().collect();
        let removed = self.store.remove_many(&requested);
        self.tracker.forget_favorites(&removed);
        match pending.scope {
            DeletionScope::Bulk => {
                self.tracker.clear_selection();
            }
            DeletionScope::Single => {
                for id in &removed {
                    if self.tracker.is_selected(*id) {
                        self.tracker.toggle_selection(*id);
                    }
                }
            }
        }
        tracing::info!(count = removed.len(), scope = ?pending.scope, "messages deleted");
        self.reset_and_render(now);
        removed.len()
    }

    pub fn toggle_favorite(&mut self, id: MessageId) -> GalleryResult<bool> {
        if self.store.get(id).is_none() {
            return Err(GalleryError::NotFound(id));
        }
        let favorites_only = self.filters.is_exactly(&FilterToken::Favorites);
        let shown = favorites_only && self.is_rendered(id);
        let is_favorite = self.tracker.toggle_favorite(id);

        if shown && !is_favorite {
            self.renderer.remove_card(id);
            self.paginator.retract();
            if self.filtered().is_empty() {
                self.renderer.show_empty();
                self.renderer.set_more_available(false);
            }
        } else {
            self.renderer.update_card_favorite_indicator(id, is_favorite);
        }
        Ok(is_favorite)
    }

    pub fn toggle_selection(&mut self, id: MessageId) -> GalleryResult<SelectionToggle> {
        if self.store.get(id).is_none() {
            return Err(GalleryError::NotFound(id));
        }
        let toggle = self.tracker.toggle_selection(id);
        self.renderer.update_card_selection(id, toggle.selected);
        Ok(toggle)
    }

    pub fn clear_selection(&mut self) -> usize {
        let cleared = self.tracker.clear_selection();
        for id in &cleared {
            self.renderer.update_card_selection(*id, false);
        }
        cleared.len()
    }

    /// Favorites the whole selection, then starts over with the selection cleared.
    pub fn bulk_favorite(&mut self, now: Instant) -> usize {
        if self.tracker.selection().is_empty() {
            return 0;
        }
        let added = self.tracker.bulk_favorite();
        self.reset_and_render(now);
        self.tracker.clear_selection();
        added
    }

    pub fn set_theme(&mut self, theme: ThemeName) {
        self.theme = theme;
        if let Err(err) = self.persistence.save_theme(theme) {
            tracing::error!(%err, "theme kept in memory only");
        }
    }

    pub fn toggle_theme(&mut self) -> ThemeName {
        let next = self.theme.toggled();
        self.set_theme(next);
        next
    }

    fn is_rendered(&self, id: MessageId) -> bool {
        self.filtered()
            .iter()
            .take(self.paginator.rendered())
            .any(|message| message.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeFocus {
    Text,
    Categories,
}

#[derive(Debug, Clone)]
pub struct CategoryChoice {
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct ComposeOverlay {
    pub text: String,
    pub choices: Vec<CategoryChoice>,
    pub highlighted: usize,
    pub focus: ComposeFocus,
    pub error: Option<String>,
}

impl ComposeOverlay {
    fn new(categories: Vec<String>) -> Self {
        Self {
            text: String::new(),
            choices: categories
                .into_iter()
                .map(|name| CategoryChoice {
                    name,
                    selected: false,
                })
                .collect(),
            highlighted: 0,
            focus: ComposeFocus::Text,
            error: None,
        }
    }

    pub fn selected_categories(&self) -> Vec<String> {
        self.choices
            .iter()
            .filter(|choice| choice.selected)
            .map(|choice| choice.name.clone())
            .collect()
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            ComposeFocus::Text => ComposeFocus::Categories,
            ComposeFocus::Categories => ComposeFocus::Text,
        };
    }

    pub fn move_highlight(&mut self, delta: isize) {
        if self.choices.is_empty() {
            return;
        }
        let last = self.choices.len() as isize - 1;
        self.highlighted = (self.highlighted as isize + delta).clamp(0, last) as usize;
    }

    pub fn toggle_highlighted(&mut self) {
        if let Some(choice) = self.choices.get_mut(self.highlighted) {
            choice.selected = !choice.selected;
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditOverlay {
    pub id: MessageId,
    pub text: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteOverlay {
    pub pending: PendingDeletion,
    pub preview: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Compose(ComposeOverlay),
    Edit(EditOverlay),
    Delete(DeleteOverlay),
}

/// Cards this close to the bottom of the rendered list fire the proximity trigger.
pub const PROXIMITY_CARDS: usize = 3;

/// Terminal view state layered over the gallery.
pub struct AppState {
    pub gallery: GalleryState<CardBoard>,
    pub cursor: usize,
    pub filter_cursor: usize,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
}

impl AppState {
    pub fn new(gallery: GalleryState<CardBoard>) -> Self {
        let status_message = gallery.catalog_error().map(ToString::to_string);
        Self {
            gallery,
            cursor: 0,
            filter_cursor: 0,
            status_message,
            overlay: None,
        }
    }

    pub fn board(&self) -> &CardBoard {
        self.gallery.renderer()
    }

    pub fn selected_card(&self) -> Option<&CardView> {
        self.board().cards().get(self.cursor)
    }

    /// Filter bar entries: meta tokens first, then every known category.
    pub fn filter_tokens(&self) -> Vec<FilterToken> {
        let mut tokens = vec![FilterToken::All, FilterToken::Favorites, FilterToken::Custom];
        tokens.extend(
            self.gallery
                .store()
                .categories()
                .into_iter()
                .map(FilterToken::Category),
        );
        tokens
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    /// Completes due loads and surfaces persistence failures.
    pub fn tick(&mut self, now: Instant) -> bool {
        let changed = self.gallery.poll(now);
        if changed {
            self.clamp_cursor();
        }
        self.report_persistence_failure();
        changed
    }

    pub fn move_cursor(&mut self, delta: isize, now: Instant) {
        let len = self.board().len();
        if len > 0 {
            let last = len as isize - 1;
            self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
        }
        if self.cursor + PROXIMITY_CARDS >= len {
            self.dispatch(GalleryAction::LoadMore, now);
        }
    }

    pub fn move_filter_cursor(&mut self, delta: isize) {
        let last = self.filter_tokens().len() as isize - 1;
        self.filter_cursor = (self.filter_cursor as isize + delta).clamp(0, last.max(0)) as usize;
    }

    pub fn toggle_filter_at_cursor(&mut self, now: Instant) {
        if let Some(token) = self.filter_tokens().into_iter().nth(self.filter_cursor) {
            self.dispatch(GalleryAction::SelectFilter(token), now);
        }
    }

    pub fn reset_filters(&mut self, now: Instant) {
        self.dispatch(GalleryAction::SelectFilter(FilterToken::All), now);
    }

    pub fn toggle_favorite_at_cursor(&mut self, now: Instant) {
        if let Some(id) = self.selected_card().map(|card| card.id) {
            self.dispatch(GalleryAction::ToggleFavorite(id), now);
        }
    }

    pub fn toggle_selection_at_cursor(&mut self, now: Instant) {
        if let Some(id) = self.selected_card().map(|card| card.id) {
            self.dispatch(GalleryAction::ToggleSelection(id), now);
        }
    }

    pub fn clear_selection(&mut self, now: Instant) {
        self.dispatch(GalleryAction::ClearSelection, now);
    }

    pub fn bulk_favorite(&mut self, now: Instant) {
        self.dispatch(GalleryAction::BulkFavorite, now);
    }

    pub fn toggle_theme(&mut self, now: Instant) {
        self.dispatch(GalleryAction::ToggleTheme, now);
    }

    pub fn open_compose(&mut self) {
        let categories = self.gallery.store().categories();
        self.overlay = Some(OverlayState::Compose(ComposeOverlay::new(categories)));
    }

    pub fn open_edit(&mut self) {
        let Some((id, text, is_custom)) = self
            .selected_card()
            .map(|card| (card.id, card.text.clone(), card.is_custom))
        else {
            return;
        };
        if !is_custom {
            let message = GalleryError::NotCustom(id).to_string();
            self.set_status_message(Some(message));
            return;
        }
        self.overlay = Some(OverlayState::Edit(EditOverlay {
            id,
            text,
            error: None,
        }));
    }

    pub fn open_delete(&mut self, now: Instant) {
        if let Some(id) = self.selected_card().map(|card| card.id) {
            self.dispatch(GalleryAction::RequestDelete(id), now);
        }
    }

    pub fn open_bulk_delete(&mut self, now: Instant) {
        self.dispatch(GalleryAction::RequestBulkDelete, now);
    }

    /// Enter inside an overlay.
    pub fn submit_overlay(&mut self, now: Instant) {
        let Some(overlay) = self.overlay.take() else {
            return;
        };
        match overlay {
            OverlayState::Compose(mut compose) => {
                let action = GalleryAction::SubmitMessage {
                    text: compose.text.clone(),
                    categories: compose.selected_categories(),
                };
                if let Err(err) = self.try_dispatch(action, now) {
                    compose.error = Some(err.to_string());
                    self.overlay = Some(OverlayState::Compose(compose));
                }
            }
            OverlayState::Edit(mut edit) => {
                let action = GalleryAction::EditMessage {
                    id: edit.id,
                    text: edit.text.clone(),
                };
                if let Err(err) = self.try_dispatch(action, now) {
                    edit.error = Some(err.to_string());
                    self.overlay = Some(OverlayState::Edit(edit));
                }
            }
            OverlayState::Delete(delete) => {
                self.dispatch(GalleryAction::ConfirmDelete(delete.pending), now);
            }
        }
    }

    fn dispatch(&mut self, action: GalleryAction, now: Instant) {
        if let Err(err) = self.try_dispatch(action, now) {
            if !err.is_user_facing() {
                tracing::warn!(%err, "gallery action failed");
            }
            self.set_status_message(Some(err.to_string()));
        }
    }

    fn try_dispatch(&mut self, action: GalleryAction, now: Instant) -> GalleryResult<()> {
        let outcome = ActionDispatcher::new(&mut self.gallery).dispatch(action, now)?;
        self.apply_outcome(outcome);
        self.clamp_cursor();
        Ok(())
    }

    fn apply_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Reset => {
                self.cursor = 0;
            }
            ActionOutcome::Added(ids) => {
                self.cursor = 0;
                self.filter_cursor = 0;
                let message = match ids.len() {
                    1 => "Message saved".to_string(),
                    n => format!("Saved {n} messages"),
                };
                self.set_status_message(Some(message));
            }
            ActionOutcome::ConfirmationNeeded(pending) => {
                let preview = match pending.ids.as_slice() {
                    [id] => self
                        .gallery
                        .store()
                        .get(*id)
                        .map(|message| message.text.clone())
                        .unwrap_or_default(),
                    ids => format!("{} selected custom messages", ids.len()),
                };
                self.overlay = Some(OverlayState::Delete(DeleteOverlay { pending, preview }));
            }
            ActionOutcome::Deleted(count) => {
                self.cursor = 0;
                self.set_status_message(Some(format!("Deleted {count} message(s)")));
            }
            ActionOutcome::FavoritesAdded(count) => {
                self.cursor = 0;
                self.set_status_message(Some(format!("Added {count} favorite(s)")));
            }
            ActionOutcome::SelectionCleared(_) => {
                self.clear_status_message();
            }
            ActionOutcome::Theme(theme) => {
                self.set_status_message(Some(format!("Theme: {theme}")));
            }
            ActionOutcome::Favorite { .. }
            | ActionOutcome::Selection(_)
            | ActionOutcome::Loading(_) => {}
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.board().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }

    fn report_persistence_failure(&mut self) {
        if let Some(err) = self.gallery.take_persistence_failure() {
            self.set_status_message(Some(err.to_string()));
        }
    }
}
