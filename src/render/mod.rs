use crate::messages::{Message, MessageId};
use crate::tracker::{FavoriteSet, SelectionSet};

/// Sink for card view instructions.
///
/// The gallery state never redraws wholesale except through [`clear`](Self::clear)
/// followed by fresh pages; every other change is a targeted update on one card.
pub trait CardRenderer {
    fn clear(&mut self);
    /// Appends one page of cards below the ones already shown.
    fn render_page(&mut self, messages: &[&Message], selection: &SelectionSet, favorites: &FavoriteSet);
    fn remove_card(&mut self, id: MessageId);
    fn update_card_favorite_indicator(&mut self, id: MessageId, is_favorite: bool);
    fn update_card_selection(&mut self, id: MessageId, selected: bool);
    fn show_empty(&mut self);
    fn show_error(&mut self, message: &str);
    fn set_loading(&mut self, loading: bool);
    fn set_more_available(&mut self, more: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub id: MessageId,
    pub text: String,
    pub categories: Vec<String>,
    pub is_custom: bool,
    pub is_favorite: bool,
    pub is_selected: bool,
}

impl CardView {
    fn from_message(message: &Message, selection: &SelectionSet, favorites: &FavoriteSet) -> Self {
        Self {
            id: message.id,
            text: message.text.clone(),
            categories: message.categories.clone(),
            is_custom: message.is_custom,
            is_favorite: favorites.contains(&message.id),
            is_selected: selection.contains(&message.id),
        }
    }

    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardNotice {
    Empty,
    Error(String),
}

/// In-memory card grid; the terminal UI and the `list` command both read from it.
#[derive(Debug, Clone, Default)]
pub struct CardBoard {
    cards: Vec<CardView>,
    notice: Option<BoardNotice>,
    loading: bool,
    more_available: bool,
}

impl CardBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[CardView] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn card(&self, id: MessageId) -> Option<&CardView> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.cards.iter().position(|card| card.id == id)
    }

    pub fn notice(&self) -> Option<&BoardNotice> {
        self.notice.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn more_available(&self) -> bool {
        self.more_available
    }

    fn card_mut(&mut self, id: MessageId) -> Option<&mut CardView> {
        self.cards.iter_mut().find(|card| card.id == id)
    }
}

impl CardRenderer for CardBoard {
    fn clear(&mut self) {
        self.cards.clear();
        self.notice = None;
        self.more_available = false;
    }

    fn render_page(&mut self, messages: &[&Message], selection: &SelectionSet, favorites: &FavoriteSet) {
        self.notice = None;
        self.cards.extend(
            messages
                .iter()
                .map(|message| CardView::from_message(message, selection, favorites)),
        );
    }

    fn remove_card(&mut self, id: MessageId) {
        self.cards.retain(|card| card.id != id);
    }

    fn update_card_favorite_indicator(&mut self, id: MessageId, is_favorite: bool) {
        if let Some(card) = self.card_mut(id) {
            card.is_favorite = is_favorite;
        }
    }

    fn update_card_selection(&mut self, id: MessageId, selected: bool) {
        if let Some(card) = self.card_mut(id) {
            card.is_selected = selected;
        }
    }

    fn show_empty(&mut self) {
        self.notice = Some(BoardNotice::Empty);
    }

    fn show_error(&mut self, message: &str) {
        self.notice = Some(BoardNotice::Error(message.to_string()));
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn set_more_available(&mut self, more: bool) {
        self.more_available = more;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::tests::catalog_message;

    #[test]
    fn pages_append_and_carry_marks() {
        let first = catalog_message(1, "one", &["amor"]);
        let second = catalog_message(2, "two", &["amistad"]);
        let favorites: FavoriteSet = [2].into_iter().collect();
        let selection: SelectionSet = [1].into_iter().collect();

        let mut board = CardBoard::new();
        board.render_page(&[&first], &selection, &favorites);
        board.render_page(&[&second], &selection, &favorites);

        assert_eq!(board.len(), 2);
        assert!(board.cards()[0].is_selected);
        assert!(!board.cards()[0].is_favorite);
        assert!(board.cards()[1].is_favorite);
        assert_eq!(board.cards()[1].primary_category(), Some("amistad"));
    }

    #[test]
    fn targeted_updates_touch_one_card() {
        let messages = [
            catalog_message(1, "one", &["amor"]),
            catalog_message(2, "two", &["amor"]),
        ];
        let refs: Vec<&Message> = messages.iter().collect();
        let mut board = CardBoard::new();
        board.render_page(&refs, &SelectionSet::new(), &FavoriteSet::new());

        board.update_card_favorite_indicator(2, true);
        board.update_card_selection(1, true);
        board.update_card_selection(404, true);
        assert!(board.card(2).is_some_and(|card| card.is_favorite));
        assert!(board.card(1).is_some_and(|card| card.is_selected));

        board.remove_card(1);
        assert_eq!(board.position(2), Some(0));
    }

    #[test]
    fn clear_drops_cards_and_notice() {
        let message = catalog_message(1, "one", &["amor"]);
        let mut board = CardBoard::new();
        board.show_error("catalog unavailable");
        assert_eq!(
            board.notice(),
            Some(&BoardNotice::Error("catalog unavailable".into()))
        );
        board.clear();
        assert!(board.notice().is_none());

        board.show_empty();
        board.render_page(&[&message], &SelectionSet::new(), &FavoriteSet::new());
        assert!(board.notice().is_none());
        assert_eq!(board.len(), 1);
    }
}
