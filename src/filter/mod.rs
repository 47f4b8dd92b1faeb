use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;

use crate::messages::Message;
use crate::tracker::FavoriteSet;

pub const ALL_TOKEN: &str = "all";
pub const FAVORITES_TOKEN: &str = "favorites";
pub const CUSTOM_TOKEN: &str = "custom";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterToken {
    All,
    Favorites,
    Custom,
    Category(String),
}

impl FilterToken {
    pub fn category(name: impl Into<String>) -> Self {
        FilterToken::Category(name.into())
    }
}

impl fmt::Display for FilterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterToken::All => f.write_str(ALL_TOKEN),
            FilterToken::Favorites => f.write_str(FAVORITES_TOKEN),
            FilterToken::Custom => f.write_str(CUSTOM_TOKEN),
            FilterToken::Category(name) => f.write_str(name),
        }
    }
}

impl FromStr for FilterToken {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim();
        match token {
            "" => Err("filter token cannot be empty".to_string()),
            ALL_TOKEN => Ok(FilterToken::All),
            FAVORITES_TOKEN => Ok(FilterToken::Favorites),
            CUSTOM_TOKEN => Ok(FilterToken::Custom),
            other => Ok(FilterToken::Category(other.to_string())),
        }
    }
}

/// Active filter tokens. Never empty: holds either exactly `all` or a union of
/// other tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    tokens: IndexSet<FilterToken>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FilterSet {
    pub fn all() -> Self {
        let mut tokens = IndexSet::new();
        tokens.insert(FilterToken::All);
        Self { tokens }
    }

    pub fn only(token: FilterToken) -> Self {
        let mut set = Self::all();
        set.select(token);
        set
    }

    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = FilterToken>,
    {
        let mut set = Self::all();
        for token in tokens {
            set.select(token);
        }
        set
    }

    /// Filter-bar click semantics: `all` resets, any other token flips.
    pub fn toggle(&mut self, token: FilterToken) {
        if token == FilterToken::All {
            self.reset();
            return;
        }
        self.tokens.shift_remove(&FilterToken::All);
        if !self.tokens.shift_remove(&token) {
            self.tokens.insert(token);
        }
        if self.tokens.is_empty() {
            self.tokens.insert(FilterToken::All);
        }
    }

    /// Adds a token without flipping it off when already present.
    pub fn select(&mut self, token: FilterToken) {
        if token == FilterToken::All {
            self.reset();
            return;
        }
        self.tokens.shift_remove(&FilterToken::All);
        self.tokens.insert(token);
    }

    pub fn reset(&mut self) {
        self.tokens.clear();
        self.tokens.insert(FilterToken::All);
    }

    pub fn contains(&self, token: &FilterToken) -> bool {
        self.tokens.contains(token)
    }

    pub fn is_all(&self) -> bool {
        self.tokens.contains(&FilterToken::All)
    }

    pub fn is_exactly(&self, token: &FilterToken) -> bool {
        self.tokens.len() == 1 && self.tokens.contains(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &FilterToken> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn matches(&self, message: &Message, favorites: &FavoriteSet) -> bool {
        if self.is_all() {
            return true;
        }
        self.tokens.iter().any(|token| match token {
            FilterToken::All => true,
            FilterToken::Favorites => favorites.contains(&message.id),
            FilterToken::Custom => message.is_custom,
            FilterToken::Category(name) => message.has_category(name),
        })
    }

    /// Keeps the messages matching any active token, in input order.
    pub fn apply<'a, I>(&self, merged: I, favorites: &FavoriteSet) -> Vec<&'a Message>
    where
        I: IntoIterator<Item = &'a Message>,
    {
        if self.is_all() {
            return merged.into_iter().collect();
        }
        merged
            .into_iter()
            .filter(|message| self.matches(message, favorites))
            .collect()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.tokens {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{token}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::tests::catalog_message;
    use crate::messages::MessageId;

    fn fixture() -> Vec<Message> {
        let mut custom = catalog_message(100, "mine", &["amor"]);
        custom.is_custom = true;
        vec![
            custom,
            catalog_message(1, "one", &["amor"]),
            catalog_message(2, "two", &["amistad", "familia"]),
            catalog_message(3, "three", &["familia"]),
            catalog_message(4, "broken", &[]),
        ]
    }

    fn favorites(ids: &[MessageId]) -> FavoriteSet {
        ids.iter().copied().collect()
    }

    fn ids(messages: &[&Message]) -> Vec<MessageId> {
        messages.iter().map(|m| m.id).collect()
    }

    #[test]
    fn all_passes_everything_through_in_order() {
        let messages = fixture();
        let result = FilterSet::all().apply(&messages, &favorites(&[]));
        assert_eq!(ids(&result), vec![100, 1, 2, 3, 4]);
    }

    #[test]
    fn tokens_combine_as_a_union() {
        let messages = fixture();
        let favs = favorites(&[3]);
        let set = FilterSet::from_tokens([FilterToken::Favorites, FilterToken::category("amistad")]);
        assert_eq!(ids(&set.apply(&messages, &favs)), vec![2, 3]);

        let set = FilterSet::from_tokens([FilterToken::Custom, FilterToken::category("familia")]);
        assert_eq!(ids(&set.apply(&messages, &favs)), vec![100, 2, 3]);
    }

    #[test]
    fn every_result_satisfies_some_active_token() {
        let messages = fixture();
        let favs = favorites(&[1, 4]);
        let sets = [
            FilterSet::only(FilterToken::Favorites),
            FilterSet::only(FilterToken::Custom),
            FilterSet::from_tokens([FilterToken::category("amor"), FilterToken::Favorites]),
            FilterSet::only(FilterToken::category("nothing")),
        ];
        for set in sets {
            for message in set.apply(&messages, &favs) {
                let ok = (set.contains(&FilterToken::Favorites) && favs.contains(&message.id))
                    || (set.contains(&FilterToken::Custom) && message.is_custom)
                    || message
                        .categories
                        .iter()
                        .any(|c| set.contains(&FilterToken::Category(c.clone())));
                assert!(ok, "message {} slipped through {set}", message.id);
            }
        }
    }

    #[test]
    fn message_without_categories_never_matches_category_tokens() {
        let messages = fixture();
        let set = FilterSet::from_tokens(
            ["amor", "amistad", "familia"].map(FilterToken::category),
        );
        assert!(!ids(&set.apply(&messages, &favorites(&[]))).contains(&4));
    }

    #[test]
    fn selecting_all_clears_other_tokens() {
        let mut set = FilterSet::all();
        set.toggle(FilterToken::Favorites);
        set.toggle(FilterToken::category("amor"));
        assert!(!set.is_all());
        assert_eq!(set.len(), 2);

        set.toggle(FilterToken::All);
        assert!(set.is_exactly(&FilterToken::All));
    }

    #[test]
    fn deselecting_last_token_reverts_to_all() {
        let mut set = FilterSet::all();
        set.toggle(FilterToken::Custom);
        assert!(set.is_exactly(&FilterToken::Custom));
        set.toggle(FilterToken::Custom);
        assert!(set.is_exactly(&FilterToken::All));
    }

    #[test]
    fn parses_meta_and_category_tokens() {
        assert_eq!("all".parse::<FilterToken>(), Ok(FilterToken::All));
        assert_eq!(" favorites ".parse::<FilterToken>(), Ok(FilterToken::Favorites));
        assert_eq!(
            "Amor".parse::<FilterToken>(),
            Ok(FilterToken::Category("Amor".into()))
        );
        assert!("  ".parse::<FilterToken>().is_err());
        assert_eq!(
            FilterSet::from_tokens([FilterToken::Custom, FilterToken::category("amor")])
                .to_string(),
            "custom, amor"
        );
    }
}
