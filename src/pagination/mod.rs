use std::time::{Duration, Instant};

use crate::config::MAX_LOAD_DELAY_MS;

pub const MAX_LOAD_DELAY: Duration = Duration::from_millis(MAX_LOAD_DELAY_MS);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
}

/// Handle for a scheduled page load. Completing it after a reset is a no-op.
#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    ready_at: Instant,
}

impl LoadTicket {
    pub fn ready_at(&self) -> Instant {
        self.ready_at
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        now >= self.ready_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome<T> {
    Page {
        items: Vec<T>,
        page: usize,
        has_more: bool,
    },
    /// The very first page came back empty.
    Empty,
}

/// Incremental page cursor over a filtered result that is re-derived for every
/// load.
#[derive(Debug, Clone)]
pub struct Paginator {
    page_size: usize,
    current_page: usize,
    state: LoadState,
    delay: Duration,
    generation: u64,
    retracted: usize,
}

impl Paginator {
    pub fn new(page_size: usize, delay: Duration) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
            state: LoadState::Idle,
            delay: delay.min(MAX_LOAD_DELAY),
            generation: 0,
            retracted: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
        self.state = LoadState::Idle;
        self.generation = self.generation.wrapping_add(1);
        self.retracted = 0;
    }

    /// Moves to `Loading`, or returns `None` when a load is already in flight.
    pub fn begin_load(&mut self, now: Instant) -> Option<LoadTicket> {
        if self.state == LoadState::Loading {
            return None;
        }
        self.state = LoadState::Loading;
        Some(LoadTicket {
            generation: self.generation,
            ready_at: now + self.delay,
        })
    }

    pub fn complete_load<T: Clone>(
        &mut self,
        ticket: LoadTicket,
        filtered: &[T],
    ) -> Option<PageOutcome<T>> {
        if ticket.generation != self.generation || self.state != LoadState::Loading {
            return None;
        }
        self.state = LoadState::Idle;

        let (start, end) = self.window();
        let len = filtered.len();
        let items = filtered[start.min(len)..end.min(len)].to_vec();
        if self.current_page == 1 && items.is_empty() {
            return Some(PageOutcome::Empty);
        }
        let page = self.current_page;
        self.current_page += 1;
        Some(PageOutcome::Page {
            items,
            page,
            has_more: end < len,
        })
    }

    /// Whether a proximity trigger should fetch another page of `len` items.
    pub fn has_more(&self, len: usize) -> bool {
        self.window().0 < len
    }

    /// Accounts for one already-rendered item leaving the result without a reset.
    pub fn retract(&mut self) {
        if self.rendered() > 0 {
            self.retracted += 1;
        }
    }

    /// Items emitted since the last reset, minus retractions.
    pub fn rendered(&self) -> usize {
        self.window().0
    }

    fn window(&self) -> (usize, usize) {
        let start = (self.current_page - 1) * self.page_size;
        let end = self.current_page * self.page_size;
        (
            start.saturating_sub(self.retracted),
            end.saturating_sub(self.retracted),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_page(paginator: &mut Paginator, data: &[u32]) -> Option<PageOutcome<u32>> {
        let ticket = paginator.begin_load(Instant::now())?;
        paginator.complete_load(ticket, data)
    }

    #[test]
    fn consecutive_pages_concatenate_to_a_prefix() {
        let data: Vec<u32> = (0..47).collect();
        let mut paginator = Paginator::new(10, Duration::ZERO);
        let mut seen = Vec::new();
        for k in 1..=5 {
            match load_page(&mut paginator, &data) {
                Some(PageOutcome::Page { items, page, .. }) => {
                    assert_eq!(page, k);
                    seen.extend(items);
                }
                other => panic!("expected page {k}, got {other:?}"),
            }
            let upto = (k * 10).min(data.len());
            assert_eq!(seen, data[..upto]);
        }
        assert!(!paginator.has_more(data.len()));
    }

    #[test]
    fn has_more_tracks_the_tail() {
        let data: Vec<u32> = (0..20).collect();
        let mut paginator = Paginator::new(10, Duration::ZERO);
        match load_page(&mut paginator, &data) {
            Some(PageOutcome::Page { has_more, .. }) => assert!(has_more),
            other => panic!("unexpected {other:?}"),
        }
        match load_page(&mut paginator, &data) {
            Some(PageOutcome::Page { has_more, .. }) => assert!(!has_more),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!paginator.has_more(data.len()));
        assert!(paginator.has_more(data.len() + 1));
    }

    #[test]
    fn reentrant_loads_are_rejected_while_loading() {
        let data: Vec<u32> = (0..30).collect();
        let mut paginator = Paginator::new(10, Duration::from_millis(300));
        let ticket = paginator.begin_load(Instant::now()).expect("first load");
        assert!(paginator.is_loading());
        assert!(paginator.begin_load(Instant::now()).is_none());
        assert!(paginator.begin_load(Instant::now()).is_none());

        let outcome = paginator.complete_load(ticket, &data);
        assert!(matches!(outcome, Some(PageOutcome::Page { page: 1, .. })));
        assert_eq!(paginator.current_page(), 2);
        assert_eq!(paginator.state(), LoadState::Idle);
    }

    #[test]
    fn empty_first_page_signals_without_advancing() {
        let mut paginator = Paginator::new(10, Duration::ZERO);
        assert_eq!(load_page(&mut paginator, &[]), Some(PageOutcome::Empty));
        assert_eq!(paginator.current_page(), 1);
        assert!(!paginator.is_loading());
    }

    #[test]
    fn reset_makes_outstanding_ticket_stale() {
        let data: Vec<u32> = (0..30).collect();
        let mut paginator = Paginator::new(10, Duration::ZERO);
        load_page(&mut paginator, &data);
        let stale = paginator.begin_load(Instant::now()).expect("load");
        paginator.reset();

        assert_eq!(paginator.complete_load(stale, &data), None);
        assert_eq!(paginator.current_page(), 1);
        match load_page(&mut paginator, &data) {
            Some(PageOutcome::Page { items, page, .. }) => {
                assert_eq!(page, 1);
                assert_eq!(items[0], 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn retraction_keeps_the_next_page_contiguous() {
        let mut data: Vec<u32> = (0..25).collect();
        let mut paginator = Paginator::new(10, Duration::ZERO);
        load_page(&mut paginator, &data);

        // item 4 leaves the result after being shown
        data.remove(4);
        paginator.retract();
        match load_page(&mut paginator, &data) {
            Some(PageOutcome::Page { items, .. }) => assert_eq!(items[0], 10),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(paginator.rendered(), 19);
    }

    #[test]
    fn delay_is_bounded_and_scheduled() {
        let paginator = Paginator::new(0, Duration::from_secs(3600));
        assert!(paginator.delay() <= MAX_LOAD_DELAY);
        assert_eq!(paginator.page_size(), 1);

        let mut paginator = Paginator::new(5, Duration::from_millis(300));
        let now = Instant::now();
        let ticket = paginator.begin_load(now).expect("load");
        assert!(ticket.ready_at() >= now);
        assert!(ticket.is_ready(now + MAX_LOAD_DELAY));
    }
}
