//! Endless feed over a fixed deck.

pub const DEFAULT_CHUNK_SIZE: usize = 12;

/// Items that can be looked up in a deck by a stable numeric id.
pub trait DeckItem {
    fn item_id(&self) -> i64;
}

/// Reads a fixed deck in chunks, wrapping around forever.
///
/// `display_items` only ever grows and always satisfies
/// `display_items[i] == session_items[i % session_items.len()]`.
#[derive(Debug, Clone)]
pub struct EndlessFeed<T> {
    session_items: Vec<T>,
    display_items: Vec<T>,
    offset: usize,
    chunk_size: usize,
}

impl<T: Clone> EndlessFeed<T> {
    pub fn new(deck: Vec<T>, chunk_size: usize) -> Self {
        Self {
            session_items: deck,
            display_items: Vec::new(),
            offset: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn take_next_chunk(&mut self) -> Vec<T> {
        let len = self.session_items.len();
        if len == 0 {
            return Vec::new();
        }

        let chunk: Vec<T> = (0..self.chunk_size)
            .map(|step| self.session_items[(self.offset + step) % len].clone())
            .collect();
        // kept reduced so a long session never walks the offset towards overflow
        self.offset = (self.offset + self.chunk_size) % len;
        self.display_items.extend(chunk.iter().cloned());
        tracing::debug!(
            displayed = self.display_items.len(),
            offset = self.offset,
            "feed chunk appended"
        );
        chunk
    }

    /// Whether `position` in the displayed sequence is within `threshold` items of
    /// its end, i.e. the consumer should pull another chunk.
    pub fn is_near_end(&self, position: usize, threshold: usize) -> bool {
        !self.session_items.is_empty()
            && position.saturating_add(threshold) >= self.display_items.len()
    }

    pub fn session_items(&self) -> &[T] {
        &self.session_items
    }

    pub fn display_items(&self) -> &[T] {
        &self.display_items
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_empty(&self) -> bool {
        self.session_items.is_empty()
    }
}

impl<T: Clone + DeckItem> EndlessFeed<T> {
    pub fn next(&self, current_id: i64) -> Option<&T> {
        self.neighbour(current_id, 1)
    }

    pub fn prev(&self, current_id: i64) -> Option<&T> {
        let len = self.session_items.len();
        self.neighbour(current_id, len.saturating_sub(1))
    }

    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.session_items
            .iter()
            .position(|item| item.item_id() == id)
    }

    fn neighbour(&self, current_id: i64, step: usize) -> Option<&T> {
        let len = self.session_items.len();
        let current = self.position_of(current_id)?;
        self.session_items.get((current + step) % len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item(i64);

    impl DeckItem for Item {
        fn item_id(&self) -> i64 {
            self.0
        }
    }

    fn deck(ids: &[i64]) -> Vec<Item> {
        ids.iter().copied().map(Item).collect()
    }

    #[test]
    fn wraps_around_three_item_deck() {
        let mut feed = EndlessFeed::new(deck(&[10, 20, 30]), 2);
        for _ in 0..4 {
            assert_eq!(feed.take_next_chunk().len(), 2);
        }

        let display = feed.display_items();
        assert_eq!(display.len(), 8);
        for (i, item) in display.iter().enumerate() {
            assert_eq!(item, &feed.session_items()[i % 3]);
        }
    }

    #[test]
    fn empty_deck_yields_nothing() {
        let mut feed: EndlessFeed<Item> = EndlessFeed::new(Vec::new(), DEFAULT_CHUNK_SIZE);
        assert!(feed.take_next_chunk().is_empty());
        assert!(!feed.is_near_end(0, 4));
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let mut feed = EndlessFeed::new(deck(&[1]), 0);
        assert_eq!(feed.chunk_size(), 1);
        assert_eq!(feed.take_next_chunk(), deck(&[1]));
    }

    #[test]
    fn navigation_wraps_at_both_ends() {
        let feed = EndlessFeed::new(deck(&[1, 2, 3]), DEFAULT_CHUNK_SIZE);
        assert_eq!(feed.next(3), Some(&Item(1)));
        assert_eq!(feed.prev(1), Some(&Item(3)));
        assert_eq!(feed.next(1), Some(&Item(2)));
        assert_eq!(feed.prev(2), Some(&Item(1)));
    }

    #[test]
    fn navigation_with_unknown_id_is_noop() {
        let feed = EndlessFeed::new(deck(&[1, 2, 3]), DEFAULT_CHUNK_SIZE);
        assert_eq!(feed.next(42), None);
        assert_eq!(feed.prev(42), None);
    }

    #[test]
    fn near_end_tracks_display_length() {
        let mut feed = EndlessFeed::new(deck(&[1, 2, 3, 4]), 4);
        feed.take_next_chunk();
        assert!(!feed.is_near_end(0, 2));
        assert!(feed.is_near_end(2, 2));
    }

    proptest! {
        #[test]
        fn display_matches_session_modulo(len in 1usize..20, chunk in 1usize..30, pulls in 1usize..12) {
            let ids: Vec<i64> = (0..len as i64).collect();
            let mut feed = EndlessFeed::new(deck(&ids), chunk);
            for _ in 0..pulls {
                prop_assert_eq!(feed.take_next_chunk().len(), chunk);
            }
            prop_assert_eq!(feed.display_items().len(), chunk * pulls);
            for (i, item) in feed.display_items().iter().enumerate() {
                prop_assert_eq!(item, &feed.session_items()[i % len]);
            }
        }
    }
}
