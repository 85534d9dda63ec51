use crate::feed::EndlessFeed;
use crate::model::Tile;
use crate::shuffle::Shuffler;

/// How close (in tiles) the highlight may get to the end of what is displayed
/// before another chunk is pulled.
pub const NEAR_END_THRESHOLD: usize = 6;

/// The endless tile wall: one shuffled deck per session, read in chunks, with a
/// highlight cursor and a detail modal that walks the deck cyclically.
#[derive(Debug, Clone)]
pub struct Gallery {
    feed: EndlessFeed<Tile>,
    highlighted: usize,
    modal: Option<i64>,
}

impl Gallery {
    /// Shuffles `tiles` so no two neighbours share a picture and, when
    /// possible, the deck does not open on `avoid_image`. The first chunk is
    /// pulled right away.
    pub fn new(
        tiles: &[Tile],
        chunk_size: usize,
        avoid_image: Option<&str>,
        shuffler: &mut Shuffler,
    ) -> Self {
        let avoid = avoid_image.and_then(|image| tiles.iter().find(|tile| tile.image_url == image));
        let deck = shuffler.shuffle_no_adjacent_duplicates(
            tiles,
            |a: &Tile, b: &Tile| a.image_url == b.image_url,
            avoid,
        );

        let mut feed = EndlessFeed::new(deck, chunk_size);
        feed.take_next_chunk();
        tracing::debug!(tiles = tiles.len(), chunk_size = feed.chunk_size(), "gallery deck built");
        Self {
            feed,
            highlighted: 0,
            modal: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.feed.is_empty()
    }

    pub fn deck(&self) -> &[Tile] {
        self.feed.session_items()
    }

    pub fn displayed(&self) -> &[Tile] {
        self.feed.display_items()
    }

    /// Image of the first tile of this session's deck, remembered so the next
    /// session can avoid opening on it.
    pub fn first_image(&self) -> Option<&str> {
        self.deck().first().map(|tile| tile.image_url.as_str())
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn highlighted_tile(&self) -> Option<&Tile> {
        self.displayed().get(self.highlighted)
    }

    /// Moves the highlight by `delta` tiles, pulling chunks as it nears the end
    /// so there is always something further down.
    pub fn move_highlight(&mut self, delta: isize) {
        if self.is_empty() {
            return;
        }
        let target = self.highlighted.saturating_add_signed(delta);
        while self.feed.is_near_end(target, NEAR_END_THRESHOLD) {
            self.feed.take_next_chunk();
        }
        self.highlighted = target.min(self.displayed().len().saturating_sub(1));
    }

    pub fn open_modal(&mut self) -> Option<&Tile> {
        let id = self.highlighted_tile()?.id;
        self.open_modal_for(id)
    }

    pub fn open_modal_for(&mut self, tile_id: i64) -> Option<&Tile> {
        self.feed.position_of(tile_id)?;
        self.modal = Some(tile_id);
        self.modal_tile()
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn modal_tile(&self) -> Option<&Tile> {
        let id = self.modal?;
        self.deck().iter().find(|tile| tile.id == id)
    }

    pub fn modal_next(&mut self) -> Option<&Tile> {
        let id = self.modal?;
        self.modal = self.feed.next(id).map(|tile| tile.id).or(self.modal);
        self.modal_tile()
    }

    pub fn modal_prev(&mut self) -> Option<&Tile> {
        let id = self.modal?;
        self.modal = self.feed.prev(id).map(|tile| tile.id).or(self.modal);
        self.modal_tile()
    }
}
