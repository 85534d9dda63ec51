use crate::feed::{DEFAULT_CHUNK_SIZE, DeckItem};
use crate::tour::{DEFAULT_AUTOPLAY_DELAY, DEFAULT_POPUP_DELAY, TourTimings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Gallery,
    Map,
}

impl View {
    pub fn toggle(self) -> Self {
        match self {
            Self::Gallery => Self::Map,
            Self::Map => Self::Gallery,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gallery" | "tiles" => Some(Self::Gallery),
            "map" => Some(Self::Map),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Gallery => "Gallery",
            Self::Map => "Map",
        }
    }
}

/// Gallery card. `style_config` is an opaque blob the admin side writes
/// (font, colour); it is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tile {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "mediaRef")]
    pub image_url: String,
    #[serde(default, alias = "audioRef")]
    pub sound_url: String,
    #[serde(default)]
    pub style_config: serde_json::Value,
    #[serde(default)]
    pub display_order: i64,
}

impl DeckItem for Tile {
    fn item_id(&self) -> i64 {
        self.id
    }
}

impl Tile {
    /// Point id used when a tile's sound goes through the playback registry.
    /// Negative so it can never collide with a pinpoint id.
    pub fn sound_point_id(&self) -> i64 {
        -self.id.saturating_abs() - 1
    }

    pub fn font(&self) -> Option<&str> {
        self.style_config.get("font").and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pinpoint {
    pub id: i64,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng")]
    pub longitude: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "audioRef")]
    pub sound_url: String,
    #[serde(default, alias = "iconRef")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub tile_layer_url: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom_level: u8,
    pub max_zoom: u8,
    pub min_zoom: u8,
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_layer_url: String::from("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"),
            center_lat: 48.8566,
            center_lng: 2.3522,
            zoom_level: 13,
            max_zoom: 18,
            min_zoom: 10,
            attribution: String::from("OpenStreetMap contributors"),
        }
    }
}

/// Everything the site shows, as read from `catalog.json` or a scanned folder.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Catalog {
    #[serde(default)]
    pub config: MapConfig,
    #[serde(default)]
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub pinpoints: Vec<Pinpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_tour_popup_delay_ms")]
    pub tour_popup_delay_ms: u64,
    #[serde(default = "default_tour_autoplay_delay_ms")]
    pub tour_autoplay_delay_ms: u64,
    #[serde(default = "default_popup_auto_close")]
    pub popup_auto_close: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Image of the tile shown first last session; the next deck avoids
    /// opening on it.
    #[serde(default)]
    pub last_tile_image: Option<String>,
    #[serde(default)]
    pub start_view: View,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub media_dir: Option<PathBuf>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_tour_popup_delay_ms() -> u64 {
    DEFAULT_POPUP_DELAY.as_millis() as u64
}

fn default_tour_autoplay_delay_ms() -> u64 {
    DEFAULT_AUTOPLAY_DELAY.as_millis() as u64
}

fn default_popup_auto_close() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            tour_popup_delay_ms: default_tour_popup_delay_ms(),
            tour_autoplay_delay_ms: default_tour_autoplay_delay_ms(),
            popup_auto_close: default_popup_auto_close(),
            volume: default_volume(),
            last_tile_image: None,
            start_view: View::default(),
            catalog_path: None,
            media_dir: None,
        }
    }
}

impl Settings {
    pub fn tour_timings(&self) -> TourTimings {
        TourTimings {
            popup_delay: Duration::from_millis(self.tour_popup_delay_ms),
            autoplay_delay: Duration::from_millis(self.tour_autoplay_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinpoint_accepts_short_field_names() {
        let raw = r#"{"id":3,"lat":48.85,"lng":2.35,"title":"Pont Neuf","audioRef":"a.mp3","iconRef":"drop"}"#;
        let point: Pinpoint = serde_json::from_str(raw).expect("parse");
        assert_eq!(point.latitude, 48.85);
        assert_eq!(point.sound_url, "a.mp3");
        assert_eq!(point.icon.as_deref(), Some("drop"));
        assert!(point.description.is_empty());
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"volume":0.5}"#).expect("parse");
        assert_eq!(settings.volume, 0.5);
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(settings.popup_auto_close);
        assert_eq!(settings.tour_timings(), TourTimings::default());
    }

    #[test]
    fn tile_sound_ids_stay_negative() {
        let mut tile: Tile =
            serde_json::from_str(r#"{"id":0,"image_url":"a.png","style_config":{"font":"Lato"}}"#)
                .expect("parse");
        assert_eq!(tile.sound_point_id(), -1);
        assert_eq!(tile.font(), Some("Lato"));
        tile.id = 41;
        assert_eq!(tile.sound_point_id(), -42);
        tile.id = -7;
        assert_eq!(tile.sound_point_id(), -8);
        tile.id = i64::MIN;
        assert_eq!(tile.sound_point_id(), i64::MIN);
        tile.id = i64::MAX;
        assert!(tile.sound_point_id() < 0);
    }

    #[test]
    fn empty_catalog_centres_on_paris() {
        let catalog: Catalog = serde_json::from_str("{}").expect("parse");
        assert_eq!(catalog.config.zoom_level, 13);
        assert_eq!(catalog.config.center_lat, 48.8566);
        assert!(catalog.tiles.is_empty());
    }

    #[test]
    fn view_parses_and_toggles() {
        assert_eq!(View::parse(" Map "), Some(View::Map));
        assert_eq!(View::parse("globe"), None);
        assert_eq!(View::Gallery.toggle(), View::Map);
    }
}
