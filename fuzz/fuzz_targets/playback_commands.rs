#![no_main]

use libfuzzer_sys::fuzz_target;
use o2paris::audio::NullBackend;
use o2paris::core::SiteCore;
use o2paris::model::{Catalog, Pinpoint, Settings, Tile};
use o2paris::shuffle::{Shuffler, count_adjacent_duplicates};
use std::time::{Duration, Instant};

fuzz_target!(|data: &[u8]| {
    let Some((&seed, ops)) = data.split_first() else {
        return;
    };

    let tiles: Vec<Tile> = ops
        .iter()
        .take(24)
        .enumerate()
        .map(|(index, byte)| Tile {
            id: index as i64,
            title: format!("tile {index}"),
            description: String::new(),
            image_url: format!("{}.png", byte % 4),
            sound_url: String::new(),
            style_config: Default::default(),
            display_order: i64::from(*byte),
        })
        .collect();

    let mut shuffler = Shuffler::seeded(u64::from(seed));
    let deck = shuffler.shuffle_no_adjacent_duplicates(&tiles, |a, b| a.image_url == b.image_url, None);
    assert_eq!(deck.len(), tiles.len());
    let largest = (0..4)
        .map(|class| tiles.iter().filter(|tile| tile.image_url == format!("{class}.png")).count())
        .max()
        .unwrap_or(0);
    if largest <= tiles.len().div_ceil(2) {
        assert_eq!(count_adjacent_duplicates(&deck, |a, b| a.image_url == b.image_url), 0);
    }

    let pinpoints = (0..(seed % 6) as i64)
        .map(|id| Pinpoint {
            id,
            latitude: 48.85,
            longitude: 2.35,
            title: format!("point {id}"),
            description: String::new(),
            sound_url: String::from("missing.mp3"),
            icon: None,
        })
        .collect();
    let settings = Settings {
        popup_auto_close: seed % 2 == 0,
        ..Settings::default()
    };
    let mut core = SiteCore::new(
        Catalog {
            tiles,
            pinpoints,
            ..Catalog::default()
        },
        settings,
        Box::new(NullBackend::new()),
        None,
        shuffler,
    );

    let start = Instant::now();
    for (step, byte) in ops.iter().enumerate() {
        let now = start + Duration::from_millis(step as u64 * 250);
        let point_id = i64::from(byte >> 4) % 6;
        match byte % 12 {
            0 => core.start_tour(now),
            1 => core.skip_tour(now),
            2 => core.stop_tour(),
            3 => {
                core.open_popup(point_id);
            }
            4 => core.close_popup(point_id),
            5 => {
                core.toggle_audio(point_id);
            }
            6 => {
                core.solo(point_id);
            }
            7 => core.gallery_move(isize::from(*byte as i8)),
            8 => {
                core.open_tile_modal();
            }
            9 => core.tile_modal_next(),
            10 => core.set_search(&format!("{}", byte >> 5)),
            _ => core.tick(now),
        }

        for playing in core.registry().playing_ids() {
            assert!(core.player(playing).is_some());
        }
    }
});
