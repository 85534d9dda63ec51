use crate::audio::AudioBackend;
use crate::audio::source::FALLBACK_TONE_LABEL;
use crate::catalog;
use crate::config;
use crate::gallery::Gallery;
use crate::model::{Catalog, MapConfig, Pinpoint, Settings, Tile, View};
use crate::playback::{PlaybackRegistry, PlayerEvent, PlayerState, PointId, PointPlayer};
use crate::shuffle::Shuffler;
use crate::tour::{TourCommand, TourController};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything the terminal front end drives: the gallery, the map with its
/// popups and their players, the tour and the persisted settings.
pub struct SiteCore {
    pub view: View,
    pub map_config: MapConfig,
    pub pinpoints: Vec<Pinpoint>,
    pub search: String,
    /// Indices into `pinpoints` matching `search`, in catalog order.
    pub visible_points: Vec<usize>,
    /// Index into `visible_points`.
    pub selected_point: usize,
    pub gallery: Gallery,
    pub settings: Settings,
    pub dirty: bool,
    pub status: String,
    tiles: Vec<Tile>,
    media_dir: Option<PathBuf>,
    backend: Box<dyn AudioBackend>,
    registry: PlaybackRegistry,
    players: BTreeMap<PointId, PointPlayer>,
    tour: TourController,
    shuffler: Shuffler,
}

impl SiteCore {
    pub fn new(
        catalog: Catalog,
        settings: Settings,
        backend: Box<dyn AudioBackend>,
        media_dir: Option<PathBuf>,
        mut shuffler: Shuffler,
    ) -> Self {
        let Catalog {
            config: map_config,
            mut tiles,
            pinpoints,
        } = catalog;
        catalog::sort_tiles(&mut tiles);

        let gallery = Gallery::new(
            &tiles,
            settings.chunk_size,
            settings.last_tile_image.as_deref(),
            &mut shuffler,
        );
        let visible_points: Vec<usize> = (0..pinpoints.len()).collect();
        let tour_ids = visible_points.iter().map(|index| pinpoints[*index].id).collect();
        let tour = TourController::new(tour_ids, settings.tour_timings());

        tracing::info!(
            tiles = tiles.len(),
            pinpoints = pinpoints.len(),
            output = %backend.output_name(),
            "site ready"
        );

        Self {
            view: settings.start_view,
            map_config,
            pinpoints,
            search: String::new(),
            visible_points,
            selected_point: 0,
            gallery,
            settings,
            dirty: true,
            status: String::from("Ready"),
            tiles,
            media_dir,
            backend,
            registry: PlaybackRegistry::new(),
            players: BTreeMap::new(),
            tour,
            shuffler,
        }
    }

    pub fn output_name(&self) -> String {
        self.backend.output_name()
    }

    pub fn registry(&self) -> &PlaybackRegistry {
        &self.registry
    }

    pub fn tour(&self) -> &TourController {
        &self.tour
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn media_dir(&self) -> Option<&Path> {
        self.media_dir.as_deref()
    }

    pub fn set_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        if view == View::Map {
            self.close_tile_modal();
        }
        self.view = view;
        self.set_status(&format!("{} view", view.label()));
    }

    pub fn toggle_view(&mut self) {
        self.set_view(self.view.toggle());
    }

    /// Re-filters the map. The tour follows the visible points, so a change in
    /// what is visible stops a running tour.
    pub fn set_search(&mut self, query: &str) {
        let visible: Vec<usize> = catalog::filter_pinpoints(&self.pinpoints, query)
            .into_iter()
            .filter_map(|found| self.pinpoints.iter().position(|point| point.id == found.id))
            .collect();

        self.search = query.trim().to_string();
        if visible != self.visible_points {
            let ids = visible.iter().map(|index| self.pinpoints[*index].id).collect();
            self.tour.set_points(ids);
            self.visible_points = visible;
        }
        self.selected_point = self
            .selected_point
            .min(self.visible_points.len().saturating_sub(1));

        let shown = self.visible_points.len();
        if self.search.is_empty() {
            self.set_status(&format!("Showing all {shown} points"));
        } else {
            self.set_status(&format!("{shown} points match \"{}\"", self.search));
        }
    }

    pub fn select_next_point(&mut self) {
        if self.selected_point + 1 < self.visible_points.len() {
            self.selected_point += 1;
            self.dirty = true;
        }
    }

    pub fn select_prev_point(&mut self) {
        if self.selected_point > 0 {
            self.selected_point -= 1;
            self.dirty = true;
        }
    }

    pub fn selected_pinpoint(&self) -> Option<&Pinpoint> {
        self.visible_points
            .get(self.selected_point)
            .and_then(|index| self.pinpoints.get(*index))
    }

    pub fn pinpoint(&self, point_id: PointId) -> Option<&Pinpoint> {
        self.pinpoints.iter().find(|point| point.id == point_id)
    }

    pub fn is_popup_open(&self, point_id: PointId) -> bool {
        self.players.contains_key(&point_id)
    }

    /// Pinpoints whose popup is open, in id order.
    pub fn open_popups(&self) -> Vec<PointId> {
        self.players
            .keys()
            .copied()
            .filter(|id| self.pinpoint(*id).is_some())
            .collect()
    }

    pub fn player_state(&self, point_id: PointId) -> Option<PlayerState> {
        self.players.get(&point_id).map(PointPlayer::state)
    }

    pub fn player(&self, point_id: PointId) -> Option<&PointPlayer> {
        self.players.get(&point_id)
    }

    pub fn open_selected_popup(&mut self) -> bool {
        let Some(point_id) = self.selected_pinpoint().map(|point| point.id) else {
            self.set_status("No point selected");
            return false;
        };
        self.open_popup(point_id)
    }

    /// Opens a point's popup and mounts its player. With auto-close on, every
    /// other popup is closed first, which tears its player down.
    pub fn open_popup(&mut self, point_id: PointId) -> bool {
        let Some(point) = self.pinpoint(point_id) else {
            self.set_status("Unknown point");
            return false;
        };
        let (title, sound_url) = (point.title.clone(), point.sound_url.clone());

        if self.settings.popup_auto_close {
            let others: Vec<PointId> = self
                .open_popups()
                .into_iter()
                .filter(|id| *id != point_id)
                .collect();
            for other in others {
                self.close_popup(other);
            }
        }

        if !self.is_popup_open(point_id) {
            self.mount_player(point_id, &sound_url);
        }
        if let Some(position) = self
            .visible_points
            .iter()
            .position(|index| self.pinpoints[*index].id == point_id)
        {
            self.selected_point = position;
        }
        self.set_status(&format!("Opened {title}"));
        true
    }

    pub fn close_popup(&mut self, point_id: PointId) {
        if let Some(player) = self.players.remove(&point_id) {
            player.teardown();
            self.dirty = true;
        }
    }

    pub fn close_all_popups(&mut self) {
        for point_id in self.open_popups() {
            self.close_popup(point_id);
        }
    }

    /// The popup's play/pause button.
    pub fn toggle_audio(&mut self, point_id: PointId) -> bool {
        let Some(player) = self.players.get(&point_id).cloned() else {
            self.set_status("Open the popup first");
            return false;
        };
        let playing = player.toggle();
        self.report_player(&player, playing);
        playing
    }

    pub fn toggle_selected_audio(&mut self) -> bool {
        let Some(point_id) = self.selected_pinpoint().map(|point| point.id) else {
            self.set_status("No point selected");
            return false;
        };
        if !self.is_popup_open(point_id) {
            self.open_popup(point_id);
        }
        self.toggle_audio(point_id)
    }

    /// Stops every sound except `point_id`'s.
    pub fn solo(&mut self, point_id: PointId) -> usize {
        let stopped = self.registry.solo_stop(point_id);
        self.set_status(&format!("Solo: stopped {stopped} other sound(s)"));
        stopped
    }

    pub fn others_playing(&self, point_id: PointId) -> bool {
        self.registry.others_playing(point_id)
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.settings.volume = volume.clamp(0.0, 2.5);
        for player in self.players.values() {
            player.set_volume(self.settings.volume);
        }
        self.set_status(&format!("Volume {:.0}%", self.settings.volume * 100.0));
    }

    pub fn start_tour(&mut self, now: Instant) {
        match self.tour.start(now) {
            Some(command) => self.apply_tour_command(command),
            None => self.set_status("No points to tour"),
        }
    }

    /// Manual skip: same as the current point's audio ending.
    pub fn skip_tour(&mut self, now: Instant) {
        if !self.tour.is_active() {
            self.set_status("No tour running");
            return;
        }
        self.advance_tour(now);
    }

    pub fn stop_tour(&mut self) {
        if !self.tour.is_active() {
            self.set_status("No tour running");
            return;
        }
        self.tour.stop();
        self.set_status("Tour stopped");
    }

    /// Polls every player for a natural end and fires due tour follow-ups.
    pub fn tick(&mut self, now: Instant) {
        let ended: Vec<PointId> = self
            .players
            .values()
            .filter_map(|player| (player.tick() == Some(PlayerEvent::Ended)).then(|| player.point_id()))
            .collect();
        if !ended.is_empty() {
            self.dirty = true;
        }

        for point_id in ended {
            tracing::debug!(point_id, "audio ended");
            if self.tour.current_point() == Some(point_id) {
                self.advance_tour(now);
            }
        }

        for command in self.tour.poll(now) {
            self.apply_tour_command(command);
        }
    }

    pub fn gallery_move(&mut self, delta: isize) {
        self.gallery.move_highlight(delta);
        self.dirty = true;
    }

    pub fn open_tile_modal(&mut self) -> bool {
        let Some(tile) = self.gallery.open_modal().cloned() else {
            self.set_status("Nothing to show");
            return false;
        };
        self.mount_tile_player(&tile);
        self.set_status(&format!("Viewing {}", tile.title));
        true
    }

    pub fn tile_modal_next(&mut self) {
        let previous = self.gallery.modal_tile().cloned();
        if let Some(tile) = self.gallery.modal_next().cloned() {
            self.swap_tile_player(previous.as_ref(), &tile);
        }
    }

    pub fn tile_modal_prev(&mut self) {
        let previous = self.gallery.modal_tile().cloned();
        if let Some(tile) = self.gallery.modal_prev().cloned() {
            self.swap_tile_player(previous.as_ref(), &tile);
        }
    }

    pub fn close_tile_modal(&mut self) {
        if let Some(tile) = self.gallery.modal_tile() {
            let point_id = tile.sound_point_id();
            self.close_popup(point_id);
        }
        self.gallery.close_modal();
        self.dirty = true;
    }

    pub fn toggle_tile_sound(&mut self) -> bool {
        let Some(tile) = self.gallery.modal_tile() else {
            self.set_status("No tile open");
            return false;
        };
        if tile.sound_url.trim().is_empty() {
            self.set_status("This tile has no sound");
            return false;
        }
        let point_id = tile.sound_point_id();
        self.toggle_audio(point_id)
    }

    /// Settings as they should be written back: the current view, and the first
    /// tile of this session so the next one avoids opening on it.
    pub fn persisted_settings(&self) -> Settings {
        Settings {
            last_tile_image: self
                .gallery
                .first_image()
                .map(str::to_string)
                .or_else(|| self.settings.last_tile_image.clone()),
            start_view: self.view,
            ..self.settings.clone()
        }
    }

    pub fn save(&mut self) -> anyhow::Result<()> {
        config::save_settings(&self.persisted_settings())?;
        self.set_status("Settings saved");
        Ok(())
    }

    /// Builds a fresh deck from the same tiles.
    pub fn reshuffle(&mut self) {
        self.close_tile_modal();
        let avoid = self.gallery.first_image().map(str::to_string);
        self.gallery = Gallery::new(
            &self.tiles,
            self.settings.chunk_size,
            avoid.as_deref(),
            &mut self.shuffler,
        );
        self.set_status("Gallery reshuffled");
    }

    fn advance_tour(&mut self, now: Instant) {
        let total = self.tour.len();
        match self.tour.advance(now) {
            Some(command) => self.apply_tour_command(command),
            None => self.set_status(&format!("Tour complete ({total} points)")),
        }
    }

    fn apply_tour_command(&mut self, command: TourCommand) {
        match command {
            TourCommand::Navigate { index, point_id } => {
                self.view = View::Map;
                self.close_tile_modal();
                if let Some(position) = self
                    .visible_points
                    .iter()
                    .position(|candidate| self.pinpoints[*candidate].id == point_id)
                {
                    self.selected_point = position;
                }
                let title = self
                    .pinpoint(point_id)
                    .map(|point| point.title.clone())
                    .unwrap_or_default();
                self.set_status(&format!("Tour {}/{}: {title}", index + 1, self.tour.len()));
            }
            TourCommand::OpenPopup { point_id } => {
                self.open_popup(point_id);
            }
            TourCommand::Autoplay { point_id } => {
                let Some(player) = self.players.get(&point_id).cloned() else {
                    tracing::debug!(point_id, "autoplay skipped: popup closed");
                    return;
                };
                if player.is_busy() {
                    tracing::debug!(point_id, state = ?player.state(), "autoplay skipped: player busy");
                    return;
                }
                self.registry.solo_stop(point_id);
                let playing = player.play();
                self.report_player(&player, playing);
            }
        }
    }

    fn mount_player(&mut self, point_id: PointId, media_ref: &str) {
        let player = PointPlayer::mount(
            point_id,
            media_ref,
            self.media_dir.as_deref(),
            self.backend.open_handle(),
            self.registry.clone(),
        );
        player.set_volume(self.settings.volume);
        self.players.insert(point_id, player);
        self.dirty = true;
    }

    fn mount_tile_player(&mut self, tile: &Tile) {
        if tile.sound_url.trim().is_empty() {
            return;
        }
        let point_id = tile.sound_point_id();
        if !self.players.contains_key(&point_id) {
            self.mount_player(point_id, &tile.sound_url);
        }
    }

    fn swap_tile_player(&mut self, previous: Option<&Tile>, next: &Tile) {
        if let Some(previous) = previous {
            self.close_popup(previous.sound_point_id());
        }
        self.mount_tile_player(next);
        self.set_status(&format!("Viewing {}", next.title));
    }

    fn report_player(&mut self, player: &PointPlayer, playing: bool) {
        if let Some(message) = player.error() {
            self.set_status(message);
            return;
        }
        let label = self
            .pinpoint(player.point_id())
            .map(|point| point.title.clone())
            .unwrap_or_else(|| String::from("tile sound"));
        if playing {
            match self.registry.label(player.point_id()) {
                Some(source) if source == FALLBACK_TONE_LABEL => {
                    self.set_status(&format!("Playing {label} ({source})"));
                }
                _ => self.set_status(&format!("Playing {label}")),
            }
        } else {
            self.set_status(&format!("Paused {label}"));
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::FALLBACK_TONE_LABEL;
    use crate::audio::test_support::{ScriptedBackend, SharedScript};
    use proptest::prop_assert;
    use std::rc::Rc;
    use std::time::Duration;

    fn point(id: i64, title: &str) -> Pinpoint {
        Pinpoint {
            id,
            latitude: 48.85 + id as f64 / 1_000.0,
            longitude: 2.35,
            title: title.to_string(),
            description: String::new(),
            sound_url: format!("point-{id}.wav"),
            icon: None,
        }
    }

    fn tile(id: i64, image: &str, sound: &str) -> Tile {
        Tile {
            id,
            title: format!("tile {id}"),
            description: String::new(),
            image_url: image.to_string(),
            sound_url: sound.to_string(),
            style_config: serde_json::Value::Null,
            display_order: id,
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            config: MapConfig::default(),
            tiles: vec![tile(1, "a.png", "a.wav"), tile(2, "b.png", ""), tile(3, "c.png", "c.wav")],
            pinpoints: vec![
                point(1, "Fontaine Saint-Michel"),
                point(2, "Pont Neuf"),
                point(3, "Canal Saint-Martin"),
                point(4, "Élysée"),
            ],
        }
    }

    fn core_with(settings: Settings) -> (SiteCore, SharedScript) {
        let backend = ScriptedBackend::default();
        let script = Rc::clone(&backend.script);
        let core = SiteCore::new(
            catalog(),
            settings,
            Box::new(backend),
            None,
            Shuffler::seeded(7),
        );
        (core, script)
    }

    fn core() -> (SiteCore, SharedScript) {
        core_with(Settings {
            tour_popup_delay_ms: 100,
            tour_autoplay_delay_ms: 50,
            ..Settings::default()
        })
    }

    fn ms(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn opening_a_popup_closes_the_others() {
        let (mut core, _) = core();
        core.open_popup(1);
        core.toggle_audio(1);
        assert!(core.registry().is_registered(1));

        core.open_popup(2);
        assert_eq!(core.open_popups(), vec![2]);
        assert!(!core.registry().is_registered(1));
    }

    #[test]
    fn solo_stops_other_open_popups() {
        let (mut core, _) = core_with(Settings {
            popup_auto_close: false,
            ..Settings::default()
        });
        for id in [1, 2, 3] {
            core.open_popup(id);
            assert!(core.toggle_audio(id));
        }
        assert!(core.others_playing(1));

        assert_eq!(core.solo(1), 2);
        assert_eq!(core.registry().playing_ids(), vec![1]);
        assert_eq!(core.player_state(2), Some(PlayerState::Idle));
        assert!(!core.others_playing(1));
    }

    #[test]
    fn tour_opens_and_autoplays_each_point() {
        let (mut core, script) = core();
        let start = Instant::now();
        core.set_view(View::Gallery);

        core.start_tour(start);
        assert_eq!(core.view, View::Map);
        assert_eq!(core.selected_pinpoint().map(|p| p.id), Some(1));
        assert!(!core.is_popup_open(1));

        core.tick(ms(start, 100));
        assert!(core.is_popup_open(1));
        assert_eq!(core.player_state(1), Some(PlayerState::Idle));

        core.tick(ms(start, 150));
        assert_eq!(core.player_state(1), Some(PlayerState::Playing));

        script.borrow_mut().finished.insert(String::from("point-1.wav"));
        core.tick(ms(start, 2_000));
        assert_eq!(core.tour().current_point(), Some(2));
        assert_eq!(core.selected_pinpoint().map(|p| p.id), Some(2));

        core.tick(ms(start, 2_150));
        assert_eq!(core.open_popups(), vec![2]);
        assert_eq!(core.player_state(2), Some(PlayerState::Playing));
    }

    #[test]
    fn rapid_skips_only_autoplay_the_last_point() {
        let (mut core, script) = core();
        let start = Instant::now();
        core.start_tour(start);
        core.skip_tour(ms(start, 10));
        core.skip_tour(ms(start, 20));

        core.tick(ms(start, 1_000));
        assert_eq!(core.open_popups(), vec![3]);
        assert_eq!(script.borrow().plays, vec![String::from("point-3.wav")]);
    }

    #[test]
    fn tour_ends_after_the_last_point() {
        let (mut core, _) = core();
        let start = Instant::now();
        core.start_tour(start);
        for step in 1..=3 {
            core.skip_tour(ms(start, step));
        }
        assert_eq!(core.tour().current_point(), Some(4));

        core.skip_tour(ms(start, 4));
        assert!(!core.tour().is_active());
        assert!(core.status.contains("Tour complete"));
        core.tick(ms(start, 5_000));
        assert!(core.open_popups().is_empty());
    }

    #[test]
    fn fallback_survives_repeated_errors_and_is_named() {
        let (mut core, script) = core();
        script
            .borrow_mut()
            .failing_loads
            .insert(String::from("point-2.wav"));
        core.open_popup(2);
        for _ in 0..3 {
            core.player(2).expect("popup open").handle_media_error();
        }
        assert_eq!(core.player_state(2), Some(PlayerState::Idle));

        assert!(core.toggle_audio(2));
        assert_eq!(core.status, format!("Playing Pont Neuf ({FALLBACK_TONE_LABEL})"));
    }

    #[test]
    fn autoplay_leaves_errored_player_alone() {
        let (mut core, script) = core();
        {
            let mut script = script.borrow_mut();
            script.failing_plays.insert(String::from("point-1.wav"));
            script.failing_plays.insert(String::from(FALLBACK_TONE_LABEL));
        }
        let start = Instant::now();
        core.open_popup(1);
        assert!(!core.toggle_audio(1));
        assert_eq!(core.player_state(1), Some(PlayerState::Errored));
        assert_eq!(core.status, "Playback error");

        let plays_before = script.borrow().plays.len();
        core.start_tour(start);
        core.tick(ms(start, 1_000));
        assert_eq!(script.borrow().plays.len(), plays_before);
        assert_eq!(core.player_state(1), Some(PlayerState::Errored));
    }

    #[test]
    fn autoplay_solos_the_tour_point() {
        let (mut core, _) = core_with(Settings {
            popup_auto_close: false,
            tour_popup_delay_ms: 10,
            tour_autoplay_delay_ms: 10,
            ..Settings::default()
        });
        core.open_popup(3);
        core.toggle_audio(3);

        let start = Instant::now();
        core.start_tour(start);
        core.tick(ms(start, 100));
        assert_eq!(core.registry().playing_ids(), vec![1]);
        assert_eq!(core.player_state(3), Some(PlayerState::Idle));
    }

    #[test]
    fn stop_tour_cancels_follow_ups() {
        let (mut core, _) = core();
        let start = Instant::now();
        core.start_tour(start);
        core.stop_tour();
        core.tick(ms(start, 1_000));
        assert!(core.open_popups().is_empty());
        assert_eq!(core.status, "Tour stopped");
    }

    #[test]
    fn search_narrows_points_and_tour() {
        let (mut core, _) = core();
        let start = Instant::now();
        core.start_tour(start);

        core.set_search("saint");
        assert!(!core.tour().is_active());
        let ids: Vec<i64> = core.visible_points.iter().map(|i| core.pinpoints[*i].id).collect();
        assert_eq!(ids, vec![1, 3]);

        core.set_search("ELYSEE");
        assert_eq!(core.selected_pinpoint().map(|p| p.id), Some(4));
        assert_eq!(core.tour().len(), 1);
    }

    #[test]
    fn tile_modal_plays_through_registry() {
        let (mut core, _) = core();
        while core.gallery.highlighted_tile().map(|t| t.id) != Some(1) {
            core.gallery_move(1);
        }
        assert!(core.open_tile_modal());
        assert!(core.toggle_tile_sound());
        assert!(core.registry().is_registered(-2));

        core.open_popup(2);
        core.toggle_audio(2);
        core.solo(2);
        assert!(!core.registry().is_registered(-2));

        core.close_tile_modal();
        assert!(core.player(-2).is_none());
    }

    #[test]
    fn modal_navigation_swaps_tile_players() {
        let (mut core, _) = core();
        core.open_tile_modal();
        for _ in 0..6 {
            core.tile_modal_next();
            let tile_players = core.players.keys().filter(|id| **id < 0).count();
            assert!(tile_players <= 1);
        }
        core.tile_modal_prev();
        core.set_view(View::Map);
        assert!(core.gallery.modal_tile().is_none());
    }

    #[test]
    fn persisted_settings_remember_first_tile() {
        let (mut core, _) = core();
        core.set_view(View::Map);
        let settings = core.persisted_settings();
        assert_eq!(settings.start_view, View::Map);
        assert_eq!(settings.last_tile_image.as_deref(), core.gallery.first_image());
    }

    #[test]
    fn reshuffle_avoids_previous_first_tile() {
        let (mut core, _) = core();
        for _ in 0..20 {
            let before = core.gallery.first_image().map(str::to_string);
            core.reshuffle();
            assert_ne!(core.gallery.first_image().map(str::to_string), before);
        }
    }

    proptest::proptest! {
        #[test]
        fn registry_only_holds_playing_players(ops in proptest::collection::vec((0u8..9, 1i64..5), 1..120)) {
            let (mut core, script) = core_with(Settings {
                popup_auto_close: false,
                tour_popup_delay_ms: 5,
                tour_autoplay_delay_ms: 5,
                ..Settings::default()
            });
            let start = Instant::now();
            let mut clock = 0;

            for (op, id) in ops {
                clock += 7;
                let now = ms(start, clock);
                match op {
                    0 => { core.open_popup(id); }
                    1 => core.close_popup(id),
                    2 => { core.toggle_audio(id); }
                    3 => { core.solo(id); }
                    4 => core.start_tour(now),
                    5 => core.skip_tour(now),
                    6 => core.stop_tour(),
                    7 => {
                        script.borrow_mut().finished.insert(format!("point-{id}.wav"));
                    }
                    _ => core.tick(now),
                }

                for point_id in core.registry().playing_ids() {
                    prop_assert!(core.player_state(point_id) == Some(PlayerState::Playing));
                }
                if !core.visible_points.is_empty() {
                    prop_assert!(core.selected_point < core.visible_points.len());
                }
            }
        }
    }
}
