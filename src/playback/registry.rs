use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type PointId = i64;

type StopFn = Rc<dyn Fn()>;

/// What a playing entity publishes about itself. The registry never owns the
/// audio; it can only ask the entity to stop through `stop`.
#[derive(Clone)]
pub struct PlaybackEntry {
    pub point_id: PointId,
    /// Names the source loaded in the entity's audio handle. The handle itself
    /// stays with the player.
    pub label: String,
    stop: StopFn,
}

impl fmt::Debug for PlaybackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEntry")
            .field("point_id", &self.point_id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Shared map of currently playing points.
///
/// Cloning yields another handle to the same map. Everything runs on the UI
/// thread, so this is `Rc<RefCell<..>>` rather than a lock.
#[derive(Debug, Clone, Default)]
pub struct PlaybackRegistry {
    entries: Rc<RefCell<BTreeMap<PointId, PlaybackEntry>>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        point_id: PointId,
        label: impl Into<String>,
        stop: impl Fn() + 'static,
    ) {
        let entry = PlaybackEntry {
            point_id,
            label: label.into(),
            stop: Rc::new(stop),
        };
        tracing::debug!(point_id, label = %entry.label, "playback registered");
        self.entries.borrow_mut().insert(point_id, entry);
    }

    pub fn unregister(&self, point_id: PointId) -> bool {
        let removed = self.entries.borrow_mut().remove(&point_id).is_some();
        if removed {
            tracing::debug!(point_id, "playback unregistered");
        }
        removed
    }

    /// Asks every entry except `except` to stop. Entries remove themselves from
    /// their own stop path, so the callbacks run against a snapshot with the map
    /// released. Returns how many callbacks were invoked.
    pub fn solo_stop(&self, except: PointId) -> usize {
        let stops: Vec<(PointId, StopFn)> = self
            .entries
            .borrow()
            .values()
            .filter(|entry| entry.point_id != except)
            .map(|entry| (entry.point_id, Rc::clone(&entry.stop)))
            .collect();

        for (point_id, stop) in &stops {
            tracing::debug!(point_id, except, "solo stop");
            stop();
        }
        stops.len()
    }

    pub fn others_playing(&self, point_id: PointId) -> bool {
        self.entries.borrow().keys().any(|id| *id != point_id)
    }

    /// Source label of what `point_id` is playing, if it is registered.
    pub fn label(&self, point_id: PointId) -> Option<String> {
        self.entries
            .borrow()
            .get(&point_id)
            .map(|entry| entry.label.clone())
    }

    pub fn is_registered(&self, point_id: PointId) -> bool {
        self.entries.borrow().contains_key(&point_id)
    }

    pub fn playing_ids(&self) -> Vec<PointId> {
        self.entries.borrow().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn solo_stop_skips_the_soloed_point() {
        let registry = PlaybackRegistry::new();
        let (a, b, c) = (counter(), counter(), counter());
        for (id, hits) in [(1, &a), (2, &b), (3, &c)] {
            let hits = Rc::clone(hits);
            registry.register(id, format!("point-{id}"), move || hits.set(hits.get() + 1));
        }

        assert_eq!(registry.solo_stop(1), 2);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn stop_callbacks_may_unregister_during_solo() {
        let registry = PlaybackRegistry::new();
        for id in 1..=3 {
            let handle = registry.clone();
            registry.register(id, "sound", move || {
                handle.unregister(id);
            });
        }

        registry.solo_stop(2);
        assert_eq!(registry.playing_ids(), vec![2]);
        assert!(!registry.others_playing(2));
    }

    #[test]
    fn register_overwrites_existing_entry() {
        let registry = PlaybackRegistry::new();
        let first = counter();
        let second = counter();
        let hits = Rc::clone(&first);
        registry.register(5, "old", move || hits.set(hits.get() + 1));
        let hits = Rc::clone(&second);
        registry.register(5, "new", move || hits.set(hits.get() + 1));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.label(5).as_deref(), Some("new"));
        assert_eq!(registry.label(6), None);
        registry.solo_stop(0);
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn others_playing_ignores_self() {
        let registry = PlaybackRegistry::new();
        assert!(!registry.others_playing(1));
        registry.register(1, "a", || {});
        assert!(!registry.others_playing(1));
        assert!(registry.others_playing(2));
        assert!(registry.unregister(1));
        assert!(!registry.unregister(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn clones_share_state() {
        let registry = PlaybackRegistry::new();
        let other = registry.clone();
        other.register(9, "shared", || {});
        assert!(registry.is_registered(9));
    }
}
