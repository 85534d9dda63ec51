use std::time::Instant;

#[derive(Debug, Clone)]
struct Scheduled<C> {
    due: Instant,
    command: C,
}

/// Delayed commands that a newer batch can supersede.
///
/// [`supersede`](Self::supersede) drops every pending command, so rapid
/// re-navigation never stacks stale follow-ups.
#[derive(Debug, Clone)]
pub struct Timeline<C> {
    pending: Vec<Scheduled<C>>,
}

impl<C> Default for Timeline<C> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<C> Timeline<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything pending before a new batch is scheduled.
    pub fn supersede(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "superseded pending commands");
        }
    }

    pub fn schedule(&mut self, due: Instant, command: C) {
        self.pending.push(Scheduled { due, command });
    }

    pub fn cancel_all(&mut self) {
        self.supersede();
    }

    /// Removes and returns every command due at `now`, earliest first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<C> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|entry| entry.due <= now);
        self.pending = pending;
        due.sort_by_key(|entry| entry.due);
        due.into_iter().map(|entry| entry.command).collect()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|entry| entry.due).min()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
