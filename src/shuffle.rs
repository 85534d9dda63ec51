//! Deck shuffling that keeps "equal" items apart.
//!
//! The gallery feed loops over one shuffled deck forever, so two tiles showing the
//! same picture next to each other (or across the seam of a reload) stand out.
//! [`Shuffler::shuffle_no_adjacent_duplicates`] is a Fisher-Yates shuffle followed by
//! local swap repair, with a bounded number of passes. It never fails: decks that
//! cannot be separated come back as the best arrangement found.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

const MAX_SHUFFLE_ATTEMPTS: usize = 100;
const RESHUFFLE_INTERVAL: usize = 10;

#[derive(Debug)]
pub struct Shuffler {
    rng: SmallRng,
}

impl Shuffler {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Reproducible shuffler, mostly for tests and fuzzing.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Plain unbiased shuffle of a copy of `items`.
    pub fn shuffle<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut deck = items.to_vec();
        deck.shuffle(&mut self.rng);
        deck
    }

    /// Shuffles `items` so that no two neighbours satisfy `equal`, as far as the
    /// multiset allows.
    ///
    /// When `avoid_first` is given and some item is not equal to it, the first item
    /// of the result is not equal to it either. `equal` must be reflexive and
    /// symmetric; transitivity is not required.
    pub fn shuffle_no_adjacent_duplicates<T, F>(
        &mut self,
        items: &[T],
        equal: F,
        avoid_first: Option<&T>,
    ) -> Vec<T>
    where
        T: Clone,
        F: Fn(&T, &T) -> bool,
    {
        if items.len() <= 1 {
            return items.to_vec();
        }

        let mut deck = self.fresh_deck(items, &equal, avoid_first);
        let mut best: Option<(usize, Vec<T>)> = None;
        let mut attempt = 0;

        while attempt < MAX_SHUFFLE_ATTEMPTS {
            if !repair_pass(&mut deck, &equal) {
                return deck;
            }

            let remaining = count_adjacent_duplicates(&deck, &equal);
            if remaining == 0 {
                return deck;
            }
            if best.as_ref().is_none_or(|(count, _)| remaining < *count) {
                best = Some((remaining, deck.clone()));
            }

            attempt += 1;
            if attempt % RESHUFFLE_INTERVAL == 0 {
                deck = self.fresh_deck(items, &equal, avoid_first);
            }
        }

        let (heuristic_count, heuristic) = best.unwrap_or_else(|| {
            let count = count_adjacent_duplicates(&deck, &equal);
            (count, deck)
        });

        let interleaved = interleave_classes(&heuristic, &equal, avoid_first);
        let interleaved_count = count_adjacent_duplicates(&interleaved, &equal);
        if interleaved_count < heuristic_count {
            tracing::debug!(
                heuristic_count,
                interleaved_count,
                "swap repair exhausted, using class interleaving"
            );
            return interleaved;
        }

        if heuristic_count > 0 {
            tracing::debug!(
                remaining = heuristic_count,
                len = items.len(),
                "deck cannot be fully separated, returning best effort"
            );
        }
        heuristic
    }

    fn fresh_deck<T, F>(&mut self, items: &[T], equal: &F, avoid_first: Option<&T>) -> Vec<T>
    where
        T: Clone,
        F: Fn(&T, &T) -> bool,
    {
        let mut deck = self.shuffle(items);
        if let Some(avoid) = avoid_first {
            move_first_mismatch_to_front(&mut deck, equal, avoid);
        }
        deck
    }
}

impl Default for Shuffler {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot helper backed by an OS-seeded [`Shuffler`].
pub fn shuffle_no_adjacent_duplicates<T, F>(items: &[T], equal: F, avoid_first: Option<&T>) -> Vec<T>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    Shuffler::new().shuffle_no_adjacent_duplicates(items, equal, avoid_first)
}

pub fn count_adjacent_duplicates<T, F>(items: &[T], equal: F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    items
        .windows(2)
        .filter(|pair| equal(&pair[0], &pair[1]))
        .count()
}

fn move_first_mismatch_to_front<T, F>(deck: &mut [T], equal: &F, avoid: &T)
where
    F: Fn(&T, &T) -> bool,
{
    if deck.first().is_none_or(|first| !equal(first, avoid)) {
        return;
    }
    if let Some(idx) = deck.iter().position(|item| !equal(item, avoid)) {
        deck.swap(0, idx);
    }
}

/// Single left-to-right repair pass. Returns whether any adjacent duplicate was seen.
///
/// Position 0 is never touched, so the avoid-first fixup survives repairs.
fn repair_pass<T, F>(deck: &mut [T], equal: &F) -> bool
where
    F: Fn(&T, &T) -> bool,
{
    let len = deck.len();
    let mut found = false;

    for i in 0..len.saturating_sub(1) {
        if !equal(&deck[i], &deck[i + 1]) {
            continue;
        }
        found = true;

        let problem = &deck[i + 1];
        let swap_with = (i + 2..len).find(|&j| {
            let candidate = &deck[j];
            let clashes_at_destination =
                equal(candidate, &deck[i]) || (i + 2 < len && equal(candidate, &deck[i + 2]));
            let clashes_at_source =
                equal(problem, &deck[j - 1]) || (j + 1 < len && equal(problem, &deck[j + 1]));
            !clashes_at_destination && !clashes_at_source
        });

        if let Some(j) = swap_with {
            deck.swap(i + 1, j);
        }
    }

    found
}

/// Rebuilds the deck by repeatedly taking from the largest remaining class that
/// differs from the previous pick. Exact whenever `equal` is an equivalence and no
/// class holds more than half the deck (rounded up).
fn interleave_classes<T, F>(deck: &[T], equal: &F, avoid_first: Option<&T>) -> Vec<T>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let mut classes: Vec<Vec<T>> = Vec::new();
    for item in deck {
        match classes.iter_mut().find(|class| equal(&class[0], item)) {
            Some(class) => class.push(item.clone()),
            None => classes.push(vec![item.clone()]),
        }
    }

    let avoid_class =
        avoid_first.and_then(|avoid| classes.iter().position(|class| equal(&class[0], avoid)));

    let mut out = Vec::with_capacity(deck.len());
    let mut previous = None;
    while out.len() < deck.len() {
        let first_skip = if out.is_empty() { avoid_class } else { None };
        let Some(pick) = largest_class(&classes, &[previous, first_skip])
            .or_else(|| largest_class(&classes, &[previous]))
            .or_else(|| largest_class(&classes, &[]))
        else {
            break;
        };

        if let Some(item) = classes[pick].pop() {
            out.push(item);
        }
        previous = Some(pick);
    }
    out
}

fn largest_class<T>(classes: &[Vec<T>], skip: &[Option<usize>]) -> Option<usize> {
    classes
        .iter()
        .enumerate()
        .filter(|(idx, class)| !class.is_empty() && !skip.contains(&Some(*idx)))
        .max_by_key(|(_, class)| class.len())
        .map(|(idx, _)| idx)
}
