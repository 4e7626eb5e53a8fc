use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::Deserialize;
use tracing::debug;

/// How the next item of a media list is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderMode {
    /// `(current + 1) mod len`.
    #[default]
    Sequential,
    /// Every item once per cycle, a fresh random order each cycle.
    Shuffle,
}

#[derive(Debug, Clone, Copy)]
enum ReshuffleReason {
    Reset,
    Shrunk,
    CycleExhausted,
    NewestFirst,
    Replaced,
}

/// Display order over a list whose length may change between draws.
///
/// Rules:
/// - Sequential mode ignores the permutation and wraps around.
/// - Shuffle mode holds a permutation of `0..len`; `cursor` is the position of
///   the next draw and always stays in `[0, len)`.
/// - Growth appends the new indices, shuffled among themselves, after the
///   unconsumed part of the cycle. When the old items moved up by `offset`
///   (new items inserted in front), every kept index and `current` move with
///   them. Shrinking or replacing the list reshuffles everything.
/// - A new cycle never starts with the item that ended the previous one.
/// - `promote_head` shows index 0 right away and reshuffles so that index 0 is
///   not drawn again at the very next position.
#[derive(Debug)]
pub struct SlideOrder {
    mode: OrderMode,
    len: usize,
    permutation: Vec<usize>,
    cursor: usize,
    current: Option<usize>,
    rng: StdRng,
}

impl SlideOrder {
    pub fn new(mode: OrderMode, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(mode, rng)
    }

    pub fn with_rng(mode: OrderMode, rng: StdRng) -> Self {
        Self {
            mode,
            len: 0,
            permutation: Vec::new(),
            cursor: 0,
            current: None,
            rng,
        }
    }

    pub fn mode(&self) -> OrderMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index most recently handed out, if any.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Track a new backing-list length.
    pub fn resize(&mut self, len: usize) {
        if len == self.len {
            return;
        }
        let previous = self.len;
        self.len = len;

        if len == 0 {
            self.permutation.clear();
            self.cursor = 0;
            self.current = None;
            return;
        }
        if self.current.is_some_and(|c| c >= len) {
            self.current = None;
        }
        if self.mode == OrderMode::Sequential {
            return;
        }

        if previous == 0 {
            self.reshuffle(None, ReshuffleReason::Reset);
        } else if len > previous {
            let mut added: Vec<usize> = (previous..len).collect();
            added.shuffle(&mut self.rng);
            debug!(previous, len, "slide order extended");
            self.permutation.extend(added);
        } else {
            self.reshuffle(self.current, ReshuffleReason::Shrunk);
        }
    }

    /// The old list now sits at `offset..offset + len()` inside a list `len` long.
    ///
    /// Items already drawn this cycle stay drawn; the inserted ones join the
    /// unconsumed part. Anything that does not fit that shape rebuilds.
    pub fn grow_around(&mut self, offset: usize, len: usize) {
        let previous = self.len;
        if previous == 0 || offset + previous > len {
            self.rebuild(len, None);
            return;
        }
        if len == previous {
            return;
        }
        self.len = len;
        self.current = self.current.map(|c| c + offset);
        if self.mode == OrderMode::Sequential {
            return;
        }
        for idx in &mut self.permutation {
            *idx += offset;
        }
        let mut added: Vec<usize> = (0..offset).chain(offset + previous..len).collect();
        added.shuffle(&mut self.rng);
        debug!(previous, len, offset, "slide order extended");
        self.permutation.extend(added);
    }

    /// The backing list was replaced. `current` is where the item on screen
    /// landed in the new list, if it is still there.
    pub fn rebuild(&mut self, len: usize, current: Option<usize>) {
        self.len = len;
        self.current = current.filter(|&c| c < len);
        if len == 0 {
            self.permutation.clear();
            self.cursor = 0;
            return;
        }
        if self.mode == OrderMode::Shuffle {
            self.reshuffle(self.current, ReshuffleReason::Replaced);
        }
    }

    /// Hand out the next index, or `None` when the list is empty.
    pub fn advance(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let idx = match self.mode {
            OrderMode::Sequential => self.current.map_or(0, |c| (c + 1) % self.len),
            OrderMode::Shuffle => {
                let idx = self.permutation[self.cursor];
                self.cursor += 1;
                if self.cursor >= self.permutation.len() {
                    self.reshuffle(Some(idx), ReshuffleReason::CycleExhausted);
                }
                idx
            }
        };
        self.current = Some(idx);
        Some(idx)
    }

    /// A new item was inserted at the head of a list now `len` long: show it now.
    pub fn promote_head(&mut self, len: usize) -> Option<usize> {
        self.len = len;
        if len == 0 {
            self.permutation.clear();
            self.cursor = 0;
            self.current = None;
            return None;
        }
        if self.mode == OrderMode::Shuffle {
            self.reshuffle(Some(0), ReshuffleReason::NewestFirst);
        }
        self.current = Some(0);
        Some(0)
    }

    /// Start over: the next draw is index 0 (sequential) or the head of a fresh cycle.
    pub fn reset(&mut self) {
        let last = self.current.take();
        if self.mode == OrderMode::Shuffle && self.len > 0 {
            self.reshuffle(last, ReshuffleReason::Reset);
        }
    }

    fn reshuffle(&mut self, avoid_first: Option<usize>, reason: ReshuffleReason) {
        self.permutation = (0..self.len).collect();
        self.permutation.shuffle(&mut self.rng);
        if let Some(avoid) = avoid_first
            && self.len > 1
            && self.permutation[0] == avoid
        {
            let swap_with = self.rng.random_range(1..self.len);
            self.permutation.swap(0, swap_with);
        }
        self.cursor = 0;
        debug!(len = self.len, reason = ?reason, "slide order reshuffled");
    }
}

/// Draw `iterations` indices from a fresh order over `len` items.
pub fn simulate_order(
    len: usize,
    mode: OrderMode,
    seed: Option<u64>,
    iterations: usize,
) -> Vec<usize> {
    let mut order = SlideOrder::new(mode, seed);
    order.resize(len);
    let mut plan = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match order.advance() {
            Some(idx) => plan.push(idx),
            None => break,
        }
    }
    plan
}
