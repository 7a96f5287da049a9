use std::collections::VecDeque;

use tcx_schemas::{Bar, BarEvent};

/// Completed bars kept by default. The default model reads at most three.
pub const DEFAULT_WINDOW: usize = 8;

/// Bounded window of completed bars, indexed most-recent-first, plus the
/// bar currently in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecentBars {
    max_len: usize,
    completed: VecDeque<Bar>,
    in_progress: Option<Bar>,
}

impl Default for RecentBars {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RecentBars {
    /// A zero `max_len` is treated as 1.
    pub fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            max_len,
            completed: VecDeque::with_capacity(max_len),
            in_progress: None,
        }
    }

    /// Apply a feed event. Returns true when a bar was completed.
    pub fn apply(&mut self, event: &BarEvent) -> bool {
        match event {
            BarEvent::Update(bar) => {
                self.in_progress = Some(bar.clone());
                false
            }
            BarEvent::NewBar(bar) => {
                self.completed.push_front(bar.clone());
                self.completed.truncate(self.max_len);
                self.in_progress = None;
                true
            }
        }
    }

    /// The `index`-th most recent completed bar; 0 is the newest.
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.completed.get(index)
    }

    pub fn newest(&self) -> Option<&Bar> {
        self.get(0)
    }

    /// Up to `n` newest completed bars, most recent first.
    pub fn newest_n(&self, n: usize) -> impl Iterator<Item = &Bar> {
        self.completed.iter().take(n)
    }

    pub fn in_progress(&self) -> Option<&Bar> {
        self.in_progress.as_ref()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn clear(&mut self) {
        self.completed.clear();
        self.in_progress = None;
    }
}
