//! Queue order and navigation.
//!
//! The queue plays playlist indices in `order`: the identity order, or a
//! random permutation while shuffle is on. Manual next/previous only wrap
//! with `RepeatMode::All`; repeat-one affects auto-advance only.

use rand::Rng;
use rand::seq::SliceRandom;

use super::types::RepeatMode;

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    order: Vec<usize>,
    /// Position of the current item within `order`.
    pos: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Playlist index of the current item.
    pub fn current(&self) -> Option<usize> {
        self.pos.and_then(|p| self.order.get(p).copied())
    }

    /// Replace the queue with `len` items and make `start` current.
    /// Keeps the shuffle flag; a shuffled queue starts with `start`.
    pub fn load<R: Rng + ?Sized>(&mut self, len: usize, start: usize, rng: &mut R) {
        self.order = (0..len).collect();
        self.pos = None;
        if len == 0 {
            return;
        }
        let start = start.min(len - 1);
        if self.shuffle {
            self.shuffle_keeping(start, rng);
        } else {
            self.pos = Some(start);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.pos = None;
    }

    /// Make playlist index `index` current. Returns false when out of range.
    pub fn set_current(&mut self, index: usize) -> bool {
        match self.order.iter().position(|&i| i == index) {
            Some(p) => {
                self.pos = Some(p);
                true
            }
            None => false,
        }
    }

    /// Toggle shuffle. Turning it on puts the current item first in a fresh
    /// random order; turning it off restores playlist order.
    pub fn set_shuffle<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        if self.shuffle == enabled {
            return;
        }
        self.shuffle = enabled;
        let current = self.current();
        if enabled {
            if let Some(c) = current {
                self.shuffle_keeping(c, rng);
            } else {
                self.order.shuffle(rng);
            }
        } else {
            self.order.sort_unstable();
            self.pos = current;
        }
    }

    fn shuffle_keeping<R: Rng + ?Sized>(&mut self, first: usize, rng: &mut R) {
        self.order.retain(|&i| i != first);
        self.order.shuffle(rng);
        self.order.insert(0, first);
        self.pos = Some(0);
    }

    /// Item `seek_to_next` would move to.
    pub fn next_index(&self) -> Option<usize> {
        let pos = self.pos?;
        if pos + 1 < self.order.len() {
            Some(self.order[pos + 1])
        } else if self.repeat == RepeatMode::All {
            self.order.first().copied()
        } else {
            None
        }
    }

    /// Item `seek_to_previous` would move to.
    pub fn previous_index(&self) -> Option<usize> {
        let pos = self.pos?;
        if pos > 0 {
            Some(self.order[pos - 1])
        } else if self.repeat == RepeatMode::All {
            self.order.last().copied()
        } else {
            None
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_index().is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous_index().is_some()
    }

    /// Item to play once the current one finishes on its own, or `None`
    /// when playback should end.
    pub fn advance_on_end(&self) -> Option<usize> {
        match self.repeat {
            RepeatMode::One => self.current(),
            RepeatMode::All | RepeatMode::Off => self.next_index(),
        }
    }
}
