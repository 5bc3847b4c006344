//! # Queue Engine
//!
//! Owns the ordered playback queue, the current index and the shuffle/repeat
//! rules used to move through it.
//!
//! ## Identity
//!
//! Every slot is a [`QueueEntry`] with its own [`EntryId`]. The current
//! position is tracked by index, and shuffle restore locates the current slot
//! by entry id, so a track that appears twice is never confused with its copy.
//!
//! ## Shuffle
//!
//! Enabling shuffle snapshots the unshuffled order and permutes the queue with
//! the current entry pinned at index 0. Disabling restores the snapshot and
//! points the index at the same entry. While repeat is `One` the flag flips
//! without reordering; the order is reconciled when repeat leaves `One`.

use crate::error::{PlaybackError, Result};
use crate::shuffle::shuffle_pinned;
use crate::types::{EntryId, QueueEntry, RepeatMode, Track};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Result of moving through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The current index moved; load the entry at this index.
    Moved(usize),
    /// Stay on this index and play it again from the start.
    Restart(usize),
    /// Forward past the last entry with repeat off. Nothing changed.
    EndOfQueue,
}

/// Result of removing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// A non-current entry was removed.
    Removed,
    /// The current entry was removed. `next` is the index to play now, or
    /// `None` when playback should stop.
    CurrentRemoved { next: Option<usize> },
}

pub struct QueueEngine {
    entries: Vec<QueueEntry>,
    /// Unshuffled order, present while the queue is shuffled.
    original: Option<Vec<QueueEntry>>,
    current: Option<usize>,
    repeat: RepeatMode,
    shuffle: bool,
    previous_threshold: Duration,
    rng: StdRng,
}

impl QueueEngine {
    /// Create an empty queue. `previous_threshold` is the position after
    /// which "previous" restarts the current track.
    pub fn new(previous_threshold: Duration) -> Self {
        Self::with_rng(previous_threshold, StdRng::from_entropy())
    }

    /// Create an empty queue with a deterministic shuffle.
    pub fn with_seed(previous_threshold: Duration, seed: u64) -> Self {
        Self::with_rng(previous_threshold, StdRng::seed_from_u64(seed))
    }

    fn with_rng(previous_threshold: Duration, rng: StdRng) -> Self {
        Self {
            entries: Vec::new(),
            original: None,
            current: None,
            repeat: RepeatMode::Off,
            shuffle: false,
            previous_threshold,
            rng,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_entry(&self) -> Option<&QueueEntry> {
        self.current.and_then(|i| self.entries.get(i))
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_entry().map(|e| &e.track)
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Shared copy for state snapshots.
    pub fn snapshot(&self) -> Arc<[QueueEntry]> {
        Arc::from(self.entries.as_slice())
    }

    /// Tracks in play order.
    pub fn tracks(&self) -> Vec<Track> {
        self.entries.iter().map(|e| e.track.clone()).collect()
    }

    /// Unshuffled order while shuffle is applied.
    pub fn original_order(&self) -> Option<&[QueueEntry]> {
        self.original.as_deref()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    fn position_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    // ========================================================================
    // Replacing the queue
    // ========================================================================

    /// Replace the queue and start at `start_index`, clamped into range.
    ///
    /// Returns `false` and leaves the queue untouched when `tracks` is empty.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> bool {
        if tracks.is_empty() {
            debug!("Ignoring empty queue");
            return false;
        }

        self.entries = tracks.into_iter().map(QueueEntry::new).collect();
        self.original = None;
        self.current = Some(start_index.min(self.entries.len() - 1));

        if self.shuffle && self.repeat != RepeatMode::One {
            self.apply_shuffle();
        }

        debug!(
            len = self.entries.len(),
            current = ?self.current,
            shuffled = self.original.is_some(),
            "Queue replaced"
        );
        true
    }

    /// Restore a persisted queue as-is, with its modes, without reordering.
    pub fn restore(
        &mut self,
        tracks: Vec<Track>,
        index: usize,
        repeat: RepeatMode,
        shuffle: bool,
    ) -> bool {
        self.repeat = repeat;
        self.shuffle = shuffle;

        if tracks.is_empty() {
            return false;
        }

        self.entries = tracks.into_iter().map(QueueEntry::new).collect();
        self.original = None;
        self.current = Some(index.min(self.entries.len() - 1));
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.original = None;
        self.current = None;
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Move one step in `direction`.
    ///
    /// `position` is the playback position of the current track and drives
    /// the restart-instead-of-previous rule.
    pub fn advance(&mut self, direction: Direction, position: Duration) -> AdvanceOutcome {
        let len = self.entries.len();
        let Some(cur) = self.current.filter(|&c| c < len) else {
            return AdvanceOutcome::EndOfQueue;
        };

        match direction {
            Direction::Next => match self.repeat {
                RepeatMode::One => AdvanceOutcome::Restart(cur),
                RepeatMode::All => self.move_to((cur + 1) % len),
                RepeatMode::Off if cur + 1 < len => self.move_to(cur + 1),
                RepeatMode::Off => AdvanceOutcome::EndOfQueue,
            },
            Direction::Previous => {
                if position > self.previous_threshold {
                    return AdvanceOutcome::Restart(cur);
                }

                match self.repeat {
                    RepeatMode::One => AdvanceOutcome::Restart(cur),
                    RepeatMode::All => self.move_to((cur + len - 1) % len),
                    RepeatMode::Off if cur > 0 => self.move_to(cur - 1),
                    RepeatMode::Off => AdvanceOutcome::Restart(0),
                }
            }
        }
    }

    fn move_to(&mut self, index: usize) -> AdvanceOutcome {
        if self.current == Some(index) {
            return AdvanceOutcome::Restart(index);
        }
        self.current = Some(index);
        AdvanceOutcome::Moved(index)
    }

    /// Step forward after a failure.
    ///
    /// Unlike [`advance`](Self::advance), repeat `One` does not replay the
    /// failed entry; both `One` and `All` wrap around.
    pub fn skip_forward(&mut self) -> Option<usize> {
        let len = self.entries.len();
        let cur = self.current?;

        let next = if cur + 1 < len {
            cur + 1
        } else if self.repeat != RepeatMode::Off && len > 0 {
            0
        } else {
            return None;
        };

        self.current = Some(next);
        Some(next)
    }

    /// Jump to `index`.
    pub fn skip_to(&mut self, index: usize) -> Result<&QueueEntry> {
        let len = self.entries.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }
        self.current = Some(index);
        Ok(&self.entries[index])
    }

    // ========================================================================
    // Modes
    // ========================================================================

    /// Enable or disable shuffle. Returns `false` when nothing changed.
    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        if self.shuffle == enabled {
            return false;
        }
        self.shuffle = enabled;

        if self.repeat == RepeatMode::One {
            debug!(enabled, "Shuffle flag changed under repeat one, order kept");
            return true;
        }

        if enabled {
            self.apply_shuffle();
        } else {
            self.restore_order();
        }
        true
    }

    /// Flip shuffle and return the new state.
    pub fn toggle_shuffle(&mut self) -> bool {
        self.set_shuffle(!self.shuffle);
        self.shuffle
    }

    /// Change the repeat mode. Returns `false` when nothing changed.
    pub fn set_repeat_mode(&mut self, mode: RepeatMode) -> bool {
        if self.repeat == mode {
            return false;
        }

        let leaving_one = self.repeat == RepeatMode::One;
        self.repeat = mode;

        if leaving_one {
            if self.shuffle {
                self.apply_shuffle();
            } else {
                self.restore_order();
            }
        }
        true
    }

    /// Advance to the next repeat mode and return it.
    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.set_repeat_mode(self.repeat.cycle());
        self.repeat
    }

    fn apply_shuffle(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        if self.original.is_none() {
            self.original = Some(self.entries.clone());
        }

        let pinned = self.current.unwrap_or(self.entries.len());
        shuffle_pinned(&mut self.entries, pinned, &mut self.rng);
        if self.current.is_some() {
            self.current = Some(0);
        }
    }

    fn restore_order(&mut self) {
        let Some(original) = self.original.take() else {
            return;
        };

        let current_id = self.current_entry().map(|e| e.id);
        self.entries = original;
        self.current = current_id.and_then(|id| self.position_of(id));
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Append tracks at the end. Returns the number of entries added.
    pub fn append(&mut self, tracks: Vec<Track>) -> usize {
        let len = self.entries.len();
        self.insert_at(len, tracks)
    }

    /// Insert tracks right after the current entry.
    pub fn play_next(&mut self, tracks: Vec<Track>) -> usize {
        let index = self.current.map_or(self.entries.len(), |c| c + 1);
        self.insert_at(index, tracks)
    }

    /// Insert tracks at `index`, clamped to the queue length.
    pub fn insert_at(&mut self, index: usize, tracks: Vec<Track>) -> usize {
        if tracks.is_empty() {
            return 0;
        }

        let index = index.min(self.entries.len());
        let new_entries: Vec<QueueEntry> = tracks.into_iter().map(QueueEntry::new).collect();
        let count = new_entries.len();

        let neighbour = index.checked_sub(1).map(|i| self.entries[i].id);
        if let Some(original) = self.original.as_mut() {
            // Keep the snapshot aligned: new entries follow the same neighbour.
            let at = match neighbour {
                Some(before) => original
                    .iter()
                    .position(|e| e.id == before)
                    .map_or(original.len(), |p| p + 1),
                None => 0,
            };
            original.splice(at..at, new_entries.iter().cloned());
        }

        self.entries.splice(index..index, new_entries);

        self.current = match self.current {
            Some(c) if index <= c => Some(c + count),
            Some(c) => Some(c),
            None => Some(0),
        };

        count
    }

    /// Remove the entry at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<RemoveOutcome> {
        let len = self.entries.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }

        let removed = self.entries.remove(index);
        if let Some(original) = self.original.as_mut() {
            original.retain(|e| e.id != removed.id);
        }

        let outcome = match self.current {
            Some(c) if index < c => {
                self.current = Some(c - 1);
                RemoveOutcome::Removed
            }
            Some(c) if index == c => {
                let remaining = self.entries.len();
                if remaining == 0 {
                    self.clear();
                    RemoveOutcome::CurrentRemoved { next: None }
                } else if index < remaining {
                    RemoveOutcome::CurrentRemoved { next: Some(index) }
                } else if self.repeat == RepeatMode::All {
                    self.current = Some(0);
                    RemoveOutcome::CurrentRemoved { next: Some(0) }
                } else {
                    self.current = Some(remaining - 1);
                    RemoveOutcome::CurrentRemoved { next: None }
                }
            }
            _ => RemoveOutcome::Removed,
        };

        Ok(outcome)
    }

    /// Move the entry at `from` to `to`.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.entries.len();
        for index in [from, to] {
            if index >= len {
                return Err(PlaybackError::IndexOutOfBounds { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);

        if let Some(c) = self.current {
            self.current = Some(if c == from {
                to
            } else if from < c && to >= c {
                c - 1
            } else if from > c && to <= c {
                c + 1
            } else {
                c
            });
        }

        Ok(())
    }
}
