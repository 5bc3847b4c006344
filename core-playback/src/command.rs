//! Commands accepted by the playback engine.

use crate::types::{RepeatMode, Track};
use std::time::Duration;

/// An intent for the playback engine, from the UI or the media session.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    /// Replace the queue with a single track and play it.
    Play(Track),
    /// Replace the queue and play from `start_index`.
    PlayQueue {
        tracks: Vec<Track>,
        start_index: usize,
    },
    Pause,
    Resume,
    TogglePlayPause,
    Stop,
    Next,
    Previous,
    SkipTo(usize),
    Seek(Duration),
    SetShuffle(bool),
    ToggleShuffle,
    SetRepeat(RepeatMode),
    CycleRepeat,
    SetSpeed(f32),
    /// Add tracks at the end of the queue.
    Append(Vec<Track>),
    /// Insert tracks right after the current one.
    PlayNext(Vec<Track>),
    Remove(usize),
    Move {
        from: usize,
        to: usize,
    },
    ClearQueue,
}

impl PlaybackCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackCommand::Play(_) => "play",
            PlaybackCommand::PlayQueue { .. } => "play_queue",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Resume => "resume",
            PlaybackCommand::TogglePlayPause => "toggle_play_pause",
            PlaybackCommand::Stop => "stop",
            PlaybackCommand::Next => "next",
            PlaybackCommand::Previous => "previous",
            PlaybackCommand::SkipTo(_) => "skip_to",
            PlaybackCommand::Seek(_) => "seek",
            PlaybackCommand::SetShuffle(_) => "set_shuffle",
            PlaybackCommand::ToggleShuffle => "toggle_shuffle",
            PlaybackCommand::SetRepeat(_) => "set_repeat",
            PlaybackCommand::CycleRepeat => "cycle_repeat",
            PlaybackCommand::SetSpeed(_) => "set_speed",
            PlaybackCommand::Append(_) => "append",
            PlaybackCommand::PlayNext(_) => "play_next",
            PlaybackCommand::Remove(_) => "remove",
            PlaybackCommand::Move { .. } => "move",
            PlaybackCommand::ClearQueue => "clear_queue",
        }
    }

    /// Whether the command starts a new user-initiated transition.
    pub(crate) fn is_navigation(&self) -> bool {
        matches!(
            self,
            PlaybackCommand::Play(_)
                | PlaybackCommand::PlayQueue { .. }
                | PlaybackCommand::Resume
                | PlaybackCommand::TogglePlayPause
                | PlaybackCommand::Next
                | PlaybackCommand::Previous
                | PlaybackCommand::SkipTo(_)
                | PlaybackCommand::Stop
        )
    }
}

/// Discrete signals from the OS media session or notification controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Play,
    Pause,
    SkipNext,
    SkipPrevious,
    ToggleShuffle,
    CycleRepeat,
}

impl From<MediaCommand> for PlaybackCommand {
    fn from(command: MediaCommand) -> Self {
        match command {
            MediaCommand::Play => PlaybackCommand::Resume,
            MediaCommand::Pause => PlaybackCommand::Pause,
            MediaCommand::SkipNext => PlaybackCommand::Next,
            MediaCommand::SkipPrevious => PlaybackCommand::Previous,
            MediaCommand::ToggleShuffle => PlaybackCommand::ToggleShuffle,
            MediaCommand::CycleRepeat => PlaybackCommand::CycleRepeat,
        }
    }
}
