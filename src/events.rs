use crate::sequencer::{DisplayMode, TimerId, TimerKind};
use crate::verse::VerseText;

/// Everything the sequencer reacts to. Collaborators only deliver snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    VerseReady(String),
    /// Full replacement of the family list, newest first.
    FamilyPhotosReady {
        paths: Vec<String>,
        new_upload: bool,
    },
    /// Replacement camera snapshots plus any motion clips that just arrived.
    CameraMediaReady {
        images: Vec<String>,
        videos: Vec<String>,
    },
    /// Wall-clock poll; drives the hourly restart.
    ClockTick,
    TimerFired {
        kind: TimerKind,
        id: TimerId,
    },
    /// The renderer finished playing the current motion clip.
    ClipFinished,
    /// The renderer could not play this clip.
    ClipFailed(String),
    /// The renderer could not show this image.
    ItemFailed(String),
}

/// Fire-and-forget requests to the collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    Verse,
    CameraMedia,
    PhotoSync,
    Cleanup,
}

/// What the renderer should put on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Loading,
    Verse(VerseText),
    Photo { category: DisplayMode, item: String },
    Clip { item: String },
    Unavailable { category: DisplayMode, message: &'static str },
}

impl View {
    pub fn mode(&self) -> DisplayMode {
        match self {
            View::Loading => DisplayMode::Loading,
            View::Verse(_) => DisplayMode::Verse,
            View::Photo { category, .. } | View::Unavailable { category, .. } => *category,
            View::Clip { .. } => DisplayMode::Motion,
        }
    }

    pub fn item(&self) -> Option<&str> {
        match self {
            View::Photo { item, .. } | View::Clip { item } => Some(item),
            _ => None,
        }
    }
}
