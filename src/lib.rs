pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod processing {
    pub mod layout;
}
pub mod sequencer;
pub mod slide_order;
pub mod verse;
pub mod tasks {
    pub mod camera;
    pub mod command;
    pub mod display;
    pub mod library;
    pub mod sequencer;
    pub mod verse;
    pub mod watch;
}

pub use sequencer::{Command, DisplayMode, Sequencer, SequencerOptions};
