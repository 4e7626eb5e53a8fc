use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the external collaborators (scripts, media directories).
///
/// These are logged and absorbed by the collaborator tasks; the sequencer only
/// ever sees "no new data this cycle".
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The configured argv is empty.
    #[error("no command configured")]
    NoCommand,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("cannot read media directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
