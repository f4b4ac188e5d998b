use std::path::PathBuf;

use thiserror::Error;

use crate::alarm::AlarmId;

/// Errors surfaced by the alarm daemon.
///
/// Releasing a resource that is not held is never an error: every teardown
/// path is idempotent and simply skips what is absent.
#[derive(Error, Debug)]
pub enum Error {
    /// Exact wake-ups need user consent and it has not been granted.
    #[error("exact alarm permission not granted, alarm {id} was not scheduled")]
    PermissionRequired { id: AlarmId },

    /// The alarm tone couldn't be opened, decoded or sent to an output device.
    #[error("alarm tone playback failed: {reason}")]
    PlaybackFailure { reason: String },

    /// A wake arrived for a cause this daemon did not schedule.
    #[error("unrecognized trigger cause `{action}`")]
    UnrecognizedTrigger { action: String },

    /// No home directory to derive config/data paths from.
    #[error("couldn't determine the habit_alarmd project directories")]
    NoProjectDirs,

    #[error("couldn't parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("couldn't serialize toml: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected reply from daemon: {0}")]
    UnexpectedReply(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn playback(reason: impl Into<String>) -> Self {
        Self::PlaybackFailure {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
