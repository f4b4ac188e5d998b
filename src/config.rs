use std::{fmt, fs, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    alarm::always_true,
    error::{Error, Result},
};

const PROJECT_NAME: &str = "habit_alarmd";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// namespaced local socket the daemon listens on
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    /// ceiling on how long a ringing session may keep the machine awake
    #[serde(default = "default_wake_lock_timeout_secs")]
    pub wake_lock_timeout_secs: u64,
    /// whether exact wake-ups start out allowed
    #[serde(default = "always_true")]
    pub exact_alarms_allowed: bool,
    /// replay the ringing marker after the daemon restarts mid-ring
    #[serde(default = "always_true")]
    pub resume_interrupted_session: bool,
    #[serde(default)]
    pub tones: Tones,
}

fn default_socket_name() -> String {
    "habit-alarmd.sock".to_string()
}

const fn default_wake_lock_timeout_secs() -> u64 {
    10 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
            wake_lock_timeout_secs: default_wake_lock_timeout_secs(),
            exact_alarms_allowed: true,
            resume_interrupted_session: true,
            tones: Tones::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// If the file can't be read or isn't valid toml for a config.
    pub fn load(path: PathBuf) -> Result<Self> {
        let config = fs::read_to_string(&path)?;
        toml::from_str(&config).map_err(|source| Error::Parse { path, source })
    }

    /// Falls back to the defaults when no config file has been written yet.
    ///
    /// # Errors
    /// If a config file exists but can't be loaded.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// # Errors
    /// If the config can't be serialized or written.
    pub fn save(&self, path: PathBuf) -> Result<()> {
        let config = toml::to_string(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, config)?;
        Ok(())
    }

    #[must_use]
    pub const fn wake_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.wake_lock_timeout_secs)
    }

    fn project_dirs() -> Result<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", PROJECT_NAME).ok_or(Error::NoProjectDirs)
    }

    /// # Errors
    /// If there's no home directory.
    pub fn config_path() -> Result<PathBuf> {
        let mut path = Self::project_dirs()?.config_dir().to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    /// # Errors
    /// If there's no home directory.
    pub fn pending_path() -> Result<PathBuf> {
        let mut path = Self::project_dirs()?.data_dir().to_path_buf();
        path.push("pending.toml");
        Ok(path)
    }

    /// # Errors
    /// If there's no home directory.
    pub fn marker_path() -> Result<PathBuf> {
        let mut path = Self::project_dirs()?.data_dir().to_path_buf();
        path.push("ringing.toml");
        Ok(path)
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_ok_and(|path| path.exists())
    }
}

/// Tones the ringing session can loop.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Tones {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_tone: Option<Sound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_tone: Option<Sound>,
}

impl Default for Tones {
    fn default() -> Self {
        Self {
            alarm_tone: Some(Sound::alarm_clock()),
            notification_tone: Some(Sound::message()),
        }
    }
}

impl Tones {
    /// The alarm tone, or the notification tone when no alarm tone is set.
    #[must_use]
    pub fn resolve(&self) -> Option<&Sound> {
        self.alarm_tone.as_ref().or(self.notification_tone.as_ref())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Sound {
    pub name: String,
    pub path: PathBuf,
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.name,
            self.path
                .file_name()
                .map_or_else(|| self.path.to_string_lossy(), |name| name.to_string_lossy())
        )
    }
}

const FREEDESKTOP_SOUNDS: &str = "/usr/share/sounds/freedesktop/stereo";

impl Sound {
    #[must_use]
    pub const fn new(name: String, path: PathBuf) -> Self {
        Self { name, path }
    }

    #[must_use]
    pub fn alarm_clock() -> Self {
        Self {
            name: "alarm clock".to_string(),
            path: PathBuf::from(FREEDESKTOP_SOUNDS).join("alarm-clock-elapsed.oga"),
        }
    }

    #[must_use]
    pub fn message() -> Self {
        Self {
            name: "message".to_string(),
            path: PathBuf::from(FREEDESKTOP_SOUNDS).join("message.oga"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.wake_lock_timeout(), Duration::from_secs(600));
        assert_eq!(config.socket_name, "habit-alarmd.sock");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");
        let config = Config {
            exact_alarms_allowed: false,
            tones: Tones {
                alarm_tone: None,
                notification_tone: Some(Sound::new("ping".to_string(), "/tmp/ping.ogg".into())),
            },
            ..Config::default()
        };
        config.save(path.clone()).unwrap();
        assert_eq!(Config::load(path).unwrap(), config);
    }

    #[test]
    fn invalid_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "wake_lock_timeout_secs = \"soon\"").unwrap();
        match Config::load(path.clone()) {
            Err(Error::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn notification_tone_backs_up_a_missing_alarm_tone() {
        let tones = Tones {
            alarm_tone: None,
            notification_tone: Some(Sound::message()),
        };
        assert_eq!(tones.resolve(), Some(&Sound::message()));

        let silent = Tones {
            alarm_tone: None,
            notification_tone: None,
        };
        assert!(silent.resolve().is_none());
    }

    #[test]
    fn sound_displays_file_name() {
        assert_eq!(
            Sound::alarm_clock().to_string(),
            "alarm clock:alarm-clock-elapsed.oga"
        );
    }
}
