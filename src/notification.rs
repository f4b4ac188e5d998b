//! Notification channels, records and vibration patterns shared by the
//! session and the reminder path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;

pub type NotificationId = i32;

/// Id of the persistent notification that backs a ringing session.
pub const FOREGROUND_NOTIFICATION_ID: NotificationId = 1001;
/// Route the UI shows while an alarm rings.
pub const RINGING_ROUTE: &str = "/alarm-ring";
/// Key of the notification action that stops the ringing session.
pub const STOP_ACTION: &str = "stop";
/// Action key hosts report for a tap on the notification body.
pub const DEFAULT_ACTION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Importance {
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub importance: Importance,
    /// whether the channel itself plays a sound
    pub sound: bool,
    pub vibration: bool,
}

/// Silent and without channel vibration: the session drives both itself.
pub const ALARM_CHANNEL: NotificationChannel = NotificationChannel {
    id: "habit_alarmd_alarm_channel",
    name: "Alarms",
    description: "High priority alarms",
    importance: Importance::High,
    sound: false,
    vibration: false,
};

pub const REMINDER_CHANNEL: NotificationChannel = NotificationChannel {
    id: "habit_alarmd_reminder_channel",
    name: "Reminders",
    description: "Gentle reminders",
    importance: Importance::Default,
    sound: true,
    vibration: true,
};

/// Ids are only unique within a channel, so a shown notification is
/// addressed by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationKey {
    pub channel: &'static str,
    pub id: NotificationId,
}

impl NotificationKey {
    /// The ringing session's notification.
    pub const RINGING: Self = Self {
        channel: ALARM_CHANNEL.id,
        id: FOREGROUND_NOTIFICATION_ID,
    };

    #[must_use]
    pub const fn reminder(id: AlarmId) -> Self {
        Self {
            channel: REMINDER_CHANNEL.id,
            id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Default,
    Max,
}

/// Where the UI should open when a notification is tapped or launched full screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchTarget {
    /// `None` opens the default entry point
    pub route: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl LaunchTarget {
    #[must_use]
    pub fn app() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ringing(title: &str, body: &str) -> Self {
        Self {
            route: Some(RINGING_ROUTE.to_string()),
            title: Some(title.to_string()),
            body: Some(body.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub channel: &'static str,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// can't be swiped away
    pub ongoing: bool,
    pub auto_cancel: bool,
    pub full_screen: Option<LaunchTarget>,
    pub tap: Option<LaunchTarget>,
    pub actions: Vec<NotificationAction>,
}

/// What a tap or an action press on a posted notification asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// STOP on the ringing notification
    StopAlarm,
    /// bring the UI up at this target
    Open(LaunchTarget),
}

impl NotificationRecord {
    #[must_use]
    pub const fn key(&self) -> NotificationKey {
        NotificationKey {
            channel: self.channel,
            id: self.id,
        }
    }

    /// Resolves an action key reported by the host against this record.
    /// Keys the record never offered resolve to nothing.
    #[must_use]
    pub fn interaction(&self, action: &str) -> Option<Interaction> {
        if action == DEFAULT_ACTION {
            return self
                .tap
                .clone()
                .or_else(|| self.full_screen.clone())
                .map(Interaction::Open);
        }
        let offered = self.actions.iter().any(|offered| offered.key == action);
        (offered && action == STOP_ACTION).then_some(Interaction::StopAlarm)
    }

    /// The persistent, non-dismissible notification of a ringing session.
    #[must_use]
    pub fn ringing(title: &str, body: &str) -> Self {
        Self {
            id: FOREGROUND_NOTIFICATION_ID,
            channel: ALARM_CHANNEL.id,
            title: title.to_string(),
            body: body.to_string(),
            priority: Priority::Max,
            ongoing: true,
            auto_cancel: false,
            full_screen: Some(LaunchTarget::ringing(title, body)),
            tap: None,
            actions: vec![NotificationAction {
                key: STOP_ACTION,
                label: "STOP",
            }],
        }
    }

    /// A one-shot reminder keyed by the alarm id; tapping it opens the app.
    #[must_use]
    pub fn reminder(id: AlarmId, title: &str, body: &str) -> Self {
        Self {
            id,
            channel: REMINDER_CHANNEL.id,
            title: title.to_string(),
            body: body.to_string(),
            priority: Priority::Default,
            ongoing: false,
            auto_cancel: true,
            full_screen: None,
            tap: Some(LaunchTarget::app()),
            actions: Vec::new(),
        }
    }
}

/// Alternating off/on timings in milliseconds, starting with an off period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationPattern {
    pub timings_ms: &'static [u64],
    /// index to loop back to, `None` plays once
    pub repeat: Option<usize>,
}

/// Immediate start, 1s on, 1s off, forever.
pub const ALARM_WAVEFORM: VibrationPattern = VibrationPattern {
    timings_ms: &[0, 1000, 1000],
    repeat: Some(0),
};

pub const REMINDER_PULSE: Duration = Duration::from_millis(500);
