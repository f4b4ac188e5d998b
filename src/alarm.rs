use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Caller-assigned alarm identifier, unique per scheduled task.
pub type AlarmId = i32;

/// Action carried by wakes that this daemon scheduled itself.
pub const ACTION_ALARM_TRIGGER: &str = "habit_alarmd.ALARM_TRIGGER";
/// Action the host sends once after a reboot.
pub const ACTION_BOOT_COMPLETED: &str = "habit_alarmd.BOOT_COMPLETED";

pub const DEFAULT_TITLE: &str = "Habit Reminder";
pub const DEFAULT_BODY: &str = "Time for your habit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmKind {
    /// rings until explicitly stopped
    #[default]
    Alarm,
    /// one notification and a short buzz
    Reminder,
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alarm => write!(f, "alarm"),
            Self::Reminder => write!(f, "reminder"),
        }
    }
}

/// A request to fire at an absolute time.
///
/// Re-submitting a request with the same id replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub id: AlarmId,
    /// epoch milliseconds
    pub fire_time_ms: i64,
    pub title: String,
    pub body: String,
    pub kind: AlarmKind,
    pub audio: bool,
    pub vibrate: bool,
}

/// The payload as it travels through the wake facility and back.
///
/// Every field may be missing; [`TriggerPayload::resolve`] fills in the
/// documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(rename = "ALARM_ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AlarmId>,
    #[serde(rename = "ALARM_TITLE", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "ALARM_BODY", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "IS_ALARM", default, skip_serializing_if = "Option::is_none")]
    pub is_alarm: Option<bool>,
    #[serde(rename = "ALARM_AUDIO", default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(rename = "ALARM_VIBRATE", default, skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<bool>,
}

impl From<&AlarmRequest> for TriggerPayload {
    fn from(request: &AlarmRequest) -> Self {
        Self {
            id: Some(request.id),
            title: Some(request.title.clone()),
            body: Some(request.body.clone()),
            is_alarm: Some(request.kind == AlarmKind::Alarm),
            audio: Some(request.audio),
            vibrate: Some(request.vibrate),
        }
    }
}

impl TriggerPayload {
    /// Applies the per-field defaults: id `0`, title `"Habit Reminder"`,
    /// body `"Time for your habit"`, and `true` for the three flags.
    #[must_use]
    pub fn resolve(&self) -> Delivery {
        Delivery {
            id: self.id.unwrap_or_default(),
            title: self
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: self.body.clone().unwrap_or_else(|| DEFAULT_BODY.to_string()),
            kind: if self.is_alarm.unwrap_or(true) {
                AlarmKind::Alarm
            } else {
                AlarmKind::Reminder
            },
            audio: self.audio.unwrap_or(true),
            vibrate: self.vibrate.unwrap_or(true),
        }
    }
}

/// A validated payload, ready for the trigger handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: AlarmId,
    pub title: String,
    pub body: String,
    pub kind: AlarmKind,
    pub audio: bool,
    pub vibrate: bool,
}

/// A wake registered with the alarm clock, consumed when it fires or is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTrigger {
    pub id: AlarmId,
    pub fire_time_ms: i64,
    pub payload: TriggerPayload,
}

impl From<&AlarmRequest> for PendingTrigger {
    fn from(request: &AlarmRequest) -> Self {
        Self {
            id: request.id,
            fire_time_ms: request.fire_time_ms,
            payload: TriggerPayload::from(request),
        }
    }
}

impl PendingTrigger {
    #[must_use]
    pub fn into_wake(self) -> Wake {
        Wake {
            action: ACTION_ALARM_TRIGGER.to_string(),
            payload: self.payload,
        }
    }
}

/// What the host hands the trigger handler when something wakes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wake {
    pub action: String,
    pub payload: TriggerPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCause {
    AlarmTrigger,
    BootCompleted,
}

impl Wake {
    /// # Errors
    /// [`Error::UnrecognizedTrigger`] for any action this daemon doesn't own.
    pub fn cause(&self) -> Result<TriggerCause> {
        match self.action.as_str() {
            ACTION_ALARM_TRIGGER => Ok(TriggerCause::AlarmTrigger),
            ACTION_BOOT_COMPLETED => Ok(TriggerCause::BootCompleted),
            other => Err(Error::UnrecognizedTrigger {
                action: other.to_string(),
            }),
        }
    }
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

fn default_task_title() -> String {
    "Habit".to_string()
}

fn default_task_body() -> String {
    DEFAULT_BODY.to_string()
}

/// Arguments of `scheduleTask` as the UI layer sends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTask {
    #[serde(default)]
    pub id: AlarmId,
    #[serde(default)]
    pub time_ms: i64,
    #[serde(default = "default_task_title")]
    pub title: String,
    #[serde(default = "default_task_body")]
    pub body: String,
    #[serde(default = "always_true")]
    pub is_alarm: bool,
    #[serde(default = "always_true")]
    pub audio: bool,
    #[serde(default = "always_true")]
    pub vibrate: bool,
}

impl From<ScheduleTask> for AlarmRequest {
    fn from(task: ScheduleTask) -> Self {
        Self {
            id: task.id,
            fire_time_ms: task.time_ms,
            title: task.title,
            body: task.body,
            kind: if task.is_alarm {
                AlarmKind::Alarm
            } else {
                AlarmKind::Reminder
            },
            audio: task.audio,
            vibrate: task.vibrate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_resolves_to_documented_defaults() {
        let delivery = TriggerPayload::default().resolve();
        assert_eq!(delivery.id, 0);
        assert_eq!(delivery.title, "Habit Reminder");
        assert_eq!(delivery.body, "Time for your habit");
        assert_eq!(delivery.kind, AlarmKind::Alarm);
        assert!(delivery.audio);
        assert!(delivery.vibrate);
    }

    #[test]
    fn payload_uses_wire_keys() {
        let payload: TriggerPayload =
            serde_json::from_str(r#"{"ALARM_ID": 7, "IS_ALARM": false, "ALARM_AUDIO": false}"#)
                .unwrap();
        let delivery = payload.resolve();
        assert_eq!(delivery.id, 7);
        assert_eq!(delivery.kind, AlarmKind::Reminder);
        assert!(!delivery.audio);
        assert!(delivery.vibrate);
    }

    #[test]
    fn request_survives_the_wake_facility() {
        let request = AlarmRequest {
            id: 3,
            fire_time_ms: 1_700_000_000_000,
            title: "Read".to_string(),
            body: "Ten pages".to_string(),
            kind: AlarmKind::Reminder,
            audio: false,
            vibrate: true,
        };
        let wake = PendingTrigger::from(&request).into_wake();
        assert_eq!(wake.cause().unwrap(), TriggerCause::AlarmTrigger);
        let delivery = wake.payload.resolve();
        assert_eq!(delivery.id, 3);
        assert_eq!(delivery.title, "Read");
        assert_eq!(delivery.body, "Ten pages");
        assert_eq!(delivery.kind, AlarmKind::Reminder);
        assert!(!delivery.audio);
    }

    #[test]
    fn foreign_actions_are_unrecognized() {
        let wake = Wake {
            action: "android.intent.action.TIMEZONE_CHANGED".to_string(),
            payload: TriggerPayload::default(),
        };
        assert!(matches!(
            wake.cause(),
            Err(Error::UnrecognizedTrigger { action }) if action.contains("TIMEZONE")
        ));
    }

    #[test]
    fn schedule_task_fills_missing_arguments() {
        let task: ScheduleTask = serde_json::from_str(r#"{"id": 9, "timeMs": 42}"#).unwrap();
        assert_eq!(task.title, "Habit");
        assert_eq!(task.body, "Time for your habit");
        let request = AlarmRequest::from(task);
        assert_eq!(request.kind, AlarmKind::Alarm);
        assert_eq!(request.fire_time_ms, 42);
        assert!(request.audio && request.vibrate);
    }
}
