use std::sync::Arc;

use log::{debug, info};

use crate::{
    alarm::{AlarmKind, TriggerCause, Wake},
    notification::{NotificationRecord, REMINDER_PULSE},
    platform::Platform,
    session::AlarmSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// handed to the ringing session
    Escalated,
    ReminderPosted,
    Ignored,
}

/// Reacts to wakes delivered by the host, one at a time.
#[derive(Debug, Clone)]
pub struct TriggerHandler {
    platform: Platform,
    session: Arc<AlarmSession>,
}

impl TriggerHandler {
    #[must_use]
    pub const fn new(platform: Platform, session: Arc<AlarmSession>) -> Self {
        Self { platform, session }
    }

    /// Returns quickly for every kind: ringing itself is left to the session.
    pub fn handle(&self, wake: &Wake) -> Outcome {
        match wake.cause() {
            Ok(TriggerCause::AlarmTrigger) => {}
            Ok(TriggerCause::BootCompleted) => {
                debug!("boot wake is not an alarm, ignoring");
                return Outcome::Ignored;
            }
            Err(e) => {
                debug!("{e}, ignoring");
                return Outcome::Ignored;
            }
        }

        let delivery = wake.payload.resolve();
        info!(
            "wake for {} {} (audio={}, vibrate={})",
            delivery.kind, delivery.id, delivery.audio, delivery.vibrate
        );
        match delivery.kind {
            AlarmKind::Alarm => {
                self.session.deliver(&delivery);
                Outcome::Escalated
            }
            AlarmKind::Reminder => {
                self.platform.vibrator.one_shot(REMINDER_PULSE);
                self.platform.notifier.post(&NotificationRecord::reminder(
                    delivery.id,
                    &delivery.title,
                    &delivery.body,
                ));
                Outcome::ReminderPosted
            }
        }
    }
}
