//! The calls the UI layer makes, with the acknowledgements it expects back.

use std::sync::Arc;

use log::{info, warn};

use crate::{
    alarm::{AlarmId, AlarmRequest, PendingTrigger, ScheduleTask},
    notification::{Interaction, LaunchTarget},
    scheduler::Scheduler,
    session::{AlarmSession, SessionSnapshot},
};

#[derive(Debug, Clone)]
pub struct AlarmBridge {
    scheduler: Scheduler,
    session: Arc<AlarmSession>,
}

impl AlarmBridge {
    #[must_use]
    pub const fn new(scheduler: Scheduler, session: Arc<AlarmSession>) -> Self {
        Self { scheduler, session }
    }

    /// `false` when the task couldn't be scheduled, most often because exact
    /// alarms aren't permitted yet.
    pub fn schedule_task(&self, task: ScheduleTask) -> bool {
        let request = AlarmRequest::from(task);
        match self.scheduler.schedule(&request) {
            Ok(()) => true,
            Err(e) => {
                warn!("scheduleTask {}: {e}", request.id);
                false
            }
        }
    }

    pub fn cancel_task(&self, id: AlarmId) -> bool {
        self.scheduler.cancel(id);
        true
    }

    pub fn stop_alarm(&self) {
        info!("stopAlarm");
        self.session.stop();
    }

    #[must_use]
    pub fn check_exact_alarm_permission(&self) -> bool {
        self.scheduler.check_exact_permission()
    }

    pub fn request_exact_alarm_permission(&self) {
        self.scheduler.request_exact_permission();
    }

    #[must_use]
    pub fn pending(&self) -> Vec<PendingTrigger> {
        self.scheduler.pending()
    }

    #[must_use]
    pub fn status(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Acts on a tap or action press. Returns where the UI should open, if
    /// anywhere.
    pub fn on_interaction(&self, interaction: Interaction) -> Option<LaunchTarget> {
        match interaction {
            Interaction::StopAlarm => {
                info!("stop pressed on the ringing notification");
                self.session.stop();
                None
            }
            Interaction::Open(target) => Some(target),
        }
    }
}
