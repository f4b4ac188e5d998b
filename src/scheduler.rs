use std::sync::Arc;

use log::{info, warn};

use crate::{
    alarm::{AlarmId, AlarmRequest, PendingTrigger},
    error::{Error, Result},
    platform::AlarmClock,
};

/// Turns alarm requests into exact wake triggers.
#[derive(Clone)]
pub struct Scheduler {
    clock: Arc<dyn AlarmClock>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(clock: Arc<dyn AlarmClock>) -> Self {
        Self { clock }
    }

    /// Registers one wake for `request.id`, replacing any earlier one.
    ///
    /// # Errors
    /// [`Error::PermissionRequired`] when exact wake-ups aren't allowed. The
    /// request is dropped rather than scheduled with looser timing.
    pub fn schedule(&self, request: &AlarmRequest) -> Result<()> {
        if !self.clock.can_schedule_exact() {
            warn!(
                "cannot schedule exact alarm {}: permission denied",
                request.id
            );
            return Err(Error::PermissionRequired { id: request.id });
        }
        self.clock.set_alarm_clock(PendingTrigger::from(request))?;
        info!(
            "scheduled {} {} at {}",
            request.kind, request.id, request.fire_time_ms
        );
        Ok(())
    }

    /// Cancelling an id that was never scheduled is fine.
    pub fn cancel(&self, id: AlarmId) {
        if self.clock.cancel(id) {
            info!("cancelled alarm {id}");
        } else {
            info!("cancel for alarm {id}: nothing pending");
        }
    }

    #[must_use]
    pub fn check_exact_permission(&self) -> bool {
        self.clock.can_schedule_exact()
    }

    pub fn request_exact_permission(&self) {
        self.clock.request_exact_permission();
    }

    #[must_use]
    pub fn pending(&self) -> Vec<PendingTrigger> {
        let mut pending = self.clock.pending();
        pending.sort_by_key(|trigger| (trigger.fire_time_ms, trigger.id));
        pending
    }
}
