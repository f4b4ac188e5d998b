use std::{sync::Arc, time::Duration};

use habit_alarmd::{
    alarm::ScheduleTask,
    bridge::AlarmBridge,
    notification::{
        NotificationKey, Priority, ALARM_WAVEFORM, FOREGROUND_NOTIFICATION_ID, STOP_ACTION,
    },
    platform::memory::{MemoryPlatform, VibrationEvent},
    scheduler::Scheduler,
    session::{AlarmSession, SessionOptions, SessionStatus},
    trigger::{Outcome, TriggerHandler},
};

const T: i64 = 1_700_000_000_000;

struct Harness {
    memory: MemoryPlatform,
    bridge: AlarmBridge,
    handler: TriggerHandler,
}

impl Harness {
    fn new() -> Self {
        let memory = MemoryPlatform::new();
        let platform = memory.platform();
        platform.create_channels();
        let session = Arc::new(AlarmSession::new(
            platform.clone(),
            SessionOptions::default(),
        ));
        Self {
            bridge: AlarmBridge::new(
                Scheduler::new(platform.clock.clone()),
                Arc::clone(&session),
            ),
            handler: TriggerHandler::new(platform, session),
            memory,
        }
    }

    fn fire_due(&self, now_ms: i64) -> Vec<Outcome> {
        self.memory
            .clock
            .fire_due(now_ms)
            .iter()
            .map(|wake| self.handler.handle(wake))
            .collect()
    }
}

fn task(id: i32, time_ms: i64, title: &str, is_alarm: bool) -> ScheduleTask {
    ScheduleTask {
        id,
        time_ms,
        title: title.to_string(),
        body: format!("Time for: {title}"),
        is_alarm,
        audio: true,
        vibrate: true,
    }
}

#[test]
fn two_alarms_share_one_session_until_stopped() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    assert_eq!(h.fire_due(T), vec![Outcome::Escalated]);

    let status = h.bridge.status();
    assert_eq!(status.status, SessionStatus::Ringing);
    assert_eq!(status.titles, vec!["Drink water"]);
    assert!(status.playing && status.vibrating && status.wake_lock_held);
    assert!(h.memory.host.is_foreground());
    assert_eq!(h.memory.notifier.launches().len(), 1);

    assert!(h.bridge.schedule_task(task(2, T, "Stretch", true)));
    assert_eq!(h.fire_due(T), vec![Outcome::Escalated]);

    let status = h.bridge.status();
    assert_eq!(status.titles, vec!["Drink water", "Stretch"]);
    assert!(status.combined_body.contains("Drink water"));
    assert!(status.combined_body.contains("Stretch"));
    assert_eq!(h.memory.audio.started(), 1);
    assert_eq!(h.memory.audio.playing(), 1);
    assert_eq!(h.memory.power.acquired(), 1);
    assert_eq!(h.memory.host.starts(), 1);
    let waveforms = h
        .memory
        .vibrator
        .events()
        .into_iter()
        .filter(|e| *e == VibrationEvent::Waveform(ALARM_WAVEFORM))
        .count();
    assert_eq!(waveforms, 1);
    let ringing = h.memory.notifier.shown(NotificationKey::RINGING).unwrap();
    assert_eq!(ringing.title, "Drink water, Stretch");
    assert_eq!(ringing.priority, Priority::Max);

    h.bridge.stop_alarm();
    let status = h.bridge.status();
    assert_eq!(status.status, SessionStatus::Idle);
    assert!(status.titles.is_empty());
    assert_eq!(h.memory.audio.playing(), 0);
    assert!(!h.memory.vibrator.is_repeating());
    assert_eq!(h.memory.power.held(), 0);
    assert!(!h.memory.host.is_foreground());
    assert!(h.memory.notifier.shown(NotificationKey::RINGING).is_none());
}

#[test]
fn reminder_only_posts_and_pulses() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(3, T, "Read", false)));
    assert_eq!(h.fire_due(T), vec![Outcome::ReminderPosted]);

    let reminder = h.memory.notifier.shown(NotificationKey::reminder(3)).unwrap();
    assert_eq!(reminder.title, "Read");
    assert!(reminder.auto_cancel);
    assert_eq!(
        h.memory.vibrator.events(),
        vec![VibrationEvent::OneShot(Duration::from_millis(500))]
    );
    assert_eq!(h.bridge.status().status, SessionStatus::Idle);
    assert_eq!(h.memory.host.starts(), 0);
    assert_eq!(h.memory.power.acquired(), 0);
    assert_eq!(h.memory.audio.started(), 0);
}

#[test]
fn rescheduling_an_id_replaces_the_trigger() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    assert!(h.bridge.schedule_task(task(1, T + 60_000, "Drink more water", true)));

    let pending = h.bridge.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].fire_time_ms, T + 60_000);
    assert!(h.fire_due(T).is_empty());
    assert_eq!(h.fire_due(T + 60_000), vec![Outcome::Escalated]);
    assert_eq!(h.bridge.status().titles, vec!["Drink more water"]);
}

#[test]
fn cancelling_an_unknown_id_is_fine() {
    let h = Harness::new();
    assert!(h.bridge.cancel_task(42));
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    assert!(h.bridge.cancel_task(1));
    assert!(h.bridge.cancel_task(1));
    assert!(h.bridge.pending().is_empty());
    assert!(h.fire_due(T).is_empty());
}

#[test]
fn silent_alarm_still_vibrates() {
    let h = Harness::new();
    let mut silent = task(5, T, "Meditate", true);
    silent.audio = false;
    assert!(h.bridge.schedule_task(silent));
    h.fire_due(T);

    let status = h.bridge.status();
    assert_eq!(status.status, SessionStatus::Ringing);
    assert!(!status.playing);
    assert!(status.vibrating);
    assert_eq!(h.memory.audio.started(), 0);
    assert!(h.memory.vibrator.is_repeating());
}

#[test]
fn broken_audio_still_rings() {
    let h = Harness::new();
    h.memory.audio.set_failing(true);
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    h.fire_due(T);

    let status = h.bridge.status();
    assert_eq!(status.status, SessionStatus::Ringing);
    assert!(!status.playing);
    assert!(status.vibrating && status.wake_lock_held);
}

#[test]
fn stop_twice_releases_once() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    h.fire_due(T);

    h.bridge.stop_alarm();
    h.bridge.stop_alarm();
    assert_eq!(h.memory.power.released(), 1);
    assert_eq!(h.memory.host.stops(), 1);
    assert_eq!(h.bridge.status().status, SessionStatus::Idle);
}

#[test]
fn stop_while_idle_does_nothing() {
    let h = Harness::new();
    h.bridge.stop_alarm();
    assert_eq!(h.memory.power.released(), 0);
    assert_eq!(h.memory.host.stops(), 0);
    assert!(h.memory.vibrator.events().is_empty());
}

#[test]
fn missing_consent_is_reported_and_nothing_is_registered() {
    let h = Harness::new();
    h.memory.clock.set_exact_allowed(false);
    assert!(!h.bridge.check_exact_alarm_permission());
    assert!(!h.bridge.schedule_task(task(1, T, "Drink water", true)));
    assert!(h.bridge.pending().is_empty());

    h.bridge.request_exact_alarm_permission();
    assert_eq!(h.memory.clock.permission_requests(), 1);
}

#[test]
fn a_new_session_after_stop_starts_fresh() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    h.fire_due(T);
    h.bridge.stop_alarm();

    assert!(h.bridge.schedule_task(task(2, T + 1, "Stretch", true)));
    h.fire_due(T + 1);
    assert_eq!(h.bridge.status().titles, vec!["Stretch"]);
    assert_eq!(h.memory.audio.started(), 2);
    assert_eq!(h.memory.power.acquired(), 2);
}

#[test]
fn reminder_sharing_the_session_notification_id_leaves_it_alone() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    h.fire_due(T);
    assert!(h
        .bridge
        .schedule_task(task(FOREGROUND_NOTIFICATION_ID, T + 1, "Read", false)));
    assert_eq!(h.fire_due(T + 1), vec![Outcome::ReminderPosted]);

    let ringing = h.memory.notifier.shown(NotificationKey::RINGING).unwrap();
    assert!(ringing.ongoing);
    assert_eq!(ringing.title, "Drink water");
    assert_eq!(ringing.actions[0].key, STOP_ACTION);
    assert_eq!(h.bridge.status().titles, vec!["Drink water"]);

    h.bridge.stop_alarm();
    let reminder = NotificationKey::reminder(FOREGROUND_NOTIFICATION_ID);
    assert_eq!(h.memory.notifier.shown(reminder).unwrap().title, "Read");
    assert!(h.memory.notifier.shown(NotificationKey::RINGING).is_none());
}

#[test]
fn wakes_delivered_from_many_threads_ring_once() {
    let h = Harness::new();
    for id in 0..32 {
        assert!(h
            .bridge
            .schedule_task(task(id, T, &format!("Habit {}", id % 5), true)));
    }
    let wakes = h.memory.clock.fire_due(T);
    assert_eq!(wakes.len(), 32);

    std::thread::scope(|scope| {
        for wake in &wakes {
            let handler = h.handler.clone();
            scope.spawn(move || assert_eq!(handler.handle(wake), Outcome::Escalated));
        }
    });

    let status = h.bridge.status();
    assert_eq!(status.status, SessionStatus::Ringing);
    assert_eq!(status.titles.len(), 5);
    assert_eq!(h.memory.power.acquired(), 1);
    assert_eq!(h.memory.power.held(), 1);
    assert_eq!(h.memory.audio.started(), 1);
    assert_eq!(h.memory.audio.playing(), 1);
    assert_eq!(h.memory.host.starts(), 1);

    h.bridge.stop_alarm();
    assert_eq!(h.memory.power.held(), 0);
    assert_eq!(h.memory.audio.playing(), 0);
}

#[test]
fn stop_pressed_on_the_ringing_notification_goes_idle() {
    let h = Harness::new();
    assert!(h.bridge.schedule_task(task(1, T, "Drink water", true)));
    h.fire_due(T);

    let pressed = h
        .memory
        .notifier
        .press(NotificationKey::RINGING, STOP_ACTION)
        .unwrap();
    assert_eq!(h.bridge.on_interaction(pressed), None);
    assert_eq!(h.bridge.status().status, SessionStatus::Idle);
    assert_eq!(h.memory.audio.playing(), 0);
    assert!(!h.memory.host.is_foreground());
}
