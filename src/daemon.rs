use std::{sync::Arc, thread};

use crossbeam_channel::Receiver;
use log::info;

use crate::{
    alarm::Wake,
    bridge::AlarmBridge,
    communication::{EventBus, UiEvent},
    config::Config,
    desktop::{
        DeadlinePowerManager, DesktopHost, DesktopNotifier, LogVibrator, RodioOutput,
        TimerAlarmClock,
    },
    error::Result,
    notification::Interaction,
    platform::Platform,
    scheduler::Scheduler,
    server,
    session::{AlarmSession, SessionOptions},
    store::{PendingStore, SessionMarker},
    trigger::TriggerHandler,
};

/// Delivers wakes to `handler` one after another, like the host would.
///
/// # Errors
/// If the thread can't be spawned.
pub fn spawn_trigger_loop(handler: TriggerHandler, wakes: Receiver<Wake>) -> Result<()> {
    thread::Builder::new()
        .name("alarm-triggers".to_string())
        .spawn(move || {
            for wake in wakes {
                handler.handle(&wake);
            }
        })?;
    Ok(())
}

/// Routes notification taps and action presses through `bridge`, announcing
/// any UI launch they ask for on `events`.
///
/// # Errors
/// If the thread can't be spawned.
pub fn spawn_interaction_loop(
    bridge: Arc<AlarmBridge>,
    interactions: Receiver<Interaction>,
    events: EventBus,
) -> Result<()> {
    thread::Builder::new()
        .name("alarm-interactions".to_string())
        .spawn(move || {
            for interaction in interactions {
                if let Some(target) = bridge.on_interaction(interaction) {
                    events.publish(&UiEvent::Launch(target));
                }
            }
        })?;
    Ok(())
}

/// Wires the desktop facilities together and serves until the listener fails.
///
/// # Errors
/// If any facility can't start or the socket can't be bound.
pub fn run(config: &Config) -> Result<()> {
    let events = EventBus::new();
    let (wake_sender, wakes) = crossbeam_channel::unbounded();
    let (interaction_sender, interactions) = crossbeam_channel::unbounded();
    let clock = TimerAlarmClock::start(
        Some(PendingStore::new(Config::pending_path()?)),
        wake_sender,
        config.exact_alarms_allowed,
    )?;
    let platform = Platform {
        clock: Arc::new(clock),
        notifier: Arc::new(DesktopNotifier::new(events.clone(), interaction_sender)),
        vibrator: Arc::new(LogVibrator),
        power: Arc::new(DeadlinePowerManager),
        audio: Arc::new(RodioOutput::spawn()?),
        host: Arc::new(DesktopHost::new(events.clone())),
    };
    platform.create_channels();

    let session = Arc::new(AlarmSession::new(
        platform.clone(),
        SessionOptions {
            tones: config.tones.clone(),
            wake_lock_timeout: config.wake_lock_timeout(),
            marker: Some(SessionMarker::new(Config::marker_path()?)),
        },
    ));
    if config.resume_interrupted_session {
        session.recover();
    }

    spawn_trigger_loop(
        TriggerHandler::new(platform.clone(), Arc::clone(&session)),
        wakes,
    )?;

    let bridge = Arc::new(AlarmBridge::new(
        Scheduler::new(Arc::clone(&platform.clock)),
        session,
    ));
    spawn_interaction_loop(Arc::clone(&bridge), interactions, events.clone())?;
    info!("habit_alarmd started");
    server::serve(&config.socket_name, bridge, events)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        alarm::ScheduleTask,
        notification::{LaunchTarget, NotificationKey, DEFAULT_ACTION, STOP_ACTION},
        platform::memory::MemoryPlatform,
        session::SessionStatus,
    };

    #[test]
    fn notification_presses_reach_the_session_and_the_ui() {
        let memory = MemoryPlatform::new();
        let platform = memory.platform();
        let session = Arc::new(AlarmSession::new(
            platform.clone(),
            SessionOptions::default(),
        ));
        let handler = TriggerHandler::new(platform.clone(), Arc::clone(&session));
        let bridge = Arc::new(AlarmBridge::new(
            Scheduler::new(Arc::clone(&platform.clock)),
            session,
        ));
        let events = EventBus::new();
        let ui = events.subscribe();
        let (sender, interactions) = crossbeam_channel::unbounded();
        spawn_interaction_loop(Arc::clone(&bridge), interactions, events).unwrap();

        for (id, is_alarm) in [(1, true), (3, false)] {
            assert!(bridge.schedule_task(ScheduleTask {
                id,
                time_ms: 10,
                title: "Drink water".to_string(),
                body: String::new(),
                is_alarm,
                audio: true,
                vibrate: true,
            }));
            handler.handle(&memory.clock.fire(id).unwrap());
        }
        assert_eq!(bridge.status().status, SessionStatus::Ringing);

        let tap = memory
            .notifier
            .press(NotificationKey::reminder(3), DEFAULT_ACTION)
            .unwrap();
        sender.send(tap).unwrap();
        assert_eq!(
            ui.recv_timeout(Duration::from_secs(5)).unwrap(),
            UiEvent::Launch(LaunchTarget::app())
        );

        let stop = memory
            .notifier
            .press(NotificationKey::RINGING, STOP_ACTION)
            .unwrap();
        sender.send(stop).unwrap();
        drop(sender);
        for _ in 0..500 {
            if bridge.status().status == SessionStatus::Idle {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(bridge.status().status, SessionStatus::Idle);
        assert!(!memory.host.is_foreground());
    }
}
