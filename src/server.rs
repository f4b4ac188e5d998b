use std::{
    io::{self, BufReader},
    sync::Arc,
    thread,
};

use interprocess::local_socket::{prelude::*, ListenerOptions, Stream};
use log::{debug, error, info, warn};

use crate::{
    bridge::AlarmBridge,
    communication::{self, ClientMessage, EventBus, ServerMessage},
    error::Result,
};

/// Answers one request. `Subscribe` is handled by the connection loop.
#[must_use]
pub fn dispatch(bridge: &AlarmBridge, message: ClientMessage) -> ServerMessage {
    match message {
        ClientMessage::ScheduleTask(task) => ServerMessage::Scheduled(bridge.schedule_task(task)),
        ClientMessage::CancelTask { id } => ServerMessage::Cancelled(bridge.cancel_task(id)),
        ClientMessage::StopAlarm => {
            bridge.stop_alarm();
            ServerMessage::Stopped
        }
        ClientMessage::CheckExactAlarmPermission => {
            ServerMessage::ExactAlarmPermission(bridge.check_exact_alarm_permission())
        }
        ClientMessage::RequestExactAlarmPermission => {
            bridge.request_exact_alarm_permission();
            ServerMessage::PermissionRequested
        }
        ClientMessage::ListPending => ServerMessage::Pending(bridge.pending()),
        ClientMessage::Status => ServerMessage::Status(bridge.status()),
        ClientMessage::Subscribe => {
            ServerMessage::Error("subscribe must be the only request on a connection".to_string())
        }
    }
}

/// Listens on `socket_name` until the listener fails.
///
/// # Errors
/// If the socket can't be created, for example because another daemon owns it.
pub fn serve(socket_name: &str, bridge: Arc<AlarmBridge>, events: EventBus) -> Result<()> {
    // Define a function that checks for errors in incoming connections. We'll use this to filter
    // through connections that fail on initialization for one reason or another.
    fn handle_error(conn: io::Result<Stream>) -> Option<Stream> {
        match conn {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("incoming connection failed: {e}");
                None
            }
        }
    }

    let name = communication::socket_name(socket_name)?;
    let opts = ListenerOptions::new().name(name);
    let listener = match opts.create_sync() {
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            error!(
                "could not start server because the socket is occupied, check whether \
                 {socket_name} is in use by another process"
            );
            return Err(e.into());
        }
        x => x?,
    };

    info!("server running at {socket_name}");

    for conn in listener.incoming().filter_map(handle_error) {
        let (bridge, events) = (Arc::clone(&bridge), events.clone());
        let spawned = thread::Builder::new()
            .name("alarm-client".to_string())
            .spawn(move || {
                if let Err(e) = handle_connection(conn, &bridge, &events) {
                    debug!("connection closed: {e}");
                }
            });
        if let Err(e) = spawned {
            error!("couldn't spawn connection thread: {e}");
        }
    }
    Ok(())
}

fn handle_connection(conn: Stream, bridge: &AlarmBridge, events: &EventBus) -> Result<()> {
    let mut conn = BufReader::new(conn);
    debug!("incoming connection");
    while let Some(message) = communication::read_line::<_, ClientMessage>(&mut conn)? {
        if message == ClientMessage::Subscribe {
            return stream_events(conn.into_inner(), events);
        }
        let reply = dispatch(bridge, message);
        communication::write_line(conn.get_mut(), &reply)?;
    }
    Ok(())
}

/// Pushes every event down `conn` until either side goes away. Subscribers
/// send nothing after `Subscribe`, so end of input means the peer hung up.
fn stream_events(conn: Stream, events: &EventBus) -> Result<()> {
    let (mut reader, mut writer) = conn.split();
    let (hang_up, hung_up) = crossbeam_channel::bounded::<()>(0);
    thread::Builder::new()
        .name("alarm-subscriber".to_string())
        .spawn(move || {
            let _ = io::copy(&mut reader, &mut io::sink());
            drop(hang_up);
        })?;

    let receiver = events.subscribe();
    info!("ui subscribed to alarm events");
    loop {
        crossbeam_channel::select! {
            recv(receiver) -> event => match event {
                Ok(event) => communication::write_line(&mut writer, &ServerMessage::Event(event))?,
                Err(_) => return Ok(()),
            },
            recv(hung_up) -> _ => {
                debug!("ui unsubscribed");
                return Ok(());
            }
        }
    }
}
