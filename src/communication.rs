//! Messages exchanged with the daemon over its local socket, one JSON
//! document per line.

use std::{
    io::{BufRead, BufReader, Write},
    sync::{Arc, Mutex, PoisonError},
};

use crossbeam_channel::{Receiver, Sender};
use interprocess::local_socket::{prelude::*, GenericNamespaced, Name, Stream};
use serde::{Deserialize, Serialize};

use crate::{
    alarm::{AlarmId, PendingTrigger, ScheduleTask},
    error::{Error, Result},
    notification::LaunchTarget,
    session::SessionSnapshot,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    ScheduleTask(ScheduleTask),
    CancelTask { id: AlarmId },
    StopAlarm,
    CheckExactAlarmPermission,
    RequestExactAlarmPermission,
    ListPending,
    Status,
    /// keep the connection open and stream [`UiEvent`]s down it
    Subscribe,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Scheduled(bool),
    Cancelled(bool),
    Stopped,
    ExactAlarmPermission(bool),
    PermissionRequested,
    Pending(Vec<PendingTrigger>),
    Status(SessionSnapshot),
    Event(UiEvent),
    Error(String),
}

/// What the UI layer is told about as it happens.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// bring the UI up at this target, full screen
    Launch(LaunchTarget),
    SessionEnded,
}

/// Fans [`UiEvent`]s out to every subscribed connection.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<UiEvent>>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<UiEvent> {
        let (s, r) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(s);
        r
    }

    /// Drops subscribers that have gone away.
    pub fn publish(&self, event: &UiEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| s.send(event.clone()).is_ok());
    }
}

pub(crate) fn socket_name(name: &str) -> Result<Name<'_>> {
    Ok(name.to_ns_name::<GenericNamespaced>()?)
}

/// Writes `message` as one line.
///
/// # Errors
/// If serialization or the write fails.
pub fn write_line<W: Write, T: Serialize>(w: &mut W, message: &T) -> Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.flush()?;
    Ok(())
}

/// Reads one message, `None` at end of stream.
///
/// # Errors
/// If the read fails or the line isn't a valid message.
pub fn read_line<R: BufRead, T: for<'de> Deserialize<'de>>(r: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    if r.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

/// A connection to a running daemon.
pub struct Client {
    conn: BufReader<Stream>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// # Errors
    /// If no daemon is listening on `socket`.
    pub fn connect(socket: &str) -> Result<Self> {
        let conn = Stream::connect(socket_name(socket)?)?;
        Ok(Self {
            conn: BufReader::new(conn),
        })
    }

    /// Sends `message` and waits for its reply.
    ///
    /// # Errors
    /// If the daemon hangs up or answers with something unreadable.
    pub fn request(&mut self, message: &ClientMessage) -> Result<ServerMessage> {
        self.send(message)?;
        self.next()?
            .ok_or_else(|| Error::UnexpectedReply("connection closed".to_string()))
    }

    /// Sends without waiting, for requests like [`ClientMessage::Subscribe`]
    /// that are answered with a stream.
    ///
    /// # Errors
    /// If the daemon has hung up.
    pub fn send(&mut self, message: &ClientMessage) -> Result<()> {
        write_line(self.conn.get_mut(), message)
    }

    /// Next message pushed by the daemon, `None` once it hangs up.
    ///
    /// # Errors
    /// If the line can't be read or parsed.
    pub fn next(&mut self) -> Result<Option<ServerMessage>> {
        read_line(&mut self.conn)
    }
}

/// One-shot request on a fresh connection.
///
/// # Errors
/// See [`Client::connect`] and [`Client::request`].
pub fn request(socket: &str, message: &ClientMessage) -> Result<ServerMessage> {
    Client::connect(socket)?.request(message)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn messages_are_newline_framed() {
        let mut buf = Vec::new();
        write_line(&mut buf, &ClientMessage::CancelTask { id: 4 }).unwrap();
        write_line(&mut buf, &ClientMessage::StopAlarm).unwrap();
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 2);

        let mut reader = Cursor::new(buf);
        let first: Option<ClientMessage> = read_line(&mut reader).unwrap();
        let second: Option<ClientMessage> = read_line(&mut reader).unwrap();
        let end: Option<ClientMessage> = read_line(&mut reader).unwrap();
        assert_eq!(first, Some(ClientMessage::CancelTask { id: 4 }));
        assert_eq!(second, Some(ClientMessage::StopAlarm));
        assert_eq!(end, None);
    }

    #[test]
    fn schedule_task_accepts_the_ui_argument_names() {
        let line = r#"{"ScheduleTask":{"id":2,"timeMs":1700000000000,"title":"Stretch","isAlarm":false}}"#;
        let message: ClientMessage = serde_json::from_str(line).unwrap();
        let ClientMessage::ScheduleTask(task) = message else {
            panic!("wrong variant");
        };
        assert_eq!(task.id, 2);
        assert!(!task.is_alarm);
        assert!(task.audio);
    }

    #[test]
    fn garbage_is_a_json_error() {
        let mut reader = Cursor::new(b"not json\n".to_vec());
        let parsed: Result<Option<ClientMessage>> = read_line(&mut reader);
        assert!(matches!(parsed, Err(Error::Json(_))));
    }

    #[test]
    fn bus_forgets_dropped_subscribers() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        bus.publish(&UiEvent::SessionEnded);
        assert_eq!(kept.try_recv().unwrap(), UiEvent::SessionEnded);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}
