use std::error::Error;

use chrono::{DateTime, Local, TimeZone};
use clap::{command, Parser, Subcommand};
use habit_alarmd::{
    alarm::{AlarmId, ScheduleTask},
    communication::{self, Client, ClientMessage, ServerMessage, UiEvent},
    config::Config,
    daemon,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// socket to use instead of the configured one
    #[clap(long, global = true)]
    socket: Option<String>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// run the daemon (the default)
    Serve,
    /// write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    Schedule {
        #[clap(long)]
        id: AlarmId,
        /// RFC 3339 time or epoch milliseconds
        #[clap(long)]
        at: String,
        #[clap(long, default_value = "Habit")]
        title: String,
        #[clap(long, default_value = habit_alarmd::alarm::DEFAULT_BODY)]
        body: String,
        /// post a plain notification instead of ringing
        #[clap(long)]
        reminder: bool,
        #[clap(long)]
        no_audio: bool,
        #[clap(long)]
        no_vibrate: bool,
    },
    Cancel {
        id: AlarmId,
    },
    /// silence the ringing session
    Stop,
    Permission {
        #[clap(subcommand)]
        action: PermissionAction,
    },
    Pending,
    Status,
    /// print ui events as they happen
    Watch,
}

#[derive(Subcommand)]
enum PermissionAction {
    Check,
    Request,
}

fn parse_time(at: &str) -> Result<i64, Box<dyn Error>> {
    if let Ok(ms) = at.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(at) {
        return Ok(time.timestamp_millis());
    }
    // a bare local time like 2024-05-01T07:30:00
    let naive = chrono::NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S")?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|time| time.timestamp_millis())
        .ok_or_else(|| format!("{at} is ambiguous in the local timezone").into())
}

fn print_reply(reply: &ServerMessage) -> Result<(), Box<dyn Error>> {
    match reply {
        ServerMessage::Error(e) => Err(e.clone().into()),
        ServerMessage::Pending(pending) => {
            for trigger in pending {
                let when = Local
                    .timestamp_millis_opt(trigger.fire_time_ms)
                    .single()
                    .map_or_else(|| trigger.fire_time_ms.to_string(), |t| t.to_rfc2822());
                println!(
                    "{}\t{when}\t{}",
                    trigger.id,
                    trigger.payload.title.as_deref().unwrap_or_default()
                );
            }
            Ok(())
        }
        reply => {
            println!("{}", serde_json::to_string_pretty(reply)?);
            Ok(())
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("habit_alarmd").expect("couldn't initialize logger");

    let args = Args::parse();
    let mut config = Config::load_or_default()?;
    if let Some(socket) = args.socket {
        config.socket_name = socket;
    }
    let socket = config.socket_name.clone();

    let request = match args.command {
        None | Some(Command::Serve) => return Ok(daemon::run(&config)?),
        Some(Command::Init { force }) => {
            if force || !Config::is_config_present() {
                Config::new().save(Config::config_path()?)?;
                println!("wrote {}", Config::config_path()?.display());
            } else {
                println!("config already present, use --force to overwrite");
            }
            return Ok(());
        }
        Some(Command::Watch) => {
            let mut client = Client::connect(&socket)?;
            client.send(&ClientMessage::Subscribe)?;
            while let Some(message) = client.next()? {
                match message {
                    ServerMessage::Event(UiEvent::Launch(target)) => println!(
                        "launch {}: {} - {}",
                        target.route.as_deref().unwrap_or("/"),
                        target.title.as_deref().unwrap_or_default(),
                        target.body.as_deref().unwrap_or_default()
                    ),
                    ServerMessage::Event(UiEvent::SessionEnded) => println!("session ended"),
                    other => print_reply(&other)?,
                }
            }
            return Ok(());
        }
        Some(Command::Schedule {
            id,
            at,
            title,
            body,
            reminder,
            no_audio,
            no_vibrate,
        }) => ClientMessage::ScheduleTask(ScheduleTask {
            id,
            time_ms: parse_time(&at)?,
            title,
            body,
            is_alarm: !reminder,
            audio: !no_audio,
            vibrate: !no_vibrate,
        }),
        Some(Command::Cancel { id }) => ClientMessage::CancelTask { id },
        Some(Command::Stop) => ClientMessage::StopAlarm,
        Some(Command::Permission {
            action: PermissionAction::Check,
        }) => ClientMessage::CheckExactAlarmPermission,
        Some(Command::Permission {
            action: PermissionAction::Request,
        }) => ClientMessage::RequestExactAlarmPermission,
        Some(Command::Pending) => ClientMessage::ListPending,
        Some(Command::Status) => ClientMessage::Status,
    };

    print_reply(&communication::request(&socket, &request)?)
}
