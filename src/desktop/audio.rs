use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    thread,
};

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use rodio::{decoder, OutputStream, Sink, Source};

use crate::{
    error::{Error, Result},
    platform::{AudioOutput, AudioProfile, Playback},
};

enum AudioCommand {
    Start {
        id: u64,
        tone: PathBuf,
        reply: Sender<Result<()>>,
    },
    Stop(u64),
}

/// Looping playback through the default output device.
///
/// The output stream lives on its own thread; players are addressed by id.
#[derive(Debug)]
pub struct RodioOutput {
    commands: Sender<AudioCommand>,
    next_id: AtomicU64,
}

impl RodioOutput {
    /// # Errors
    /// If the audio thread can't be spawned.
    pub fn spawn() -> Result<Self> {
        let (s, r) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                // opened lazily so a machine without a sound card still starts
                let mut stream: Option<OutputStream> = None;
                let mut sinks: HashMap<u64, Sink> = HashMap::new();
                for command in r {
                    match command {
                        AudioCommand::Start { id, tone, reply } => {
                            let result = start_sink(&mut stream, &tone).map(|sink| {
                                sinks.insert(id, sink);
                            });
                            let _ = reply.send(result);
                        }
                        AudioCommand::Stop(id) => {
                            if let Some(sink) = sinks.remove(&id) {
                                debug!("stopping player {id}");
                                sink.stop();
                            }
                        }
                    }
                }
            })?;
        Ok(Self {
            commands: s,
            next_id: AtomicU64::new(1),
        })
    }
}

impl std::fmt::Debug for AudioCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start { id, tone, .. } => write!(f, "Start({id}, {})", tone.display()),
            Self::Stop(id) => write!(f, "Stop({id})"),
        }
    }
}

fn start_sink(stream: &mut Option<OutputStream>, tone: &Path) -> Result<Sink> {
    if stream.is_none() {
        let opened = rodio::OutputStreamBuilder::open_default_stream()
            .map_err(|e| Error::playback(format!("no audio output: {e}")))?;
        *stream = Some(opened);
    }
    let Some(stream) = stream.as_ref() else {
        return Err(Error::playback("no audio output"));
    };
    let file = File::open(tone)
        .map_err(|e| Error::playback(format!("couldn't open {}: {e}", tone.display())))?;
    // create source that repeatedly plays the tone
    let input = decoder::Decoder::new(BufReader::new(file))
        .map_err(|e| Error::playback(format!("couldn't decode {}: {e}", tone.display())))?
        .repeat_infinite();
    let sink = Sink::connect_new(stream.mixer());
    sink.append(input);
    sink.play();
    Ok(sink)
}

impl AudioOutput for RodioOutput {
    fn play_looping(&self, tone: &Path, profile: AudioProfile) -> Result<Box<dyn Playback>> {
        // a desktop mixer has no alarm stream to route to
        debug!("playing {} as {profile:?}", tone.display());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, result) = crossbeam_channel::bounded(1);
        self.commands
            .send(AudioCommand::Start {
                id,
                tone: tone.to_path_buf(),
                reply,
            })
            .map_err(|_| Error::playback("audio thread is gone"))?;
        result
            .recv()
            .map_err(|_| Error::playback("audio thread is gone"))??;
        info!("alarm tone {} playing", tone.display());
        Ok(Box::new(RodioPlayback {
            id,
            commands: self.commands.clone(),
            active: true,
        }))
    }
}

struct RodioPlayback {
    id: u64,
    commands: Sender<AudioCommand>,
    active: bool,
}

impl Playback for RodioPlayback {
    fn is_playing(&self) -> bool {
        self.active
    }

    fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if self.commands.send(AudioCommand::Stop(self.id)).is_err() {
            warn!("audio thread is gone, player {} already released", self.id);
        }
    }
}

impl Drop for RodioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tone_is_a_playback_failure() {
        let output = RodioOutput::spawn().unwrap();
        let result = output.play_looping(Path::new("/nonexistent/tone.oga"), AudioProfile::ALARM);
        assert!(matches!(result, Err(Error::PlaybackFailure { .. })));
    }
}
