use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::catalog::SampleId;
use crate::markers::MarkerToggle;
use crate::pipeline::SaveReport;
use crate::session::Session;
use crate::{ChopError, NamingDirective, OnsetSettings, PipelineConfig, Result};

/// Requests handled by the worker thread, one at a time, in arrival order.
#[derive(Debug)]
pub enum Command {
    LoadSamples(Vec<PathBuf>),
    OpenSource(PathBuf),
    DetectOnsets(OnsetSettings),
    ToggleMarker(f64),
    Chop,
    SetTag(SampleId, String),
    Rename(SampleId, String),
    Save {
        dest: PathBuf,
        config: PipelineConfig,
        directive: NamingDirective,
    },
    Clear,
    Shutdown,
}

#[derive(Debug)]
pub enum Event {
    SamplesLoaded {
        loaded: Vec<SampleId>,
        failed: Vec<ChopError>,
    },
    SourceOpened {
        duration: f64,
        sample_rate: u32,
    },
    MarkersChanged(Vec<f64>),
    Chopped(Vec<SampleId>),
    Tagged(SampleId),
    Renamed(SampleId),
    Saved(SaveReport),
    Cleared,
    Failed(ChopError),
}

/// A `Session` living on its own thread. Long operations (detection, chops,
/// saves) run there so the caller can keep polling `try_recv` between
/// frames.
pub struct SessionWorker {
    commands: Sender<Command>,
    events: Receiver<Event>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWorker {
    pub fn spawn() -> Result<Self> {
        let mut session = Session::new()?;
        let (cmd_tx, cmd_rx) = unbounded::<Command>();
        let (evt_tx, evt_rx) = unbounded::<Event>();

        let handle = thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || run(&mut session, cmd_rx, evt_tx))?;

        Ok(Self {
            commands: cmd_tx,
            events: evt_rx,
            handle: Some(handle),
        })
    }

    pub fn send(&self, command: Command) {
        // Only fails once the thread is gone, which Drop handles.
        self.commands.send(command).ok();
    }

    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    pub fn recv(&self) -> Option<Event> {
        self.events.recv().ok()
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.commands.send(Command::Shutdown).ok();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Session worker panicked");
            }
        }
    }
}

fn run(session: &mut Session, commands: Receiver<Command>, events: Sender<Event>) {
    info!("Session worker started");
    while let Ok(command) = commands.recv() {
        debug!("Worker command: {:?}", command);
        let event = match handle(session, command) {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => {
                error!("{}", e);
                Event::Failed(e)
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
    info!("Session worker stopped");
}

// `None` means the worker should stop.
fn handle(session: &mut Session, command: Command) -> Result<Option<Event>> {
    let event = match command {
        Command::LoadSamples(paths) => {
            let mut loaded = Vec::new();
            let mut failed = Vec::new();
            for result in session.load_samples(&paths[..]) {
                match result {
                    Ok(id) => loaded.push(id),
                    Err(e) => failed.push(e),
                }
            }
            Event::SamplesLoaded { loaded, failed }
        }
        Command::OpenSource(path) => {
            let buffer = session.open_source(&path)?;
            Event::SourceOpened {
                duration: buffer.duration(),
                sample_rate: buffer.sample_rate(),
            }
        }
        Command::DetectOnsets(settings) => {
            Event::MarkersChanged(session.detect_onsets(&settings)?.to_vec())
        }
        Command::ToggleMarker(time) => {
            match session.toggle_marker(time)? {
                MarkerToggle::Added(t) => debug!("Marker added at {:.3}s", t),
                MarkerToggle::Removed(t) => debug!("Marker removed at {:.3}s", t),
                MarkerToggle::Unchanged => debug!("Marker at {:.3}s ignored", time),
            }
            Event::MarkersChanged(session.markers().times().to_vec())
        }
        Command::Chop => Event::Chopped(session.chop()?),
        Command::SetTag(id, tag) => {
            session.set_tag(id, &tag)?;
            Event::Tagged(id)
        }
        Command::Rename(id, stem) => {
            session.rename(id, &stem)?;
            Event::Renamed(id)
        }
        Command::Save {
            dest,
            config,
            directive,
        } => Event::Saved(session.save(&dest, &config, &directive)?),
        Command::Clear => {
            session.clear()?;
            Event::Cleared
        }
        Command::Shutdown => return Ok(None),
    };
    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_tone(dir: &Path) -> PathBuf {
        let rate = 8000u32;
        let samples: Vec<f32> = (0..rate * 2).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let path = dir.join("tone.wav");
        crate::export::write_wav(&path, &samples, rate).unwrap();
        path
    }

    #[test]
    fn commands_are_answered_in_order() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let worker = SessionWorker::spawn().unwrap();

        worker.send(Command::OpenSource(write_tone(src.path())));
        worker.send(Command::ToggleMarker(0.0));
        worker.send(Command::ToggleMarker(1.0));
        worker.send(Command::Chop);
        worker.send(Command::Save {
            dest: out.path().to_path_buf(),
            config: PipelineConfig {
                target_sample_rate: 8000,
                ..PipelineConfig::default()
            },
            directive: NamingDirective::default(),
        });

        assert!(matches!(
            worker.recv(),
            Some(Event::SourceOpened { sample_rate: 8000, .. })
        ));
        assert!(matches!(worker.recv(), Some(Event::MarkersChanged(m)) if m == vec![0.0]));
        assert!(matches!(worker.recv(), Some(Event::MarkersChanged(m)) if m.len() == 2));
        assert!(matches!(worker.recv(), Some(Event::Chopped(ids)) if ids.len() == 2));
        match worker.recv() {
            Some(Event::Saved(report)) => {
                assert!(report.is_complete());
                assert!(out.path().join("tone_chop_1.wav").exists());
                assert!(out.path().join("tone_chop_2.wav").exists());
            }
            other => panic!("expected Saved, got {:?}", other),
        }
    }

    #[test]
    fn failures_come_back_as_events() {
        let worker = SessionWorker::spawn().unwrap();
        worker.send(Command::Chop);
        assert!(matches!(
            worker.recv(),
            Some(Event::Failed(ChopError::NoAudioLoaded))
        ));
    }
}
