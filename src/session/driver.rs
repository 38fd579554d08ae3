use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::config::SessionConfig;
use super::session::RecordingSession;
use super::state::{RecordingState, SessionEvent, SessionSnapshot};
use crate::audio::{CaptureDevice, PlaybackEvent, TimedPlayback};
use crate::error::{Result, SessionError};
use crate::media::{Blob, ObjectUrlRegistry};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    StartCapture(Reply<Result<SessionSnapshot>>),
    StopCapture(Reply<Result<SessionSnapshot>>),
    SupplyFile(Blob, Reply<Result<SessionSnapshot>>),
    Play(Reply<Result<SessionSnapshot>>),
    Pause(Reply<Result<SessionSnapshot>>),
    Discard(Reply<SessionSnapshot>),
    SetDescription(String, Reply<SessionSnapshot>),
    Snapshot(Reply<SessionSnapshot>),
    Recording(Reply<Option<(Blob, String)>>),
    TakeForSubmission(Reply<Option<(Blob, String)>>),
    Close(Reply<()>),
}

/// Everything needed to open new recording sessions
pub struct SessionServices {
    pub config: SessionConfig,
    pub capture: Arc<dyn CaptureDevice>,
    pub references: Arc<ObjectUrlRegistry>,
}

impl SessionServices {
    /// Open a session with headless playback and spawn its driver task
    pub fn open(&self, id: impl Into<String>) -> SessionHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let playback = TimedPlayback::new(Arc::clone(&self.references), events_tx);
        let session = RecordingSession::new(
            self.config.clone(),
            Arc::clone(&self.capture),
            Box::new(playback),
            self.references.clone(),
        );
        SessionHandle::spawn(id, session, events_rx)
    }
}

/// Handle to a recording session owned by a driver task
///
/// The task serialises commands, playback events and ticks, so each
/// transition completes before the next input is looked at. Dropping every
/// handle discards the session and ends the task.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn spawn(
        id: impl Into<String>,
        session: RecordingSession,
        playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    ) -> Self {
        let id = id.into();
        let (commands_tx, commands_rx) = mpsc::channel(32);

        let task_id = id.clone();
        tokio::spawn(async move {
            info!("Session {} driver started", task_id);
            run(session, commands_rx, playback_events).await;
            info!("Session {} driver stopped", task_id);
        });

        Self {
            id,
            commands: commands_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn start_capture(&self) -> Result<SessionSnapshot> {
        self.request(Command::StartCapture).await?
    }

    pub async fn stop_capture(&self) -> Result<SessionSnapshot> {
        self.request(Command::StopCapture).await?
    }

    pub async fn supply_file(&self, file: Blob) -> Result<SessionSnapshot> {
        self.request(|reply| Command::SupplyFile(file, reply)).await?
    }

    pub async fn play(&self) -> Result<SessionSnapshot> {
        self.request(Command::Play).await?
    }

    pub async fn pause(&self) -> Result<SessionSnapshot> {
        self.request(Command::Pause).await?
    }

    pub async fn discard(&self) -> Result<SessionSnapshot> {
        self.request(Command::Discard).await
    }

    pub async fn set_description(&self, text: impl Into<String>) -> Result<SessionSnapshot> {
        let text = text.into();
        self.request(|reply| Command::SetDescription(text, reply)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Copy of the attached recording and its description; the session keeps it
    pub async fn recording(&self) -> Result<Option<(Blob, String)>> {
        self.request(Command::Recording).await
    }

    pub async fn take_for_submission(&self) -> Result<Option<(Blob, String)>> {
        self.request(Command::TakeForSubmission).await
    }

    /// Discard the session and stop its driver task
    ///
    /// Other handles to the same session get `SessionError::Closed` afterwards.
    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }
}

async fn run(
    mut session: RecordingSession,
    mut commands: mpsc::Receiver<Command>,
    mut playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
) {
    let period = session.config().tick_interval;
    let mut ticker: Option<Interval> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    if apply(&mut session, command).await.is_break() {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = playback_events.recv() => {
                session.handle_event(SessionEvent::Playback(event));
            }
            _ = next_tick(&mut ticker) => {
                session.handle_event(SessionEvent::Tick);
            }
        }

        // Ticks exist only while recording
        match (session.state(), ticker.is_some()) {
            (RecordingState::Recording, false) => ticker = Some(start_ticker(period)),
            (RecordingState::Recording, true) => {}
            (_, true) => ticker = None,
            (_, false) => {}
        }
    }

    session.discard();
}

async fn apply(session: &mut RecordingSession, command: Command) -> ControlFlow<()> {
    match command {
        Command::StartCapture(reply) => {
            let result = session.start_capture().await.map(|_| session.snapshot());
            let _ = reply.send(result);
        }
        Command::StopCapture(reply) => {
            let result = session.stop_capture().await.map(|_| session.snapshot());
            let _ = reply.send(result);
        }
        Command::SupplyFile(file, reply) => {
            let result = session.supply_file(file).map(|_| session.snapshot());
            let _ = reply.send(result);
        }
        Command::Play(reply) => {
            let result = session.play().map(|_| session.snapshot());
            let _ = reply.send(result);
        }
        Command::Pause(reply) => {
            let result = session.pause().map(|_| session.snapshot());
            let _ = reply.send(result);
        }
        Command::Discard(reply) => {
            session.discard();
            let _ = reply.send(session.snapshot());
        }
        Command::SetDescription(text, reply) => {
            session.set_description(text);
            let _ = reply.send(session.snapshot());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        Command::Recording(reply) => {
            let _ = reply.send(session.recording());
        }
        Command::TakeForSubmission(reply) => {
            let _ = reply.send(session.take_for_submission());
        }
        Command::Close(reply) => {
            session.discard();
            let _ = reply.send(());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

fn start_ticker(period: Duration) -> Interval {
    debug!("Tick started ({:?})", period);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}
