use crate::media::{Blob, ObjectUrlRegistry, Uploader};
use crate::session::{RecordingState, SessionHandle, SessionServices};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One open submission form: its recorder and the images chosen so far
pub struct FormSession {
    pub recorder: SessionHandle,
    pub images: Vec<Blob>,
    /// Last request that touched this form
    pub last_seen: Instant,
}

impl FormSession {
    pub fn new(recorder: SessionHandle) -> Self {
        Self {
            recorder,
            images: Vec::new(),
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Open submission forms (session_id → form)
    pub sessions: Arc<RwLock<HashMap<String, FormSession>>>,

    /// Opens new recording sessions
    pub services: Arc<SessionServices>,

    /// Local references served under /blobs
    pub references: Arc<ObjectUrlRegistry>,

    /// Receives submitted media
    pub uploader: Arc<dyn Uploader>,

    /// Directory published under /files
    pub files_dir: PathBuf,
}

impl AppState {
    pub fn new(services: SessionServices, uploader: Arc<dyn Uploader>, files_dir: impl Into<PathBuf>) -> Self {
        let references = Arc::clone(&services.references);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            services: Arc::new(services),
            references,
            uploader,
            files_dir: files_dir.into(),
        }
    }

    /// Recorder of an open form; marks the form as seen
    pub async fn recorder(&self, session_id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(session_id).map(|form| {
            form.touch();
            form.recorder.clone()
        })
    }

    /// Close forms nobody has touched for longer than `ttl`
    ///
    /// A form whose recorder is still capturing is kept. Returns the number
    /// of forms closed.
    pub async fn reap_idle(&self, ttl: Duration) -> usize {
        let stale: Vec<(String, SessionHandle)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, form)| form.last_seen.elapsed() > ttl)
                .map(|(id, form)| (id.clone(), form.recorder.clone()))
                .collect()
        };

        let mut reaped = 0;
        for (session_id, recorder) in stale {
            if let Ok(snapshot) = recorder.snapshot().await {
                if snapshot.state == RecordingState::Recording {
                    debug!("Session {} idle but still recording", session_id);
                    continue;
                }
            }

            let removed = {
                let mut sessions = self.sessions.write().await;
                match sessions.get(&session_id) {
                    Some(form) if form.last_seen.elapsed() > ttl => sessions.remove(&session_id),
                    _ => None,
                }
            };
            let Some(form) = removed else {
                continue;
            };

            if let Err(e) = form.recorder.close().await {
                warn!("Session {} already closed: {}", session_id, e);
            }
            info!("Session {} closed after {:?} idle", session_id, ttl);
            reaped += 1;
        }

        let open = self.sessions.read().await.len();
        if reaped > 0 {
            info!("Reaped {} idle sessions, {} still open", reaped, open);
        } else {
            debug!("{} sessions open", open);
        }
        reaped
    }

    /// Periodically close idle forms for as long as the server runs
    pub fn spawn_reaper(&self, ttl: Duration) -> JoinHandle<()> {
        let state = self.clone();
        let period = (ttl / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                state.reap_idle(ttl).await;
            }
        })
    }
}
