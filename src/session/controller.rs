//! Session start/stop orchestration
//!
//! `start` acquires resources in order (playback output, input device,
//! channel), sends the handshake, unmutes the input and then hands
//! everything to a session task. Any failure or stop request along the way rolls back what was
//! already acquired. `stop` is safe to call at any time, any number of
//! times.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::audio::backend::AudioBackend;
use crate::audio::capture::CaptureEvent;
use crate::audio::playback::PlaybackScheduler;
use crate::collaborators::Collaborators;
use crate::config::AppConfig;
use crate::error::{Result, SessionError};
use crate::network::channel::{Channel, Connector};
use crate::protocol::credentials::CredentialSet;
use crate::protocol::engine::{ChannelState, ProtocolEngine};
use crate::session::{stopped, teardown, Session, SessionEnd};

/// Cloneable handle that cancels a starting or running session
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Request a stop. Never fails; repeated calls are no-ops.
    pub fn stop(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_stopping(&self) -> bool {
        *self.flag.borrow()
    }

    fn arm(&self) {
        self.flag.send_replace(false);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }
}

/// Owns at most one session at a time
pub struct SessionController<C: Connector, B: AudioBackend> {
    config: AppConfig,
    credentials: Arc<CredentialSet>,
    connector: C,
    backend: B,
    collaborators: Collaborators,
    state_tx: Arc<watch::Sender<ChannelState>>,
    stop: StopHandle,
    active: Option<JoinHandle<SessionEnd>>,
}

impl<C: Connector, B: AudioBackend> SessionController<C, B> {
    /// The credential set is fixed for every session this controller runs.
    pub fn new(
        config: AppConfig,
        credentials: CredentialSet,
        connector: C,
        backend: B,
        collaborators: Collaborators,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Idle);
        Self {
            config,
            credentials: Arc::new(credentials),
            connector,
            backend,
            collaborators,
            state_tx: Arc::new(state_tx),
            stop: StopHandle::new(),
            active: None,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    /// Watch channel state changes
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Whether a session task is running
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Start a session.
    ///
    /// Fails with `MissingCredential` before anything is opened, with
    /// `AlreadyActive` if a session is running, with the device or channel
    /// error that stopped it, or with `Cancelled` if a stop arrived first.
    pub async fn start(&mut self) -> Result<()> {
        self.credentials.validate()?;

        if self.is_active() {
            return Err(SessionError::AlreadyActive.into());
        }
        self.active = None;
        self.stop.arm();

        let url = self.config.channel.endpoint()?;
        let id = Uuid::new_v4();
        let span = info_span!("session", id = %id);

        let session = self.open_session(&url).instrument(span.clone()).await?;
        self.active = Some(tokio::spawn(session.run().instrument(span)));
        Ok(())
    }

    async fn open_session(&self, url: &url::Url) -> Result<Session> {
        info!("Starting session with {}", url);
        let mut stop_rx = self.stop.subscribe();

        let output = self.backend.open_output(&self.config.playback)?;
        let mut scheduler =
            PlaybackScheduler::with_output(self.config.playback.sample_rate, output);
        if self.stop.is_stopping() {
            scheduler.reset();
            return Err(SessionError::Cancelled.into());
        }

        let (capture_tx, mut capture_rx) = mpsc::channel(self.config.capture.queue.max(1));
        let mut capture = match self.backend.open_capture(&self.config.capture, capture_tx) {
            Ok(capture) => capture,
            Err(e) => {
                scheduler.reset();
                return Err(e.into());
            }
        };

        let mut engine = ProtocolEngine::new(
            self.credentials.clone(),
            scheduler,
            self.collaborators.clone(),
            self.state_tx.clone(),
        );
        if self.stop.is_stopping() {
            teardown(capture.as_mut(), &mut engine, None).await;
            return Err(SessionError::Cancelled.into());
        }
        engine.begin_connect()?;

        let connected = tokio::select! {
            result = self.connector.connect(url) => Some(result),
            _ = stopped(&mut stop_rx) => None,
        };
        let mut channel = match connected {
            Some(Ok(channel)) => channel,
            Some(Err(e)) => {
                warn!("Could not open channel: {}", e);
                teardown(capture.as_mut(), &mut engine, None).await;
                return Err(e.into());
            }
            None => {
                debug!("Stop requested while connecting");
                teardown(capture.as_mut(), &mut engine, None).await;
                return Err(SessionError::Cancelled.into());
            }
        };

        if let Err(e) = self.handshake(&mut engine, &channel).await {
            teardown(capture.as_mut(), &mut engine, Some(&mut channel)).await;
            return Err(e);
        }
        if self.stop.is_stopping() {
            teardown(capture.as_mut(), &mut engine, Some(&mut channel)).await;
            return Err(SessionError::Cancelled.into());
        }

        // Anything queued so far was captured before streaming began
        while let Ok(event) = capture_rx.try_recv() {
            match event {
                CaptureEvent::Frame(_) => engine.record_frame_discarded(),
                CaptureEvent::Failed(e) => {
                    teardown(capture.as_mut(), &mut engine, Some(&mut channel)).await;
                    return Err(e.into());
                }
            }
        }
        capture.connect();

        Ok(Session {
            engine,
            channel,
            capture,
            capture_rx,
            stop_rx,
        })
    }

    async fn handshake(&self, engine: &mut ProtocolEngine, channel: &Channel) -> Result<()> {
        let handshake = engine.on_open()?;
        channel.send(handshake).await?;
        engine.on_handshake_sent()?;
        Ok(())
    }

    /// Stop the running session, if any, and wait for its teardown.
    ///
    /// Returns how the session ended, or `None` if none was running.
    pub async fn stop(&mut self) -> Option<SessionEnd> {
        self.stop.stop();
        self.reap().await
    }

    /// Wait until the running session ends on its own
    pub async fn wait(&mut self) -> Option<SessionEnd> {
        self.reap().await
    }

    async fn reap(&mut self) -> Option<SessionEnd> {
        let task = self.active.as_mut()?;
        let result = task.await;
        self.active = None;
        match result {
            Ok(end) => Some(end),
            Err(e) => {
                warn!("Session task failed: {}", e);
                self.state_tx.send_replace(ChannelState::Closed);
                None
            }
        }
    }
}

impl<C: Connector, B: AudioBackend> Drop for SessionController<C, B> {
    fn drop(&mut self) {
        self.stop.stop();
    }
}
