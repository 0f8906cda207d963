//! Test doubles shared by unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use crate::audio::backend::AudioBackend;
use crate::audio::capture::{CaptureEvent, CaptureStream};
use crate::audio::playback::AudioOutput;
use crate::collaborators::{
    Collaborators, PlaybackStatusSink, SearchSink, TranscriptSink, TurnCompleteListener,
};
use crate::config::{CaptureConfig, PlaybackConfig};
use crate::error::{AudioError, ChannelError};
use crate::network::channel::{Channel, ChannelEvent, Connector, Outbound};
use crate::protocol::messages::SearchResult;

/// Ordered record of capture and output lifecycle calls across fakes
pub(crate) type Journal = Arc<Mutex<Vec<&'static str>>>;

#[derive(Default)]
struct OutputState {
    now: f64,
    enqueued: Vec<(f64, usize)>,
    close_count: usize,
    fail: bool,
    journal: Option<Journal>,
}

/// Output with a manually driven clock
#[derive(Clone, Default)]
pub(crate) struct FakeOutput {
    state: Arc<Mutex<OutputState>>,
}

impl FakeOutput {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_journal(journal: Journal) -> Self {
        let output = Self::new();
        output.state.lock().journal = Some(journal);
        output
    }

    pub(crate) fn set_now(&self, now: f64) {
        self.state.lock().now = now;
    }

    /// `(start, sample count)` of every accepted chunk
    pub(crate) fn enqueued(&self) -> Vec<(f64, usize)> {
        self.state.lock().enqueued.clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    pub(crate) fn fail_enqueue(&self, fail: bool) {
        self.state.lock().fail = fail;
    }
}

impl AudioOutput for FakeOutput {
    fn now(&self) -> f64 {
        self.state.lock().now
    }

    fn enqueue(&mut self, start: f64, samples: Vec<f32>) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if state.fail {
            return Err(AudioError::PlaybackUnavailable("fake output failure".into()));
        }
        state.enqueued.push((start, samples.len()));
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.close_count += 1;
        if let Some(journal) = &state.journal {
            journal.lock().push("output_close");
        }
    }
}

struct FakeCapture {
    journal: Journal,
    disconnected: bool,
    released: bool,
}

impl CaptureStream for FakeCapture {
    fn connect(&mut self) {
        if !self.disconnected {
            self.journal.lock().push("capture_connect");
        }
    }

    fn disconnect(&mut self) {
        if !self.disconnected {
            self.disconnected = true;
            self.journal.lock().push("capture_disconnect");
        }
    }

    fn release(&mut self) {
        self.disconnected = true;
        if !self.released {
            self.released = true;
            self.journal.lock().push("capture_release");
        }
    }
}

struct BackendState {
    output: FakeOutput,
    capture_tx: Option<mpsc::Sender<CaptureEvent>>,
    fail_output: Option<AudioError>,
    fail_capture: Option<AudioError>,
    outputs_opened: usize,
    captures_opened: usize,
}

/// Backend handing out a [`FakeOutput`] and a capture fed by the test
#[derive(Clone)]
pub(crate) struct FakeBackend {
    journal: Journal,
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        let journal = Journal::default();
        Self {
            state: Arc::new(Mutex::new(BackendState {
                output: FakeOutput::with_journal(journal.clone()),
                capture_tx: None,
                fail_output: None,
                fail_capture: None,
                outputs_opened: 0,
                captures_opened: 0,
            })),
            journal,
        }
    }

    pub(crate) fn failing_output(self, error: AudioError) -> Self {
        self.state.lock().fail_output = Some(error);
        self
    }

    pub(crate) fn failing_capture(self, error: AudioError) -> Self {
        self.state.lock().fail_capture = Some(error);
        self
    }

    pub(crate) fn output(&self) -> FakeOutput {
        self.state.lock().output.clone()
    }

    /// Sender the last opened capture delivers through
    pub(crate) fn capture_sender(&self) -> Option<mpsc::Sender<CaptureEvent>> {
        self.state.lock().capture_tx.clone()
    }

    pub(crate) fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().clone()
    }

    pub(crate) fn outputs_opened(&self) -> usize {
        self.state.lock().outputs_opened
    }

    pub(crate) fn captures_opened(&self) -> usize {
        self.state.lock().captures_opened
    }
}

impl AudioBackend for FakeBackend {
    fn open_output(&self, _config: &PlaybackConfig) -> Result<Box<dyn AudioOutput>, AudioError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_output.clone() {
            return Err(error);
        }
        state.outputs_opened += 1;
        Ok(Box::new(state.output.clone()))
    }

    fn open_capture(
        &self,
        _config: &CaptureConfig,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureStream>, AudioError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_capture.clone() {
            return Err(error);
        }
        state.captures_opened += 1;
        state.capture_tx = Some(events);
        Ok(Box::new(FakeCapture {
            journal: self.journal.clone(),
            disconnected: false,
            released: false,
        }))
    }
}

/// Server end of a mock channel
pub(crate) struct MockServer {
    outbound: mpsc::Receiver<Outbound>,
    inbound: mpsc::Sender<ChannelEvent>,
}

impl MockServer {
    /// Next message the client wrote, or `None` after a short wait
    pub(crate) async fn next_outbound(&mut self) -> Option<Outbound> {
        tokio::time::timeout(Duration::from_secs(2), self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    pub(crate) async fn send_event(&self, event: ChannelEvent) {
        let _ = self.inbound.send(event).await;
    }

    pub(crate) async fn send_text(&self, text: &str) {
        self.send_event(ChannelEvent::Text(text.to_string())).await;
    }

    pub(crate) async fn close(&self, reason: Option<String>) {
        self.send_event(ChannelEvent::Closed(reason)).await;
    }
}

#[derive(Default)]
struct ConnectorState {
    attempts: usize,
    delay: Option<Duration>,
    fail: bool,
    server: Option<MockServer>,
}

/// Connector producing in-memory channels
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = Some(delay);
        self
    }

    pub(crate) fn failing(self) -> Self {
        self.state.lock().fail = true;
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// Server side of the most recent connection
    pub(crate) fn take_server(&self) -> Option<MockServer> {
        self.state.lock().server.take()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Channel, ChannelError> {
        let (delay, fail) = {
            let mut state = self.state.lock();
            state.attempts += 1;
            (state.delay, state.fail)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ChannelError::ConnectionFailed(format!("{}: refused", url)));
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        self.state.lock().server = Some(MockServer {
            outbound: outbound_rx,
            inbound: inbound_tx,
        });
        Ok(Channel::new(outbound_tx, inbound_rx, None))
    }
}

/// Collaborator recording every callback as a short string
#[derive(Default)]
pub(crate) struct RecordingCollaborators {
    events: Mutex<Vec<String>>,
}

impl RecordingCollaborators {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::uniform(self.clone()).with_turn_complete(self.clone())
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl TranscriptSink for RecordingCollaborators {
    fn on_turn(&self, transcript: &str) {
        self.record(format!("turn:{}", transcript));
    }

    fn on_assistant_text(&self, text: &str) {
        self.record(format!("assistant:{}", text));
    }
}

impl SearchSink for RecordingCollaborators {
    fn on_search_pending(&self) {
        self.record("search_pending".into());
    }

    fn on_search_active(&self) {
        self.record("search_active".into());
    }

    fn on_search_result(&self, result: &SearchResult) {
        self.record(format!("search_result:{}", result.display_text().unwrap_or("")));
    }
}

impl PlaybackStatusSink for RecordingCollaborators {
    fn on_playback_start(&self) {
        self.record("playback_start".into());
    }

    fn on_playback_end(&self) {
        self.record("playback_end".into());
    }
}

impl TurnCompleteListener for RecordingCollaborators {
    fn on_turn_complete(&self, transcript: &str) {
        self.record(format!("turn_complete:{}", transcript));
    }
}
