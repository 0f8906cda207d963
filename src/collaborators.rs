//! Presentation-side collaborators
//!
//! The engine reports what happens on the channel through these traits and
//! never depends on what an implementation does with it. All callbacks run
//! on the session task, so they should return quickly.

use std::sync::Arc;

use crate::protocol::messages::SearchResult;

/// Receives transcript turns and generated assistant text
pub trait TranscriptSink: Send + Sync {
    fn on_turn(&self, transcript: &str);

    fn on_assistant_text(&self, text: &str);
}

/// Receives web search progress and results
pub trait SearchSink: Send + Sync {
    /// Channel is open, no search has run yet
    fn on_search_pending(&self) {}

    /// A turn ended and a search for it is under way
    fn on_search_active(&self) {}

    fn on_search_result(&self, result: &SearchResult);
}

/// Receives playback burst boundaries
pub trait PlaybackStatusSink: Send + Sync {
    fn on_playback_start(&self);

    fn on_playback_end(&self);
}

/// Notified after each completed turn, e.g. to chain a generation request
pub trait TurnCompleteListener: Send + Sync {
    fn on_turn_complete(&self, transcript: &str);
}

/// The set of collaborators handed to a session
#[derive(Clone)]
pub struct Collaborators {
    pub transcript: Arc<dyn TranscriptSink>,
    pub search: Arc<dyn SearchSink>,
    pub playback: Arc<dyn PlaybackStatusSink>,
    pub turn_complete: Option<Arc<dyn TurnCompleteListener>>,
}

impl Collaborators {
    /// Route every callback to one object
    pub fn uniform<T>(sink: Arc<T>) -> Self
    where
        T: TranscriptSink + SearchSink + PlaybackStatusSink + 'static,
    {
        Self {
            transcript: sink.clone(),
            search: sink.clone(),
            playback: sink,
            turn_complete: None,
        }
    }

    pub fn with_turn_complete(mut self, listener: Arc<dyn TurnCompleteListener>) -> Self {
        self.turn_complete = Some(listener);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::uniform(Arc::new(NoopCollaborator))
    }
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCollaborator;

impl TranscriptSink for NoopCollaborator {
    fn on_turn(&self, _transcript: &str) {}

    fn on_assistant_text(&self, _text: &str) {}
}

impl SearchSink for NoopCollaborator {
    fn on_search_result(&self, _result: &SearchResult) {}
}

impl PlaybackStatusSink for NoopCollaborator {
    fn on_playback_start(&self) {}

    fn on_playback_end(&self) {}
}

impl TurnCompleteListener for NoopCollaborator {
    fn on_turn_complete(&self, _transcript: &str) {}
}
