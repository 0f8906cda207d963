//! Credential Set sent as the channel handshake
//!
//! The set is built once before a session starts and is read-only while
//! the session runs. Values are opaque strings: they are serialized into
//! the handshake and nowhere else, and are wiped from memory on drop.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SessionError;

/// Named credential slots carried in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    /// Streaming speech transcription. Mandatory.
    SpeechTranscription,
    /// Text generation for assistant replies
    LanguageModel,
    /// Speech synthesis of assistant replies
    Narration,
    /// Web search
    WebSearch,
    /// Weather lookups
    Weather,
}

impl CredentialSlot {
    pub const ALL: [CredentialSlot; 5] = [
        CredentialSlot::SpeechTranscription,
        CredentialSlot::LanguageModel,
        CredentialSlot::Narration,
        CredentialSlot::WebSearch,
        CredentialSlot::Weather,
    ];

    /// Key used on the wire and on disk
    pub fn key(&self) -> &'static str {
        match self {
            CredentialSlot::SpeechTranscription => "assembly",
            CredentialSlot::LanguageModel => "google",
            CredentialSlot::Narration => "murf",
            CredentialSlot::WebSearch => "tavily",
            CredentialSlot::Weather => "weather",
        }
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, CredentialSlot::SpeechTranscription)
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialSlot::SpeechTranscription => "speech-transcription",
            CredentialSlot::LanguageModel => "language-model",
            CredentialSlot::Narration => "narration",
            CredentialSlot::WebSearch => "web-search",
            CredentialSlot::Weather => "weather",
        };
        write!(f, "{} ({})", label, self.key())
    }
}

/// Opaque credential values, one per slot
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialSet {
    #[serde(default, alias = "ASSEMBLYAI_API_KEY")]
    assembly: String,
    #[serde(default, alias = "GOOGLE_API_KEY")]
    google: String,
    #[serde(default, alias = "MURF_API_KEY")]
    murf: String,
    #[serde(default, alias = "TAVILY_API_KEY")]
    tavily: String,
    #[serde(default)]
    weather: String,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, slot: CredentialSlot, value: impl Into<String>) -> Self {
        self.set(slot, value);
        self
    }

    pub fn set(&mut self, slot: CredentialSlot, value: impl Into<String>) {
        let field = self.field_mut(slot);
        field.zeroize();
        *field = value.into();
    }

    /// The value for `slot`, or `None` when it is empty or blank
    pub fn get(&self, slot: CredentialSlot) -> Option<&str> {
        let value = match slot {
            CredentialSlot::SpeechTranscription => &self.assembly,
            CredentialSlot::LanguageModel => &self.google,
            CredentialSlot::Narration => &self.murf,
            CredentialSlot::WebSearch => &self.tavily,
            CredentialSlot::Weather => &self.weather,
        };
        if value.trim().is_empty() {
            None
        } else {
            Some(value.as_str())
        }
    }

    /// The value for `slot`, failing with `MissingCredential` when absent
    pub fn require(&self, slot: CredentialSlot) -> Result<&str, SessionError> {
        self.get(slot).ok_or(SessionError::MissingCredential(slot))
    }

    /// Check every mandatory slot is populated
    pub fn validate(&self) -> Result<(), SessionError> {
        for slot in CredentialSlot::ALL.iter().filter(|s| s.is_mandatory()) {
            self.require(*slot)?;
        }
        Ok(())
    }

    /// Copy with surrounding whitespace removed from every value
    pub fn trimmed(&self) -> Self {
        let mut out = Self::new();
        for slot in CredentialSlot::ALL {
            if let Some(value) = self.get(slot) {
                out.set(slot, value.trim());
            }
        }
        out
    }

    /// JSON handshake payload
    pub fn to_handshake(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn field_mut(&mut self, slot: CredentialSlot) -> &mut String {
        match slot {
            CredentialSlot::SpeechTranscription => &mut self.assembly,
            CredentialSlot::LanguageModel => &mut self.google,
            CredentialSlot::Narration => &mut self.murf,
            CredentialSlot::WebSearch => &mut self.tavily,
            CredentialSlot::Weather => &mut self.weather,
        }
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let populated: Vec<&'static str> = CredentialSlot::ALL
            .iter()
            .filter(|slot| self.get(**slot).is_some())
            .map(|slot| slot.key())
            .collect();
        f.debug_struct("CredentialSet")
            .field("populated", &populated)
            .finish()
    }
}
