//! Voice Link command line client
//!
//! Streams the microphone to a voice endpoint and plays back its replies.
//!
//! ```text
//! voice-link [URL]     run a session (URL overrides the configured endpoint)
//! voice-link devices   list audio devices
//! voice-link save-keys store credentials from VOICE_LINK_* variables
//! ```

use anyhow::{bail, Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_link::{
    audio::{list_devices, CpalBackend},
    collaborators::{Collaborators, PlaybackStatusSink, SearchSink, TranscriptSink},
    config::{AppConfig, CredentialStore},
    network::WsConnector,
    protocol::{CredentialSet, CredentialSlot, SearchResult},
    session::SessionController,
};

/// Sources shown per search result
const MAX_SOURCES: usize = 3;

/// Prints collaborator notifications to the terminal
struct ConsoleCollaborator;

impl TranscriptSink for ConsoleCollaborator {
    fn on_turn(&self, transcript: &str) {
        println!("you: {}", transcript);
    }

    fn on_assistant_text(&self, text: &str) {
        println!("assistant: {}", text);
    }
}

impl SearchSink for ConsoleCollaborator {
    fn on_search_pending(&self) {
        println!("(search idle)");
    }

    fn on_search_active(&self) {
        println!("(searching...)");
    }

    fn on_search_result(&self, result: &SearchResult) {
        if result.is_empty() {
            println!("search: No relevant results found.");
            return;
        }
        if let Some(text) = result.display_text() {
            println!("search: {}", text);
        }
        for (title, url) in result.sources(MAX_SOURCES) {
            println!("  - {} <{}>", title, url);
        }
    }
}

impl PlaybackStatusSink for ConsoleCollaborator {
    fn on_playback_start(&self) {
        println!("(speaking)");
    }

    fn on_playback_end(&self) {
        println!("(listening)");
    }
}

fn print_devices() {
    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let device_type = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}", device.name, device_type, default_marker);
    }
    println!();
}

fn save_keys() -> Result<()> {
    let mut credentials = CredentialSet::new();
    for slot in CredentialSlot::ALL {
        let var = format!("VOICE_LINK_{}", slot.key().to_uppercase());
        if let Ok(value) = std::env::var(&var) {
            credentials.set(slot, value);
        }
    }

    let store = CredentialStore::default_location()?;
    store.save(&credentials)?;
    println!("Credentials saved to {}", store.path().display());
    Ok(())
}

async fn run_session(url_override: Option<String>) -> Result<ExitCode> {
    let mut config = AppConfig::load(None)?;
    if let Some(url) = url_override {
        config.channel.url = url;
    }
    config.validate()?;

    let store = CredentialStore::default_location()?;
    let credentials = store
        .load()
        .with_context(|| format!("loading credentials from {}", store.path().display()))?;

    let connector = WsConnector::new(config.channel.outbound_queue);
    let collaborators = Collaborators::uniform(Arc::new(ConsoleCollaborator));
    let mut controller =
        SessionController::new(config, credentials, connector, CpalBackend, collaborators);

    if let Err(e) = controller.start().await {
        bail!("could not start session: {}", e);
    }
    tracing::info!("Session running - press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping");
            controller.stop().await;
        }
        end = controller.wait() => {
            // The session already logged why it failed
            if end.map(|end| end.is_failure()).unwrap_or(false) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let arg = std::env::args().nth(1);
    match arg.as_deref() {
        Some("devices") => {
            print_devices();
            Ok(ExitCode::SUCCESS)
        }
        Some("save-keys") => save_keys().map(|_| ExitCode::SUCCESS),
        _ => run_session(arg).await,
    }
}
