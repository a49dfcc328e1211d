//! Orchestrator for the voice assistant turn cycle
//!
//! Connects all components: Voice/Text -> Completion -> Transcript + Speech
//!
//! The event loop in [`Orchestrator::run`] is the only place that changes the
//! [`MicState`]. Engines, timers and completion tasks report back through one
//! channel, and every report carries the generation, turn or utterance it
//! belongs to so the loop can drop anything left over from a mode it already
//! tore down.

use crate::credentials::{CredentialSource, EnvCredentials};
use crate::integration::config::AssistantConfig;
use crate::integration::events::{AppCommand, Event, SynthesisEvent};
use crate::integration::fallback::{missing_credential_notice, FallbackResponder};
use crate::integration::filter::is_noise;
use crate::integration::session::Session;
use crate::integration::state::{MicState, SharedMicState};
use crate::llm::{
    prepare_reply, speakable_text, CompletionClient, CompletionError, HttpTransport, Provider,
    ProviderRegistry, ReqwestTransport,
};
use crate::messages::{Message, TranscriptStore};
use crate::persistence::{KeyValueStore, MemoryStore, LANGUAGE_KEY, PROVIDER_KEY};
use crate::speech::{RecognitionEngine, SpeechInputSession, SpeechOutputSession, SynthesisEngine};
use crate::ui::UiSink;
use crate::{JarvisError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const BUSY_NOTICE: &str = "Still working on your last request. Please wait.";

/// Which way listening was entered; each has its own auto-stop timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenPath {
    UserStart,
    Restart,
}

/// The request currently awaited in `Processing`
#[derive(Debug)]
struct PendingTurn {
    id: u64,
    text: String,
    provider: Provider,
    task: JoinHandle<()>,
}

/// Handle for controlling the orchestrator from the UI
#[derive(Clone)]
pub struct OrchestratorHandle {
    events: UnboundedSender<Event>,
    state: SharedMicState,
    transcript: TranscriptStore,
}

impl OrchestratorHandle {
    /// Send a command to the orchestrator
    pub fn send(&self, command: AppCommand) -> Result<()> {
        self.events
            .send(Event::Command(command))
            .map_err(|e| JarvisError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn mic_pressed(&self) -> Result<()> {
        self.send(AppCommand::MicPressed)
    }

    pub fn submit_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(AppCommand::TextSubmitted(text.into()))
    }

    pub fn select_provider(&self, provider: Provider) -> Result<()> {
        self.send(AppCommand::ProviderSelected(provider))
    }

    pub fn select_language(&self, language: impl Into<String>) -> Result<()> {
        self.send(AppCommand::LanguageSelected(language.into()))
    }

    pub fn clear(&self) -> Result<()> {
        self.send(AppCommand::ClearRequested)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(AppCommand::Shutdown)
    }

    /// Current mic state
    pub fn state(&self) -> MicState {
        self.state.get()
    }

    pub fn shared_state(&self) -> SharedMicState {
        self.state.clone()
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }
}

/// Main orchestrator that coordinates all components
pub struct Orchestrator {
    config: AssistantConfig,

    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,

    input: SpeechInputSession,
    output: SpeechOutputSession,
    client: Arc<CompletionClient>,
    transcript: TranscriptStore,
    preferences: Arc<dyn KeyValueStore>,
    ui: Arc<dyn UiSink>,
    session: Arc<Session>,
    fallback: FallbackResponder,

    state: MicState,
    shared_state: SharedMicState,

    last_turn: u64,
    pending: Option<PendingTurn>,
    auto_stop: Option<JoinHandle<()>>,

    /// Set when recognition could not be initialized; the mic is inert
    recognition_unavailable: Option<JarvisError>,
}

impl Orchestrator {
    /// Start with an [`OrchestratorBuilder`]
    pub fn builder(config: AssistantConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Run until a shutdown command arrives
    pub async fn run(mut self) {
        info!("Orchestrator started");
        self.initialize().await;

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle(event).await {
                break;
            }
        }

        self.teardown();
        info!("Orchestrator stopped");
    }

    async fn initialize(&mut self) {
        for message in self.transcript.load() {
            self.ui.render_message(&message);
        }

        let ready_timeout = self.config.engine_ready_timeout();
        let recognition_ready = tokio::time::timeout(ready_timeout, self.input.ready()).await;
        match recognition_ready {
            Ok(Ok(())) => debug!("Recognition engine ready"),
            Ok(Err(e)) => self.disable_recognition(&e.to_string()),
            Err(_) => self.disable_recognition(&format!("not ready after {:?}", ready_timeout)),
        }

        let synthesis_ready = tokio::time::timeout(ready_timeout, self.output.ready()).await;
        match synthesis_ready {
            Ok(Ok(())) => debug!("Synthesis engine ready"),
            Ok(Err(e)) => warn!("Synthesis engine failed to load: {}", e),
            Err(_) => warn!("Synthesis engine not ready after {:?}", ready_timeout),
        }

        let active = self.session.active();
        if !active.has_credential() {
            self.ui.render_error(&missing_credential_notice(active.id));
        }

        info!(
            "Using {} in {} ({} providers usable)",
            self.session.provider,
            self.session.language,
            self.session.registry().usable().len()
        );
        self.ui.render_state(self.state);
    }

    fn disable_recognition(&mut self, reason: &str) {
        warn!("Speech recognition unavailable: {}", reason);
        let error = JarvisError::RecognitionUnsupported;
        self.ui.render_error(&error.user_message());
        self.recognition_unavailable = Some(error);
    }

    /// Apply one event. Returns false when the loop should stop.
    async fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Command(AppCommand::Shutdown) => {
                info!("Orchestrator shutdown requested");
                return false;
            }
            Event::Command(command) => self.handle_command(command).await,

            Event::Utterance { generation, text } => {
                if self.is_current_listen(generation) {
                    if is_noise(&text) {
                        debug!("Ignoring noise: {:?}", text);
                    } else {
                        self.accept_input(text);
                    }
                } else {
                    debug!("Dropping stale utterance from generation {}", generation);
                }
            }

            Event::RecognitionEnded { generation } => {
                if self.is_current_listen(generation) {
                    debug!("Recognition ended without input");
                    self.enter_idle();
                }
            }

            Event::RecognitionFailed {
                generation,
                message,
            } => {
                if self.is_current_listen(generation) {
                    warn!("Recognition failed: {}", message);
                    self.enter_idle();
                    self.ui
                        .render_error(&JarvisError::RecognitionError(message).user_message());
                }
            }

            Event::AutoStopElapsed { generation } => {
                if self.is_current_listen(generation) {
                    info!("No input, stopping recognition");
                    self.enter_idle();
                }
            }

            Event::Synthesis { utterance, event } => self.handle_synthesis(utterance, event).await,

            Event::CompletionNotice { turn, notice } => {
                if self.is_current_turn(turn) {
                    self.ui.render_notice(&notice.to_string());
                }
            }

            Event::CompletionResolved { turn, result } => {
                match self.pending.take() {
                    Some(pending) if pending.id == turn && self.state.is_processing() => {
                        self.complete_turn(pending, result).await;
                    }
                    other => {
                        debug!("Dropping stale completion for turn {}", turn);
                        self.pending = other;
                    }
                }
            }
        }
        true
    }

    async fn handle_command(&mut self, command: AppCommand) {
        match command {
            AppCommand::MicPressed => {
                if self.state.is_idle() {
                    self.start_listening(ListenPath::UserStart).await;
                } else {
                    info!("User stop while {}", self.state);
                    self.enter_idle();
                }
            }
            AppCommand::TextSubmitted(text) => {
                if self.state.is_processing() {
                    self.ui.render_notice(BUSY_NOTICE);
                } else if is_noise(&text) {
                    debug!("Ignoring typed noise: {:?}", text);
                } else {
                    self.accept_input(text);
                }
            }
            AppCommand::ProviderSelected(provider) => self.select_provider(provider),
            AppCommand::LanguageSelected(language) => self.select_language(language).await,
            AppCommand::ClearRequested => {
                self.transcript.clear();
                self.ui.transcript_cleared();
                info!("Transcript cleared");
            }
            AppCommand::Shutdown => {}
        }
    }

    async fn handle_synthesis(&mut self, utterance: u64, event: SynthesisEvent) {
        match event {
            SynthesisEvent::Started => debug!("Utterance {} started", utterance),
            SynthesisEvent::Ended | SynthesisEvent::Failed(_) => {
                if !self.output.finish(utterance) || !self.state.is_speaking() {
                    debug!("Ignoring end of stale utterance {}", utterance);
                    return;
                }
                if let SynthesisEvent::Failed(message) = event {
                    warn!("Synthesis failed: {}", message);
                    self.ui
                        .render_error(&JarvisError::SynthesisError(message).user_message());
                }
                self.finish_speaking().await;
            }
        }
    }

    fn is_current_listen(&self, generation: u64) -> bool {
        self.state.is_listening() && self.input.is_active() && generation == self.input.generation()
    }

    fn is_current_turn(&self, turn: u64) -> bool {
        self.state.is_processing() && self.pending.as_ref().is_some_and(|p| p.id == turn)
    }

    async fn start_listening(&mut self, path: ListenPath) {
        if let Some(error) = &self.recognition_unavailable {
            self.ui.render_error(&error.user_message());
            return;
        }

        self.teardown();
        match self.input.begin(&self.session.language).await {
            Ok(()) => {
                self.set_state(MicState::Listening);
                let timeout = match path {
                    ListenPath::UserStart => self.config.auto_stop.user_start(),
                    ListenPath::Restart => self.config.auto_stop.restart(),
                };
                if let Some(timeout) = timeout {
                    self.arm_auto_stop(timeout);
                }
            }
            Err(e) => {
                warn!("Could not start listening: {}", e);
                self.set_state(MicState::Idle);
                self.ui.render_error(&e.user_message());
            }
        }
    }

    fn arm_auto_stop(&mut self, timeout: Duration) {
        self.cancel_auto_stop();
        let events = self.events_tx.clone();
        let generation = self.input.generation();
        debug!("Auto-stop in {:?} (generation {})", timeout, generation);
        self.auto_stop = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(Event::AutoStopElapsed { generation });
        }));
    }

    fn cancel_auto_stop(&mut self) {
        if let Some(timer) = self.auto_stop.take() {
            timer.abort();
        }
    }

    /// Take a user input into `Processing` and dispatch it
    fn accept_input(&mut self, text: String) {
        // Barge-in: whatever was running stops before the new turn
        self.teardown();

        let text = text.trim().to_string();
        self.append(Message::user(text.clone()));
        self.set_state(MicState::Processing);
        self.dispatch(text);
    }

    fn dispatch(&mut self, text: String) {
        self.last_turn += 1;
        let turn = self.last_turn;
        let provider = self.session.active().clone();
        let provider_id = provider.id;

        info!("Turn {}: asking {}", turn, provider_id);
        let client = Arc::clone(&self.client);
        let events = self.events_tx.clone();
        let prompt = text.clone();
        let task = tokio::spawn(async move {
            let notices = events.clone();
            let result = client
                .complete(&prompt, &provider, move |notice| {
                    let _ = notices.send(Event::CompletionNotice { turn, notice });
                })
                .await;
            let _ = events.send(Event::CompletionResolved { turn, result });
        });

        self.pending = Some(PendingTurn {
            id: turn,
            text,
            provider: provider_id,
            task,
        });
    }

    async fn complete_turn(
        &mut self,
        pending: PendingTurn,
        result: std::result::Result<String, CompletionError>,
    ) {
        match result {
            Ok(raw) => {
                let reply = prepare_reply(&raw);
                if !reply.display.is_empty() {
                    self.append(Message::assistant(reply.display.clone()));
                }
                if let Some(url) = &reply.link {
                    info!("Opening {}", url);
                    if !self.ui.open_link(url) {
                        self.append(Message::system(format!(
                            "Could not open link automatically. Please visit: {}",
                            url
                        )));
                    }
                }
                self.speak(&reply.spoken).await;
            }
            Err(error) => {
                warn!("Turn {} failed: {}", pending.id, error);
                let alternatives = self.session.alternatives();
                let fallback =
                    self.fallback
                        .respond(&error, &pending.text, pending.provider, &alternatives);
                self.ui.render_error(&fallback.error);
                self.append(Message::system(format!("Error: {}", fallback.error)));
                self.append(Message::assistant(fallback.reply.clone()));
                self.speak(&speakable_text(&fallback.reply)).await;
            }
        }
    }

    async fn speak(&mut self, text: &str) {
        if text.is_empty() {
            self.finish_speaking().await;
            return;
        }

        match self.output.speak(text, &self.session.language) {
            Ok(id) => {
                debug!("Speaking utterance {}", id);
                self.set_state(MicState::Speaking);
            }
            Err(e) => {
                warn!("Could not speak reply: {}", e);
                self.ui.render_error(&e.user_message());
                self.finish_speaking().await;
            }
        }
    }

    async fn finish_speaking(&mut self) {
        self.enter_idle();
        if self.config.relisten_after_reply && self.recognition_unavailable.is_none() {
            self.start_listening(ListenPath::Restart).await;
        }
    }

    fn select_provider(&mut self, provider: Provider) {
        self.session = Arc::new(self.session.with_provider(provider));
        if let Err(e) = self.preferences.set(PROVIDER_KEY, provider.as_str()) {
            warn!("Failed to save provider choice: {}", e);
        }

        if self.session.active().has_credential() {
            info!("Switched to {}", provider);
            self.ui
                .render_notice(&format!("Ready with {}", provider.display_name()));
        } else {
            self.ui.render_error(&missing_credential_notice(provider));
        }
    }

    async fn select_language(&mut self, language: String) {
        let language = language.trim().to_string();
        if language.is_empty() {
            return;
        }

        self.session = Arc::new(self.session.with_language(language.clone()));
        if let Err(e) = self.preferences.set(LANGUAGE_KEY, &language) {
            warn!("Failed to save language: {}", e);
        }
        self.ui.render_notice(&format!("Language set to {}", language));

        if self.state.is_listening() {
            self.start_listening(ListenPath::UserStart).await;
        }
    }

    fn append(&self, message: Message) {
        self.ui.render_message(&message);
        self.transcript.append(message);
    }

    /// Stop every side effect of the current state
    fn teardown(&mut self) {
        self.cancel_auto_stop();
        self.input.end();
        self.output.stop();
        if let Some(pending) = self.pending.take() {
            // No throttled send or 429 retry goes out for an abandoned turn
            debug!("Abandoning turn {}", pending.id);
            pending.task.abort();
        }
    }

    fn enter_idle(&mut self) {
        self.teardown();
        self.set_state(MicState::Idle);
    }

    fn set_state(&mut self, state: MicState) {
        if self.state == state {
            return;
        }
        debug!("{} -> {}", self.state, state);
        self.state = state;
        self.shared_state.set(state);
        self.ui.render_state(state);
    }
}

/// Builder for creating an orchestrator
pub struct OrchestratorBuilder {
    config: AssistantConfig,
    recognition: Option<Box<dyn RecognitionEngine>>,
    synthesis: Option<Box<dyn SynthesisEngine>>,
    ui: Option<Arc<dyn UiSink>>,
    store: Option<Arc<dyn KeyValueStore>>,
    credentials: Option<Box<dyn CredentialSource>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            recognition: None,
            synthesis: None,
            ui: None,
            store: None,
            credentials: None,
            transport: None,
        }
    }

    pub fn with_recognition(mut self, engine: impl RecognitionEngine + 'static) -> Self {
        self.recognition = Some(Box::new(engine));
        self
    }

    pub fn with_synthesis(mut self, engine: impl SynthesisEngine + 'static) -> Self {
        self.synthesis = Some(Box::new(engine));
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn UiSink>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Backing store for the transcript and preferences (in-memory if unset)
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Where API keys come from (environment if unset)
    pub fn with_credentials(mut self, credentials: impl CredentialSource + 'static) -> Self {
        self.credentials = Some(Box::new(credentials));
        self
    }

    /// HTTP layer for completions (`reqwest` if unset)
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<(Orchestrator, OrchestratorHandle)> {
        self.config.validate()?;

        let recognition = self
            .recognition
            .ok_or_else(|| JarvisError::ConfigError("no recognition engine".to_string()))?;
        let synthesis = self
            .synthesis
            .ok_or_else(|| JarvisError::ConfigError("no synthesis engine".to_string()))?;
        let ui = self
            .ui
            .ok_or_else(|| JarvisError::ConfigError("no UI".to_string()))?;
        let store: Arc<dyn KeyValueStore> = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let credentials = self.credentials.unwrap_or_else(|| Box::new(EnvCredentials));
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.request_timeout())),
        };

        let registry = Arc::new(ProviderRegistry::build(
            &self.config.provider_settings()?,
            credentials.as_ref(),
        ));
        let (provider, language) = restore_preferences(store.as_ref(), &self.config);
        let session = Arc::new(Session::new(provider, language, registry));

        let (events_tx, events_rx) = unbounded_channel();
        let transcript = TranscriptStore::new(Arc::clone(&store));
        let shared_state = SharedMicState::new();

        let handle = OrchestratorHandle {
            events: events_tx.clone(),
            state: shared_state.clone(),
            transcript: transcript.clone(),
        };

        let orchestrator = Orchestrator {
            input: SpeechInputSession::new(recognition, events_tx.clone()),
            output: SpeechOutputSession::new(synthesis, events_tx.clone(), self.config.voice),
            client: Arc::new(CompletionClient::new(transport, self.config.retry.clone())),
            transcript,
            preferences: store,
            ui,
            session,
            fallback: FallbackResponder::new(),
            state: MicState::Idle,
            shared_state,
            last_turn: 0,
            pending: None,
            auto_stop: None,
            recognition_unavailable: None,
            events_tx,
            events_rx,
            config: self.config,
        };

        Ok((orchestrator, handle))
    }
}

/// Saved provider and language, falling back to configured defaults
fn restore_preferences(store: &dyn KeyValueStore, config: &AssistantConfig) -> (Provider, String) {
    let provider = match store.get(PROVIDER_KEY) {
        Ok(Some(saved)) => saved.parse().unwrap_or_else(|_| {
            warn!("Ignoring saved provider {:?}", saved);
            config.default_provider
        }),
        Ok(None) => config.default_provider,
        Err(e) => {
            warn!("Failed to read saved provider: {}", e);
            config.default_provider
        }
    };

    let language = match store.get(LANGUAGE_KEY) {
        Ok(Some(saved)) if !saved.trim().is_empty() => saved.trim().to_string(),
        Ok(_) => config.default_language.clone(),
        Err(e) => {
            warn!("Failed to read saved language: {}", e);
            config.default_language.clone()
        }
    };

    (provider, language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{ConsoleMicrophone, ConsoleRecognition, ConsoleSynthesis};
    use crate::ui::ConsoleUi;

    fn builder() -> OrchestratorBuilder {
        Orchestrator::builder(AssistantConfig::default())
            .with_recognition(ConsoleRecognition::new(ConsoleMicrophone::new()))
            .with_synthesis(ConsoleSynthesis::new())
            .with_ui(Arc::new(ConsoleUi::new()))
    }

    #[test]
    fn test_orchestrator_creation() {
        let (_, handle) = builder().build().unwrap();
        assert_eq!(handle.state(), MicState::Idle);
        assert!(handle.transcript().is_empty());
    }

    #[test]
    fn test_builder_requires_engines() {
        let result = Orchestrator::builder(AssistantConfig::default())
            .with_ui(Arc::new(ConsoleUi::new()))
            .build();
        assert!(matches!(result, Err(JarvisError::ConfigError(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Orchestrator::builder(AssistantConfig::default().with_language(""))
            .with_recognition(ConsoleRecognition::new(ConsoleMicrophone::new()))
            .with_synthesis(ConsoleSynthesis::new())
            .with_ui(Arc::new(ConsoleUi::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_restore_preferences() {
        let store = MemoryStore::new();
        let config = AssistantConfig::default();
        assert_eq!(
            restore_preferences(&store, &config),
            (Provider::Gemini, "en-US".to_string())
        );

        store.set(PROVIDER_KEY, "deepseek").unwrap();
        store.set(LANGUAGE_KEY, "es-ES").unwrap();
        assert_eq!(
            restore_preferences(&store, &config),
            (Provider::DeepSeek, "es-ES".to_string())
        );

        store.set(PROVIDER_KEY, "not-a-provider").unwrap();
        assert_eq!(restore_preferences(&store, &config).0, Provider::Gemini);
    }

    #[test]
    fn test_handle_send_after_drop_fails() {
        let (orchestrator, handle) = builder().build().unwrap();
        drop(orchestrator);
        assert!(matches!(handle.mic_pressed(), Err(JarvisError::ChannelError(_))));
    }
}
