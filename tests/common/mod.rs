//! Fakes and a harness shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use jarvis::credentials::StaticCredentials;
use jarvis::integration::{AssistantConfig, MicState, Orchestrator, OrchestratorHandle};
use jarvis::llm::{HttpRequest, HttpResponse, HttpTransport};
use jarvis::messages::{Message, Sender};
use jarvis::persistence::MemoryStore;
use jarvis::speech::{
    RecognitionEngine, SynthesisEngine, SynthesisSink, Utterance, UtteranceSink,
};
use jarvis::ui::UiSink;
use jarvis::{JarvisError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// === Recognition ===

#[derive(Default)]
struct RecognitionInner {
    deny_permission: bool,
    fail_ready: bool,
    hang_ready: bool,
    sink: Option<UtteranceSink>,
    recognizing: bool,
    permission_requests: usize,
    languages: Vec<String>,
    stops: usize,
}

/// Test-side control over [`FakeRecognition`]
#[derive(Clone, Default)]
pub struct RecognitionControl {
    inner: Arc<Mutex<RecognitionInner>>,
}

impl RecognitionControl {
    pub fn engine(&self) -> FakeRecognition {
        FakeRecognition {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn deny_permission(&self, deny: bool) {
        self.inner.lock().deny_permission = deny;
    }

    pub fn fail_ready(&self) {
        self.inner.lock().fail_ready = true;
    }

    pub fn hang_ready(&self) {
        self.inner.lock().hang_ready = true;
    }

    /// Deliver `text` through the most recently registered sink
    pub fn say(&self, text: &str) {
        if let Some(sink) = self.inner.lock().sink.clone() {
            sink.deliver(text);
        }
    }

    pub fn end_on_its_own(&self) {
        if let Some(sink) = self.inner.lock().sink.clone() {
            sink.ended();
        }
    }

    pub fn is_recognizing(&self) -> bool {
        self.inner.lock().recognizing
    }

    pub fn permission_requests(&self) -> usize {
        self.inner.lock().permission_requests
    }

    /// Language of every start, in order
    pub fn starts(&self) -> Vec<String> {
        self.inner.lock().languages.clone()
    }
}

pub struct FakeRecognition {
    inner: Arc<Mutex<RecognitionInner>>,
}

#[async_trait]
impl RecognitionEngine for FakeRecognition {
    async fn ready(&mut self) -> Result<()> {
        let (fail, hang) = {
            let inner = self.inner.lock();
            (inner.fail_ready, inner.hang_ready)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(JarvisError::RecognitionUnsupported);
        }
        Ok(())
    }

    async fn request_permission(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.permission_requests += 1;
        if inner.deny_permission {
            Err(JarvisError::PermissionDenied)
        } else {
            Ok(())
        }
    }

    fn start(&mut self, language: &str, sink: UtteranceSink) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.languages.push(language.to_string());
        inner.sink = Some(sink);
        inner.recognizing = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        inner.recognizing = false;
        inner.stops += 1;
    }

    fn is_recognizing(&self) -> bool {
        self.inner.lock().recognizing
    }
}

// === Synthesis ===

#[derive(Default)]
struct SynthesisInner {
    current: Option<SynthesisSink>,
    spoken: Vec<Utterance>,
    cancels: usize,
    fail_speak: bool,
}

/// Test-side control over [`FakeSynthesis`]
#[derive(Clone, Default)]
pub struct SynthesisControl {
    inner: Arc<Mutex<SynthesisInner>>,
}

impl SynthesisControl {
    pub fn engine(&self) -> FakeSynthesis {
        FakeSynthesis {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn fail_speak(&self) {
        self.inner.lock().fail_speak = true;
    }

    /// Report the current utterance as finished
    pub fn finish(&self) {
        if let Some(sink) = self.inner.lock().current.take() {
            sink.ended();
        }
    }

    pub fn fail_current(&self, message: &str) {
        if let Some(sink) = self.inner.lock().current.take() {
            sink.failed(message);
        }
    }

    /// Sink of the last utterance, even after it was cancelled
    pub fn last_sink(&self) -> Option<SynthesisSink> {
        self.inner.lock().current.clone()
    }

    pub fn is_speaking(&self) -> bool {
        self.inner.lock().current.is_some()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.inner
            .lock()
            .spoken
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.inner.lock().spoken.clone()
    }

    pub fn cancels(&self) -> usize {
        self.inner.lock().cancels
    }
}

pub struct FakeSynthesis {
    inner: Arc<Mutex<SynthesisInner>>,
}

#[async_trait]
impl SynthesisEngine for FakeSynthesis {
    async fn ready(&mut self) -> Result<()> {
        Ok(())
    }

    fn speak(&mut self, utterance: Utterance, sink: SynthesisSink) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_speak {
            return Err(JarvisError::SynthesisError("no voices".to_string()));
        }
        sink.started();
        inner.spoken.push(utterance);
        inner.current = Some(sink);
        Ok(())
    }

    fn cancel(&mut self) {
        let mut inner = self.inner.lock();
        if inner.current.take().is_some() {
            inner.cancels += 1;
        }
    }

    fn is_speaking(&self) -> bool {
        self.inner.lock().current.is_some()
    }
}

// === Transport ===

#[derive(Clone, Debug)]
pub struct ScriptedResponse {
    pub delay: Duration,
    pub outcome: std::result::Result<HttpResponse, String>,
}

impl ScriptedResponse {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(HttpResponse::new(status, body)),
        }
    }

    pub fn rate_limited() -> Self {
        Self::status(429, r#"{"error":"slow down"}"#)
    }

    pub fn gemini(text: &str) -> Self {
        Self::status(200, gemini_body(text))
    }

    pub fn chat(text: &str) -> Self {
        Self::status(200, chat_body(text))
    }

    pub fn unreachable() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err("connection refused".to_string()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub fn gemini_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string()
}

pub fn chat_body(text: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    })
    .to_string()
}

/// Replays queued responses and records when each request was sent
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<(Instant, HttpRequest)>>,
    in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<Instant> {
        self.requests.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, String> {
        self.requests.lock().push((Instant::now(), request.clone()));
        let scripted = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| ScriptedResponse::status(500, "no scripted response"));

        let _in_flight = InFlight::enter(&self.in_flight);
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.outcome
    }
}

/// Counts a request as in flight until dropped, including when its task is aborted
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// === UI ===

#[derive(Clone, Debug, PartialEq)]
pub enum UiEvent {
    State(MicState),
    Message(Sender, String),
    Error(String),
    Notice(String),
    Cleared,
    Opened(String),
}

type Sampler = Box<dyn Fn() -> [bool; 3] + Send + Sync>;

/// Records everything the orchestrator shows
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    open_links: AtomicBool,
    sampler: Mutex<Option<Sampler>>,
    samples: Mutex<Vec<[bool; 3]>>,
}

impl Default for RecordingUi {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            open_links: AtomicBool::new(true),
            sampler: Mutex::new(None),
            samples: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingUi {
    pub fn refuse_links(&self) {
        self.open_links.store(false, Ordering::SeqCst);
    }

    /// Take a sample of `[recognizing, requesting, speaking]` on every callback
    pub fn sample_with(&self, sampler: impl Fn() -> [bool; 3] + Send + Sync + 'static) {
        *self.sampler.lock() = Some(Box::new(sampler));
    }

    pub fn samples(&self) -> Vec<[bool; 3]> {
        self.samples.lock().clone()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn states(&self) -> Vec<MicState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn opened(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Opened(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: UiEvent) {
        if let Some(sampler) = self.sampler.lock().as_ref() {
            self.samples.lock().push(sampler());
        }
        self.events.lock().push(event);
    }
}

impl UiSink for RecordingUi {
    fn render_state(&self, state: MicState) {
        self.record(UiEvent::State(state));
    }

    fn render_message(&self, message: &Message) {
        self.record(UiEvent::Message(message.sender, message.body.clone()));
    }

    fn render_error(&self, error: &str) {
        self.record(UiEvent::Error(error.to_string()));
    }

    fn render_notice(&self, notice: &str) {
        self.record(UiEvent::Notice(notice.to_string()));
    }

    fn transcript_cleared(&self) {
        self.record(UiEvent::Cleared);
    }

    fn open_link(&self, url: &str) -> bool {
        self.record(UiEvent::Opened(url.to_string()));
        self.open_links.load(Ordering::SeqCst)
    }
}

// === Harness ===

pub struct Harness {
    pub handle: OrchestratorHandle,
    pub recognition: RecognitionControl,
    pub synthesis: SynthesisControl,
    pub ui: Arc<RecordingUi>,
    pub transport: Arc<ScriptedTransport>,
    pub store: MemoryStore,
    task: JoinHandle<()>,
}

pub struct HarnessBuilder {
    config: AssistantConfig,
    credentials: StaticCredentials,
    recognition: RecognitionControl,
    synthesis: SynthesisControl,
    ui: Arc<RecordingUi>,
    transport: Arc<ScriptedTransport>,
    store: MemoryStore,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: AssistantConfig::default(),
            credentials: StaticCredentials::new().with(jarvis::llm::Provider::Gemini, "test-key"),
            recognition: RecognitionControl::default(),
            synthesis: SynthesisControl::default(),
            ui: Arc::new(RecordingUi::default()),
            transport: ScriptedTransport::new([]),
            store: MemoryStore::new(),
        }
    }

    pub fn config(mut self, config: AssistantConfig) -> Self {
        self.config = config;
        self
    }

    pub fn credentials(mut self, credentials: StaticCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn responses(mut self, responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        self.transport = ScriptedTransport::new(responses);
        self
    }

    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = store;
        self
    }

    /// Adjust the fakes before the orchestrator starts
    pub fn recognition(self, setup: impl FnOnce(&RecognitionControl)) -> Self {
        setup(&self.recognition);
        self
    }

    pub fn ui(self, setup: impl FnOnce(&RecordingUi)) -> Self {
        setup(&self.ui);
        self
    }

    pub async fn start(self) -> Harness {
        let (orchestrator, handle) = Orchestrator::builder(self.config)
            .with_recognition(self.recognition.engine())
            .with_synthesis(self.synthesis.engine())
            .with_ui(self.ui.clone())
            .with_store(Arc::new(self.store.clone()))
            .with_credentials(self.credentials)
            .with_transport(self.transport.clone())
            .build()
            .expect("orchestrator builds");

        let task = tokio::spawn(orchestrator.run());
        let harness = Harness {
            handle,
            recognition: self.recognition,
            synthesis: self.synthesis,
            ui: self.ui,
            transport: self.transport,
            store: self.store,
            task,
        };
        harness.settle().await;
        harness
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    /// Let every runnable task finish its current work
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Move the paused clock forward, firing timers on the way
    pub async fn advance(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
        self.settle().await;
    }

    pub fn state(&self) -> MicState {
        self.handle.state()
    }

    pub async fn press_mic(&self) {
        self.handle.mic_pressed().expect("orchestrator running");
        self.settle().await;
    }

    pub async fn type_text(&self, text: &str) {
        self.handle.submit_text(text).expect("orchestrator running");
        self.settle().await;
    }

    pub async fn say(&self, text: &str) {
        self.recognition.say(text);
        self.settle().await;
    }

    pub async fn finish_speaking(&self) {
        self.synthesis.finish();
        self.settle().await;
    }

    /// Transcript as `(sender, body)` pairs
    pub fn transcript(&self) -> Vec<(Sender, String)> {
        self.handle
            .transcript()
            .get_all()
            .into_iter()
            .map(|m| (m.sender, m.body))
            .collect()
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().expect("orchestrator running");
        self.task.await.expect("orchestrator task");
    }
}
