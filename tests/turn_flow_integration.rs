//! Integration tests for full conversations.
//!
//! These tests drive the public API end-to-end:
//! 1. TurnCoordinator opens a session and greets
//! 2. Each message runs through the TransitionEngine and a ScriptedOracle
//! 3. Side effects flow through the SideEffectQueue into the in-memory store
//!
//! Uses in-memory implementations so no LLM or database is needed.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lead_flow::adapters::oracle::ScriptedOracle;
use lead_flow::adapters::persistence::{
    InMemoryConversationStore, SideEffectQueue, SideEffectWorker,
};
use lead_flow::application::{ScheduleDemoHandler, TurnCoordinator, DEMO_REQUESTED_EVENT};
use lead_flow::domain::conversation::{
    catalogue, Context, ContextValue, EngineSettings, HandlerBinding, HandlerError, HandlerInput,
    HandlerReply, InputAnalysis, NodeHandler, NodeId, OracleError, Session, TransitionEngine,
    TurnRole, DEFAULT_APOLOGY,
};
use lead_flow::ports::{
    OracleRequest, PersistenceError, ReasoningOracle, SideEffect, SideEffectSink,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn inputs(pairs: &[(&str, &str)]) -> Context {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), ContextValue::text(*v)))
        .collect()
}

fn analysis(next: &str, pairs: &[(&str, &str)], reply: &str) -> InputAnalysis {
    InputAnalysis::new(next, inputs(pairs), 0.9, reply)
}

/// Coordinator wired to a real queue and in-memory store.
struct Harness {
    coordinator: TurnCoordinator,
    store: InMemoryConversationStore,
    worker: SideEffectWorker,
}

impl Harness {
    fn new(oracle: ScriptedOracle, settings: EngineSettings) -> Self {
        let store = InMemoryConversationStore::new();
        let (queue, worker) = SideEffectQueue::spawn(Arc::new(store.clone()), 256);
        let queue = Arc::new(queue);
        let graph = catalogue::sales_flow(ScheduleDemoHandler::binding(queue.clone())).unwrap();
        let engine = TransitionEngine::new(Arc::new(graph), Arc::new(oracle), settings);

        Self {
            coordinator: TurnCoordinator::new(Arc::new(engine), queue),
            store,
            worker,
        }
    }
}

/// Sink that keeps every effect for inspection.
#[derive(Default)]
struct RecordingSink {
    effects: Mutex<Vec<SideEffect>>,
}

impl RecordingSink {
    fn upserts(&self) -> usize {
        self.effects
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SideEffect::UpsertCustomer { .. }))
            .count()
    }

    fn events_named(&self, name: &str) -> usize {
        self.effects
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SideEffect::RecordEvent(event) if event.name == name))
            .count()
    }
}

impl SideEffectSink for RecordingSink {
    fn submit(&self, effect: SideEffect) -> Result<(), PersistenceError> {
        self.effects.lock().unwrap().push(effect);
        Ok(())
    }
}

/// Answers the first `prompt_turns` calls from its script, then stalls.
struct StallingOracle {
    script: ScriptedOracle,
    prompt_turns: usize,
    calls: AtomicUsize,
}

impl StallingOracle {
    fn new(script: ScriptedOracle, prompt_turns: usize) -> Self {
        Self {
            script,
            prompt_turns,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReasoningOracle for StallingOracle {
    async fn analyze(&self, request: OracleRequest) -> Result<InputAnalysis, OracleError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.prompt_turns {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.script.analyze(request).await
    }
}

struct FailingHandler;

#[async_trait]
impl NodeHandler for FailingHandler {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self, _input: HandlerInput<'_>) -> Result<HandlerReply, HandlerError> {
        Err(HandlerError::failed("calendar service rejected the booking"))
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn name_turn_moves_to_email_collection() {
    let oracle = ScriptedOracle::new().with_analysis(analysis(
        catalogue::COLLECT_EMAIL,
        &[("name", "Alex")],
        "Nice to meet you, Alex! What's your email?",
    ));
    let harness = Harness::new(oracle, EngineSettings::default());
    let greeting = harness.coordinator.connect().await;

    let reply = harness
        .coordinator
        .handle_message(greeting.connection_id, "My name is Alex")
        .await
        .unwrap();

    let session = harness.coordinator.session(greeting.connection_id).await.unwrap();
    assert_eq!(reply.reply_text, "Nice to meet you, Alex! What's your email?");
    assert_eq!(session.current_node_id, catalogue::COLLECT_EMAIL);
    assert_eq!(session.context.text("name"), Some("Alex"));
    assert_eq!(
        session.transcript(),
        vec![
            "User: My name is Alex".to_string(),
            "AI: Nice to meet you, Alex! What's your email?".to_string(),
        ]
    );
}

#[tokio::test]
async fn full_journey_books_a_demo_and_persists_the_lead() {
    let oracle = ScriptedOracle::new()
        .with_analysis(analysis(
            catalogue::COLLECT_EMAIL,
            &[("name", "Alex")],
            "Nice to meet you, Alex! What's your email?",
        ))
        .with_analysis(analysis(
            catalogue::PRODUCT_SELECTION,
            &[("email", "alex@example.com")],
            "Thanks! Which product interests you?",
        ))
        .with_analysis(analysis(
            catalogue::SCHEDULE_DEMO,
            &[("productChoice", "Pro")],
            "Let me book that.",
        ));
    let harness = Harness::new(oracle, EngineSettings::default());
    let greeting = harness.coordinator.connect().await;
    let id = greeting.connection_id;

    harness.coordinator.handle_message(id, "My name is Alex").await.unwrap();
    harness.coordinator.handle_message(id, "alex@example.com").await.unwrap();
    let booked = harness.coordinator.handle_message(id, "The Pro plan").await.unwrap();

    assert_eq!(booked.node_id, catalogue::SCHEDULE_DEMO);
    assert!(booked.reply_text.starts_with("You're all set, Alex!"));

    let session_id = greeting.session_id;
    let stats = harness.worker.shutdown().await;
    assert_eq!(stats.failed, 0);

    let events = harness.store.events_named(DEMO_REQUESTED_EVENT).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].session_id, session_id);
    assert_eq!(events[0].data["email"], "alex@example.com");

    let customer = harness.store.customer(session_id).await.unwrap();
    assert_eq!(customer.name, "Alex");
    assert_eq!(customer.product_choice.as_deref(), Some("Pro"));

    let turns = harness.store.turns_for(session_id).await;
    assert_eq!(turns.len(), 7);
    assert_eq!(turns[0].role, TurnRole::Assistant);
    assert_eq!(turns[0].text, greeting.reply_text);
    assert_eq!(turns[6].text, booked.reply_text);
}

#[tokio::test]
async fn oracle_timeout_apologises_and_takes_first_successor() {
    let oracle = ScriptedOracle::new()
        .with_analysis(analysis(catalogue::PRODUCT_QUESTION, &[], "too late"))
        .with_delay(Duration::from_millis(300));
    let settings = EngineSettings::default().with_oracle_timeout(Duration::from_millis(50));
    let harness = Harness::new(oracle, settings);
    let greeting = harness.coordinator.connect().await;

    let reply = harness
        .coordinator
        .handle_message(greeting.connection_id, "My name is Alex")
        .await
        .unwrap();

    assert!(reply.degraded);
    assert_eq!(reply.reply_text, DEFAULT_APOLOGY);
    assert_eq!(reply.node_id, catalogue::COLLECT_NAME);
    let session = harness.coordinator.session(greeting.connection_id).await.unwrap();
    assert_eq!(session.context.text("name"), Some("Alex"));
}

#[tokio::test]
async fn timeout_landing_on_demo_node_apologises_without_booking() {
    let sink = Arc::new(RecordingSink::default());
    let graph = catalogue::sales_flow(ScheduleDemoHandler::binding(sink.clone())).unwrap();
    let script = ScriptedOracle::new()
        .with_analysis(analysis(catalogue::COLLECT_EMAIL, &[("name", "Alex")], "Email?"))
        .with_analysis(analysis(
            catalogue::PRODUCT_SELECTION,
            &[("email", "alex@example.com")],
            "Which product?",
        ));
    let settings = EngineSettings::default().with_oracle_timeout(Duration::from_millis(50));
    let engine = TransitionEngine::new(
        Arc::new(graph),
        Arc::new(StallingOracle::new(script, 2)),
        settings,
    );
    let coordinator = TurnCoordinator::new(Arc::new(engine), sink.clone());
    let id = coordinator.connect().await.connection_id;

    coordinator.handle_message(id, "I'm Alex").await.unwrap();
    coordinator.handle_message(id, "alex@example.com").await.unwrap();
    let upserts_before = sink.upserts();

    let reply = coordinator.handle_message(id, "Pro please").await.unwrap();

    assert!(reply.degraded);
    assert_eq!(reply.reply_text, DEFAULT_APOLOGY);
    assert_eq!(reply.node_id, catalogue::SCHEDULE_DEMO);
    assert_eq!(sink.events_named(DEMO_REQUESTED_EVENT), 0);
    assert_eq!(sink.upserts(), upserts_before);

    let session = coordinator.session(id).await.unwrap();
    assert_eq!(session.context.text("name"), Some("Alex"));
    assert_eq!(session.context.text("email"), Some("alex@example.com"));
}

#[tokio::test]
async fn unknown_oracle_node_falls_back() {
    let oracle = ScriptedOracle::new().with_analysis(analysis("pricing_page", &[], "Prices!"));
    let harness = Harness::new(oracle, EngineSettings::default());
    let greeting = harness.coordinator.connect().await;

    let reply = harness
        .coordinator
        .handle_message(greeting.connection_id, "how much is it?")
        .await
        .unwrap();

    assert!(reply.degraded);
    assert_eq!(reply.node_id, catalogue::COLLECT_NAME);
    assert_ne!(reply.node_id, "pricing_page");
}

#[tokio::test]
async fn handler_failure_still_commits_the_transition() {
    let graph = catalogue::sales_flow(HandlerBinding::replacing(Arc::new(FailingHandler))).unwrap();
    let oracle = ScriptedOracle::new().with_analysis(analysis(
        catalogue::SCHEDULE_DEMO,
        &[("productChoice", "Pro")],
        "Booking now.",
    ));
    let engine = TransitionEngine::new(Arc::new(graph), Arc::new(oracle), EngineSettings::default());

    let session = Session::start(NodeId::from(catalogue::WELCOME)).advanced(
        NodeId::from(catalogue::PRODUCT_SELECTION),
        inputs(&[("name", "Alex"), ("email", "alex@example.com")]),
        Vec::new(),
    );

    let outcome = engine.handle_turn(&session, "Pro please").await.unwrap();

    assert_eq!(outcome.reply_text, DEFAULT_APOLOGY);
    assert!(outcome.handler_failure.is_some());
    assert_eq!(outcome.session.current_node_id, catalogue::SCHEDULE_DEMO);
    assert_eq!(outcome.session.context.text("productChoice"), Some("Pro"));
    assert_eq!(session.current_node_id, catalogue::PRODUCT_SELECTION);
}

#[tokio::test]
async fn customer_upsert_fires_once_on_completing_turn() {
    let sink = Arc::new(RecordingSink::default());
    let graph = catalogue::sales_flow(ScheduleDemoHandler::binding(sink.clone())).unwrap();
    let oracle = ScriptedOracle::new()
        .with_analysis(analysis(catalogue::COLLECT_EMAIL, &[("name", "Alex")], "Email?"))
        .with_analysis(analysis(
            catalogue::PRODUCT_SELECTION,
            &[("email", "alex@example.com")],
            "Which product?",
        ))
        .with_analysis(analysis(catalogue::SCHEDULE_DEMO, &[("productChoice", "Pro")], ""))
        .with_analysis(analysis(catalogue::SCHEDULE_DEMO, &[], ""));
    let engine = TransitionEngine::new(Arc::new(graph), Arc::new(oracle), EngineSettings::default());
    let coordinator = TurnCoordinator::new(Arc::new(engine), sink.clone());
    let id = coordinator.connect().await.connection_id;

    let mut upserts_per_turn = Vec::new();
    for text in ["I'm Alex", "alex@example.com", "Pro", "yes, book it"] {
        let before = sink.upserts();
        coordinator.handle_message(id, text).await.unwrap();
        upserts_per_turn.push(sink.upserts() - before);
    }

    // Contact details complete on turn two; the demo node also needs the
    // product, which completes on turn three. Repeating adds nothing.
    assert_eq!(upserts_per_turn, vec![0, 1, 1, 0]);
    assert_eq!(sink.events_named(DEMO_REQUESTED_EVENT), 2);
}

#[tokio::test]
async fn persistence_failure_never_reaches_the_user() {
    let oracle = ScriptedOracle::new().with_analysis(analysis(
        catalogue::COLLECT_EMAIL,
        &[("name", "Alex")],
        "Nice to meet you, Alex! What's your email?",
    ));
    let harness = Harness::new(oracle, EngineSettings::default());
    harness.store.set_failing(true);
    let greeting = harness.coordinator.connect().await;

    let reply = harness
        .coordinator
        .handle_message(greeting.connection_id, "My name is Alex")
        .await
        .unwrap();

    assert_eq!(reply.node_id, catalogue::COLLECT_EMAIL);
    let stats = harness.worker.shutdown().await;
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.failed, 3);
    assert!(harness.store.turns().await.is_empty());
}

#[tokio::test]
async fn welcome_is_identical_across_connections() {
    let harness = Harness::new(ScriptedOracle::new(), EngineSettings::default());

    let first = harness.coordinator.connect().await;
    let second = harness.coordinator.connect().await;

    assert_eq!(first.reply_text, second.reply_text);
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(harness.coordinator.active_sessions().await, 2);
}

#[tokio::test]
async fn concurrent_sessions_stay_independent() {
    let oracle = ScriptedOracle::new()
        .with_analysis(analysis(catalogue::COLLECT_EMAIL, &[("name", "Alex")], "Hi Alex"))
        .with_analysis(analysis(catalogue::COLLECT_EMAIL, &[("name", "Sam")], "Hi Sam"));
    let harness = Harness::new(oracle, EngineSettings::default());
    let a = harness.coordinator.connect().await.connection_id;
    let b = harness.coordinator.connect().await.connection_id;

    let (ra, rb) = tokio::join!(
        harness.coordinator.handle_message(a, "Alex"),
        harness.coordinator.handle_message(b, "Sam"),
    );
    ra.unwrap();
    rb.unwrap();

    let alex = harness.coordinator.session(a).await.unwrap();
    let sam = harness.coordinator.session(b).await.unwrap();
    let mut names = vec![
        alex.context.text("name").unwrap().to_string(),
        sam.context.text("name").unwrap().to_string(),
    ];
    names.sort();
    assert_eq!(names, vec!["Alex", "Sam"]);
    assert_ne!(alex.session_id, sam.session_id);
    assert_eq!(alex.conversation_history.len(), 2);
    assert_eq!(sam.conversation_history.len(), 2);
}
