//! Turn orchestration
//!
//! A turn has three phases:
//!
//! 1. `prepare_*` appends the user-side message tentatively and builds the request.
//! 2. [`TurnController::execute`] calls the completion client. It touches no
//!    session state, so the dashboard runs it on a background task.
//! 3. [`TurnController::resolve`] commits the tentative message and appends the
//!    assistant reply, or aborts it and records an error notice.

use std::sync::Arc;

use crate::ai::CompletionClient;
use crate::error::CompletionFailure;
use crate::prompt::{
    self, AnalyzeHeatStatusOutput, AnswerQuestionOutput, CompletionRequest, Flow, ANALYZING_PLACEHOLDER,
};
use crate::state::{ChatMessage, ChatRole, Notice, Session, Tentative};

const ANALYZE_FAILED: &str = "Failed to get analysis from AI. Please try again.";
const ASK_FAILED: &str = "Failed to get response from AI. Please try again.";

/// A prepared turn waiting for its completion result.
#[derive(Debug)]
pub struct PendingTurn {
    flow: Flow,
    tentative: Tentative,
    request: CompletionRequest,
}

impl PendingTurn {
    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }
}

/// Decoded completion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnReply {
    Analysis(AnalyzeHeatStatusOutput),
    Answer(AnswerQuestionOutput),
}

impl TurnReply {
    fn flow(&self) -> Flow {
        match self {
            TurnReply::Analysis(_) => Flow::Analyze,
            TurnReply::Answer(_) => Flow::Ask,
        }
    }

    fn into_content(self) -> String {
        match self {
            TurnReply::Analysis(output) => prompt::format_analysis(&output),
            TurnReply::Answer(output) => output.answer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing was appended and no request was sent.
    Skipped,
    Committed,
    RolledBack,
}

pub struct TurnController {
    client: Arc<dyn CompletionClient>,
}

impl TurnController {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<dyn CompletionClient> {
        Arc::clone(&self.client)
    }

    pub fn set_client(&mut self, client: Arc<dyn CompletionClient>) {
        self.client = client;
    }

    /// Starts an analyze turn, or returns `None` while one is already pending.
    pub fn prepare_analyze(&self, session: &mut Session) -> Option<PendingTurn> {
        if session.analyze_pending {
            return None;
        }
        session.analyze_pending = true;

        let tentative = session
            .history_mut()
            .begin(ChatMessage::new(ChatRole::User, ANALYZING_PLACEHOLDER));
        let request = prompt::analyze_request(session.sensors());

        tracing::info!(engine = session.sensors().engine_temperature, "analyze turn started");
        Some(PendingTurn {
            flow: Flow::Analyze,
            tentative,
            request,
        })
    }

    /// Starts an ask turn. Blank questions and questions sent while another
    /// answer is pending return `None` and leave the session untouched.
    pub fn prepare_ask(&self, session: &mut Session, text: &str) -> Option<PendingTurn> {
        let question = text.trim();
        if question.is_empty() || session.ask_pending {
            return None;
        }
        session.ask_pending = true;

        let tentative = session
            .history_mut()
            .begin(ChatMessage::new(ChatRole::User, question));
        let request = prompt::ask_request(question, session.sensors(), session.history());

        tracing::info!(history_len = session.history().len(), "ask turn started");
        Some(PendingTurn {
            flow: Flow::Ask,
            tentative,
            request,
        })
    }

    /// Calls the client and decodes its output for the request's flow.
    pub async fn execute(
        client: &dyn CompletionClient,
        request: &CompletionRequest,
    ) -> Result<TurnReply, CompletionFailure> {
        let value = client.complete(request).await?;
        request.schema.validate(&value).map_err(CompletionFailure::new)?;

        let reply = match request.flow {
            Flow::Analyze => TurnReply::Analysis(serde_json::from_value(value)?),
            Flow::Ask => TurnReply::Answer(serde_json::from_value(value)?),
        };
        Ok(reply)
    }

    /// Commits or rolls back `pending`, then clears its pending flag.
    pub fn resolve(
        &self,
        session: &mut Session,
        pending: PendingTurn,
        result: Result<TurnReply, CompletionFailure>,
    ) -> TurnOutcome {
        let PendingTurn { flow, tentative, .. } = pending;

        let result = result.and_then(|reply| {
            if reply.flow() == flow {
                Ok(reply)
            } else {
                Err(CompletionFailure::new("reply does not match the pending turn"))
            }
        });

        let outcome = match result {
            Ok(reply) => {
                let history = session.history_mut();
                history.commit(tentative);
                history.push(ChatMessage::new(ChatRole::Assistant, reply.into_content()));
                tracing::info!(flow = flow.as_str(), "turn committed");
                TurnOutcome::Committed
            }
            Err(err) => {
                session.history_mut().abort(tentative);
                tracing::warn!(flow = flow.as_str(), error = %err, "turn rolled back");
                session.notify(Notice::error(match flow {
                    Flow::Analyze => ANALYZE_FAILED,
                    Flow::Ask => ASK_FAILED,
                }));
                TurnOutcome::RolledBack
            }
        };

        match flow {
            Flow::Analyze => session.analyze_pending = false,
            Flow::Ask => session.ask_pending = false,
        }
        outcome
    }

    /// Runs a whole analyze turn in place.
    pub async fn analyze(&self, session: &mut Session) -> TurnOutcome {
        let Some(pending) = self.prepare_analyze(session) else {
            return TurnOutcome::Skipped;
        };
        let result = Self::execute(self.client.as_ref(), pending.request()).await;
        self.resolve(session, pending, result)
    }

    /// Runs a whole ask turn in place.
    pub async fn ask(&self, session: &mut Session, text: &str) -> TurnOutcome {
        let Some(pending) = self.prepare_ask(session, text) else {
            return TurnOutcome::Skipped;
        };
        let result = Self::execute(self.client.as_ref(), pending.request()).await;
        self.resolve(session, pending, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SYSTEM_PROMPT;
    use crate::sensor::{CameraObservation, SensorReading, VentilationQuality};
    use crate::state::NoticeLevel;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Replies with a fixed value (or fails) and records every request.
    struct StubClient {
        reply: Option<Value>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StubClient {
        fn replying(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionFailure> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .ok_or_else(|| CompletionFailure::new("stub failure"))
        }

        fn model_id(&self) -> &str {
            "stub"
        }
    }

    fn analysis_reply() -> Value {
        json!({ "analysis": "Engine heat is conducted into the frame.", "suggestions": "Check coolant." })
    }

    #[tokio::test]
    async fn analyze_success_appends_placeholder_and_reply() {
        let stub = StubClient::replying(analysis_reply());
        let controller = TurnController::new(stub.clone());
        let mut session = Session::default();

        let outcome = controller.analyze(&mut session).await;

        assert_eq!(outcome, TurnOutcome::Committed);
        let messages = session.history().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, ANALYZING_PLACEHOLDER);
        assert_eq!(messages[2].role, ChatRole::Assistant);
        assert!(messages[2].content.contains("**Analysis:** Engine heat is conducted into the frame."));
        assert!(messages[2].content.contains("**Suggestions:** Check coolant."));
        assert!(!session.is_analyze_pending());
        assert!(session.notices().is_empty());
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn analyze_request_carries_sensor_fields() {
        let stub = StubClient::replying(analysis_reply());
        let controller = TurnController::new(stub.clone());
        let mut session = Session::new(SensorReading {
            engine_temperature: 128.0,
            coolant_level: 15.0,
            ventilation_quality: VentilationQuality::Poor,
            camera_observations: CameraObservation::SteamNearEngine,
            ..SensorReading::default()
        });

        controller.analyze(&mut session).await;

        let calls = stub.calls();
        let input = &calls[0].input;
        assert_eq!(calls[0].flow, Flow::Analyze);
        assert_eq!(input["engineTemperature"], json!(128.0));
        assert_eq!(input["cabinTemperature"], json!(22.0));
        assert_eq!(input["coolantLevel"], json!(15.0));
        assert_eq!(input["ventilationQuality"], json!("Poor"));
        assert_eq!(input["cameraObservations"], json!("Steam near engine"));
    }

    #[tokio::test]
    async fn analyze_failure_rolls_back_and_notifies_once() {
        let controller = TurnController::new(StubClient::failing());
        let mut session = Session::default();
        let before = session.history().messages().to_vec();

        let outcome = controller.analyze(&mut session).await;

        assert_eq!(outcome, TurnOutcome::RolledBack);
        assert_eq!(session.history().messages(), before.as_slice());
        assert_eq!(session.notices().len(), 1);
        let notice = &session.notices()[0];
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "Error");
        assert_eq!(notice.description, ANALYZE_FAILED);
        assert!(!session.is_analyze_pending());
    }

    #[tokio::test]
    async fn analyze_reply_missing_suggestions_is_a_failure() {
        let controller = TurnController::new(StubClient::replying(json!({ "analysis": "hot" })));
        let mut session = Session::default();

        let outcome = controller.analyze(&mut session).await;

        assert_eq!(outcome, TurnOutcome::RolledBack);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn ask_default_scenario() {
        let stub = StubClient::replying(json!({ "answer": "Heat moves by convection..." }));
        let controller = TurnController::new(stub.clone());
        let mut session = Session::default();

        let outcome = controller.ask(&mut session, "Why is my bus overheating?").await;

        assert_eq!(outcome, TurnOutcome::Committed);
        assert_eq!(session.history().len(), 3);

        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        let input = &calls[0].input;
        assert_eq!(
            input["sensorData"],
            json!("Engine: 90°C, Cabin: 22°C, Coolant: 80%, Ventilation: Good, Outside: 20°C, Camera: No visible issues")
        );
        assert_eq!(input["question"], json!("Why is my bus overheating?"));
        assert_eq!(input["systemPrompt"], json!(SYSTEM_PROMPT));

        let transcript = input["conversationHistory"].as_str().unwrap();
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("assistant: Welcome to the **BusGuardian AI**"));
        assert_eq!(lines[1], "user: Why is my bus overheating?");

        let reply = session.history().last().unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.content, "Heat moves by convection...");
    }

    #[tokio::test]
    async fn ask_failure_drops_the_question() {
        let controller = TurnController::new(StubClient::failing());
        let mut session = Session::default();

        let outcome = controller.ask(&mut session, "Is 120°C too hot?").await;

        assert_eq!(outcome, TurnOutcome::RolledBack);
        assert_eq!(session.history().len(), 1);
        assert!(session
            .history()
            .messages()
            .iter()
            .all(|m| m.content != "Is 120°C too hot?"));
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].description, ASK_FAILED);
        assert!(!session.is_ask_pending());
    }

    #[tokio::test]
    async fn blank_questions_are_ignored() {
        let stub = StubClient::replying(json!({ "answer": "unused" }));
        let controller = TurnController::new(stub.clone());
        let mut session = Session::default();
        let before = session.history().messages().to_vec();

        for text in ["", "   ", "\n\t "] {
            assert_eq!(controller.ask(&mut session, text).await, TurnOutcome::Skipped);
        }

        assert_eq!(session.history().messages(), before.as_slice());
        assert!(stub.calls().is_empty());
        assert!(session.notices().is_empty());
    }

    #[tokio::test]
    async fn transcript_includes_every_prior_message() {
        let stub = StubClient::replying(json!({ "answer": "Radiation from the road." }));
        let controller = TurnController::new(stub.clone());
        let mut session = Session::default();

        controller.ask(&mut session, "First question").await;
        controller.ask(&mut session, "Second question").await;

        let calls = stub.calls();
        let transcript = calls[1].input["conversationHistory"].as_str().unwrap().to_string();
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "user: First question");
        assert_eq!(lines[2], "assistant: Radiation from the road.");
        assert_eq!(lines[3], "user: Second question");
    }

    #[test]
    fn pending_flags_block_overlapping_turns() {
        let controller = TurnController::new(StubClient::failing());
        let mut session = Session::default();

        let ask = controller.prepare_ask(&mut session, "hello").unwrap();
        assert!(session.is_ask_pending());
        assert!(controller.prepare_ask(&mut session, "again").is_none());

        let analyze = controller.prepare_analyze(&mut session).unwrap();
        assert!(controller.prepare_analyze(&mut session).is_none());
        assert_eq!(session.history().len(), 3);

        // Analyze fails first; only its placeholder disappears.
        controller.resolve(&mut session, analyze, Err(CompletionFailure::new("boom")));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().last().unwrap().content, "hello");

        let answer = TurnReply::Answer(AnswerQuestionOutput { answer: "hi".into() });
        assert_eq!(controller.resolve(&mut session, ask, Ok(answer)), TurnOutcome::Committed);
        assert_eq!(session.history().len(), 3);
        assert!(!session.is_ask_pending());
        assert!(!session.is_analyze_pending());
    }

    #[test]
    fn mismatched_reply_rolls_back() {
        let controller = TurnController::new(StubClient::failing());
        let mut session = Session::default();

        let pending = controller.prepare_ask(&mut session, "hello").unwrap();
        let wrong = TurnReply::Analysis(AnalyzeHeatStatusOutput {
            analysis: "a".into(),
            suggestions: "b".into(),
        });

        assert_eq!(controller.resolve(&mut session, pending, Ok(wrong)), TurnOutcome::RolledBack);
        assert_eq!(session.history().len(), 1);
    }
}
