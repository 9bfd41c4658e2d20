pub mod ai;
pub mod config;
pub mod controller;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod sensor;
pub mod state;

// Re-export main types for convenience
pub use ai::{ClaudeClient, CompletionClient, GeminiClient, LoggingClient, OllamaClient, OpenAIClient};
pub use config::Config;
pub use controller::{PendingTurn, TurnController, TurnOutcome, TurnReply};
pub use error::CompletionFailure;
pub use prompt::{CompletionRequest, Flow, OutputSchema};
pub use provider::Provider;
pub use sensor::{CameraObservation, SensorField, SensorReading, VentilationQuality};
pub use state::{ChatMessage, ChatRole, ConversationHistory, Notice, NoticeLevel, Session};
