//! Agent runtime: the assistant/tools conversation loop.
//!
//! One turn of one thread runs as a small state machine: the assistant state
//! sends the persisted history plus the tool catalog to the chat model; the
//! tools state executes whatever the model requested, in request order; the
//! loop finishes when the model answers without tool calls.
//!
//! The three collaborators are capability traits so the loop is unit-testable
//! with scripted fakes:
//!
//! - [`ChatModel`]: the completion service
//! - [`ToolExecutor`]: the dispatch surface exposing the tool catalog
//! - [`SessionStore`]: per-thread message persistence

pub mod llm;
pub mod messages;
pub mod runtime;
pub mod session;
pub mod tools;

pub use llm::{ChatModel, LlmError, OpenAiChatModel, ToolSchema};
pub use messages::{ChatMessage, Role, ToolCallRequest};
pub use runtime::{AgentRuntime, TurnState, DEFAULT_MAX_TURNS, SYSTEM_PROMPT};
pub use session::{InMemorySessionStore, SessionStore};
pub use tools::ToolExecutor;
