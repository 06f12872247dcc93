//! The tool-calling agent
//!
//! Connects to a bridge server over the MCP tool protocol, translates the
//! advertised tool schemas into Gemini function declarations, and runs the
//! iterative model-call/tool-dispatch loop until the model produces a final
//! text answer.

mod chat;
mod model;
mod orchestrator;
mod session;

pub use chat::run_chat;
pub use model::{
    FunctionCall, FunctionDeclaration, FunctionResponse, GeminiModel, ModelContent, ModelPart,
    SchemaKind, translate_tools,
};
pub use orchestrator::Orchestrator;
pub use session::McpSession;
