//! The model-call/tool-dispatch loop
//!
//! Runs one conversational turn: the user text plus the advertised tools go
//! to the model; function calls are dispatched through the MCP session and
//! their results threaded back into the history until the model answers
//! with text only. Unrecoverable conditions terminate the loop with a
//! user-facing string; nothing escapes `run_turn` as an error.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use super::model::{
    FunctionCall, FunctionResponse, GeminiModel, ModelContent, ModelPart, translate_tools,
};
use super::session::McpSession;
use crate::protocol::Tool;

/// Loop state for one turn
enum TurnState {
    /// Waiting on a model completion
    AwaitingModel,
    /// A function call is being dispatched
    DispatchingTool(FunctionCall),
    /// The model answered with no further calls
    Done,
    /// Unrecoverable; carries the user-facing message
    Failed(String),
}

/// Conversational controller driving the model and the tool bridge
pub struct Orchestrator {
    model: GeminiModel,
    session: Arc<McpSession>,
    /// Cap on tool rounds per turn; `None` leaves the loop unbounded
    max_tool_rounds: Option<u32>,
}

impl Orchestrator {
    /// Create an orchestrator
    #[must_use]
    pub fn new(model: GeminiModel, session: Arc<McpSession>, max_tool_rounds: Option<u32>) -> Self {
        Self {
            model,
            session,
            max_tool_rounds,
        }
    }

    /// Run one turn to completion.
    ///
    /// The return value concatenates every text fragment the model emitted
    /// across the turn, in order; responses that only carried function calls
    /// contribute nothing. Termination relies on the model eventually
    /// returning a call-free response unless a round cap is configured.
    pub async fn run_turn(&self, user_text: &str, tools: &[Tool]) -> String {
        let declarations = match translate_tools(tools) {
            Ok(d) => d,
            Err(e) => return format!("Error preparing tool declarations: {e}"),
        };

        let mut contents = vec![ModelContent::user_text(user_text)];
        let mut collected: Vec<String> = Vec::new();
        let mut rounds: u32 = 0;
        let mut state = TurnState::AwaitingModel;

        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    match self.model.generate(&contents, &declarations).await {
                        Ok(content) => scan_response(content, &mut collected),
                        Err(e) => {
                            warn!(error = %e, "Model request failed");
                            TurnState::Failed(format!("Error querying the model: {e}"))
                        }
                    }
                }

                TurnState::DispatchingTool(call) => {
                    rounds += 1;
                    if self.max_tool_rounds.is_some_and(|cap| rounds > cap) {
                        TurnState::Failed(format!(
                            "Stopped after {} tool rounds without a final answer.",
                            rounds - 1
                        ))
                    } else {
                        self.dispatch(call, &mut contents).await
                    }
                }

                TurnState::Done => return collected.join("\n"),
                TurnState::Failed(message) => return message,
            };
        }
    }

    /// Invoke the requested tool and thread the result into the history
    async fn dispatch(&self, call: FunctionCall, contents: &mut Vec<ModelContent>) -> TurnState {
        info!(tool = %call.name, "Dispatching tool call");

        match self.session.call_tool(&call.name, call.args.clone()).await {
            Ok(result) => {
                let response_part = ModelPart::FunctionResponse {
                    function_response: FunctionResponse {
                        name: call.name.clone(),
                        response: json!({ "content": result.content }),
                    },
                };

                // The model's call becomes a model turn, the result a user turn
                contents.push(ModelContent::model_part(ModelPart::FunctionCall {
                    function_call: call,
                }));
                contents.push(ModelContent::user_part(response_part));

                TurnState::AwaitingModel
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                TurnState::Failed(format!("Error executing tool {}: {e}", call.name))
            }
        }
    }
}

/// Walk response parts in order: text accumulates, the first function call
/// wins the round. Parts after that call are not processed.
fn scan_response(content: ModelContent, collected: &mut Vec<String>) -> TurnState {
    for part in content.parts {
        match part {
            ModelPart::Text { text } => {
                if !text.is_empty() {
                    collected.push(text);
                }
            }
            ModelPart::FunctionCall { function_call } => {
                return TurnState::DispatchingTool(function_call);
            }
            // Only ever sent by us; ignore if echoed back
            ModelPart::FunctionResponse { .. } => {}
        }
    }

    TurnState::Done
}
