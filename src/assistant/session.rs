use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::client::ChatModel;
use super::dispatch::dispatch;
use super::history::ChatHistory;
use super::prompts::{CONNECTION_ERROR_REPLY, GREETING, SYSTEM_INSTRUCTION, TOOL_LIMIT_REPLY};
use super::tools::{tool_specs, ToolSpec};
use super::{AssistantError, ModelReply, ToolOutcome, Turn};
use crate::workshop::Workshop;

/// User exchanges kept in the transcript unless configured otherwise.
pub const DEFAULT_MAX_EXCHANGES: usize = 20;

/// What the surface should show after a message.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantReply {
    Text(String),
    /// The key is missing or was rejected; ask the user for a new one.
    NeedsApiKey,
}

/// One conversation with the assistant.
///
/// Tool calls requested by the model are executed against the workshop and
/// their results sent back, until the model answers with text or
/// `max_tool_rounds` is exhausted. Only the last `max_exchanges` user
/// exchanges are kept and sent back to the model.
pub struct ChatSession {
    model: Arc<dyn ChatModel>,
    workshop: Arc<Workshop>,
    tools: Vec<ToolSpec>,
    transcript: Vec<Turn>,
    max_tool_rounds: usize,
    max_exchanges: usize,
    history: Option<Arc<ChatHistory>>,
}

impl ChatSession {
    pub fn new(model: Arc<dyn ChatModel>, workshop: Arc<Workshop>, max_tool_rounds: usize) -> Self {
        Self {
            model,
            workshop,
            tools: tool_specs(),
            transcript: Vec::new(),
            max_tool_rounds,
            max_exchanges: DEFAULT_MAX_EXCHANGES,
            history: None,
        }
    }

    /// Persist every answered exchange to `history`.
    pub fn with_history(mut self, history: Arc<ChatHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Keep at most `max` exchanges (at least one).
    pub fn with_max_exchanges(mut self, max: usize) -> Self {
        self.max_exchanges = max.max(1);
        self
    }

    /// Swap the model, e.g. after the user entered a new API key.
    pub fn replace_model(&mut self, model: Arc<dyn ChatModel>) {
        self.model = model;
    }

    pub fn greeting(&self) -> &'static str {
        GREETING
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn reset(&mut self) {
        self.transcript.clear();
    }

    /// Send one user message and return what to show.
    ///
    /// Failures never end the session: a failed exchange is dropped from the
    /// transcript and the user gets a retry message (or a key prompt).
    /// Blank input is ignored and yields empty text.
    pub async fn send(&mut self, text: &str) -> AssistantReply {
        let text = text.trim();
        if text.is_empty() {
            return AssistantReply::Text(String::new());
        }

        let checkpoint = self.transcript.len();
        self.transcript.push(Turn::User(text.to_string()));

        match self.run_turn().await {
            Ok(reply) => {
                self.finish(text, reply.clone()).await;
                AssistantReply::Text(reply)
            }
            Err(AssistantError::ToolLoop(rounds)) => {
                warn!("Model still requesting tools after {} rounds", rounds);
                self.finish(text, TOOL_LIMIT_REPLY.to_string()).await;
                AssistantReply::Text(TOOL_LIMIT_REPLY.to_string())
            }
            Err(e) if e.needs_api_key() => {
                warn!("Assistant needs an API key: {}", e);
                self.transcript.truncate(checkpoint);
                AssistantReply::NeedsApiKey
            }
            Err(e) => {
                error!("Assistant turn failed: {}", e);
                self.transcript.truncate(checkpoint);
                AssistantReply::Text(CONNECTION_ERROR_REPLY.to_string())
            }
        }
    }

    async fn run_turn(&mut self) -> Result<String, AssistantError> {
        let mut rounds = 0;
        loop {
            let reply = self
                .model
                .complete(SYSTEM_INSTRUCTION, &self.transcript, &self.tools)
                .await?;

            let calls = match reply {
                ModelReply::Text(text) => return Ok(text),
                ModelReply::ToolCalls(calls) => calls,
            };
            if rounds >= self.max_tool_rounds {
                return Err(AssistantError::ToolLoop(rounds));
            }
            rounds += 1;

            let mut outcomes = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = dispatch(&self.workshop, call).await;
                outcomes.push(ToolOutcome {
                    call: call.clone(),
                    result,
                });
            }
            info!("Executed {} tool calls (round {})", outcomes.len(), rounds);
            self.transcript.push(Turn::ToolCalls(calls));
            self.transcript.push(Turn::ToolResults(outcomes));
        }
    }

    /// Drop the oldest exchanges so the transcript starts at a user turn
    /// and holds no more than `max_exchanges` of them.
    fn trim_transcript(&mut self) {
        let starts: Vec<usize> = self
            .transcript
            .iter()
            .enumerate()
            .filter(|(_, turn)| matches!(turn, Turn::User(_)))
            .map(|(i, _)| i)
            .collect();
        if starts.len() <= self.max_exchanges {
            return;
        }
        let cut = starts[starts.len() - self.max_exchanges];
        self.transcript.drain(..cut);
        debug!("Trimmed {} turns from the transcript", cut);
    }

    async fn finish(&mut self, user_text: &str, reply: String) {
        self.transcript.push(Turn::Model(reply.clone()));
        self.trim_transcript();

        let Some(history) = self.history.clone() else {
            return;
        };
        let user_text = user_text.to_string();
        let saved = tokio::task::spawn_blocking(move || {
            history.append("user", &user_text)?;
            history.append("model", &reply)
        })
        .await;
        match saved {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to persist chat exchange: {}", e),
            Err(e) => warn!("Chat history task failed: {}", e),
        }
    }
}
