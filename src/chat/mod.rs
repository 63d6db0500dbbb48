// src/chat/mod.rs
//
// The chat platform is an external collaborator: the core consumes it only
// through this trait. A thin Slack-flavored HTTP adapter lives in
// `slack.rs`; swapping gateways means implementing `ChatGateway`, nothing
// in `ingestion`/`onboarding`/`modules` changes.

pub mod slack;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// A single rendered block for posting (tables-as-code-blocks).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { text: String },
    CodeBlock { text: String },
    Divider,
}

#[derive(Debug, Clone)]
pub struct ConversationInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    pub parent_ts: Option<String>,
    pub reply_count: u32,
    pub attrs: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub messages: Vec<RawMessage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Event family consumed off the blocking event stream.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Message { channel: String, message: RawMessage },
    ReactionAdded { channel: String, ts: String, name: String },
    ReactionRemoved { channel: String, ts: String, name: String },
    MemberJoined { channel: String },
    MemberLeft { channel: String },
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn get_conversation_info(&self, channel: &str) -> CoreResult<ConversationInfo>;

    async fn get_conversation_history(
        &self,
        channel: &str,
        oldest_ts: &str,
        latest_ts: &str,
        cursor: Option<&str>,
    ) -> CoreResult<Page>;

    async fn get_conversation_replies(&self, channel: &str, parent_ts: &str, cursor: Option<&str>) -> CoreResult<Page>;

    async fn post_message(&self, channel: &str, blocks: &[Block]) -> CoreResult<String>;

    async fn post_thread_reply(&self, channel: &str, parent_ts: &str, blocks: &[Block]) -> CoreResult<String>;

    fn bot_user_id(&self) -> &str;

    /// Runs the blocking event stream, forwarding each envelope to `tx` and
    /// acknowledging it only after the send succeeds. Reconnection is the
    /// gateway's own concern; this call returns only on a fatal connection
    /// error or cancellation.
    async fn run_event_loop(&self, tx: tokio::sync::mpsc::Sender<GatewayEvent>) -> CoreResult<()>;
}
