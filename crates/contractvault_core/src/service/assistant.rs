//! Help assistant chat exchange.
//!
//! # Responsibility
//! - Validate one chat request and trim its history window.
//! - Answer through a pluggable [`Responder`], falling back to the
//!   built-in keyword responder.
//!
//! # Invariants
//! - A reply is always produced; failures are expressed as
//!   `success = false` with a user-facing message.
//! - At most [`HISTORY_WINDOW`] prior turns reach the responder.

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Prior turns forwarded to the responder.
pub const HISTORY_WINDOW: usize = 6;

const EMPTY_MESSAGE_REPLY: &str = "Please enter a message.";
const INVALID_REQUEST_REPLY: &str = "Invalid request format.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Response envelope returned to the caller as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
}

impl ChatReply {
    fn ok(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: response.into(),
        }
    }

    fn failed(response: impl Into<String>) -> Self {
        Self {
            success: false,
            response: response.into(),
        }
    }
}

/// Source of assistant answers. `None` means "no answer", which routes the
/// message to the keyword fallback.
pub trait Responder {
    fn respond(&self, message: &str, history: &[ChatTurn]) -> Option<String>;
}

/// Deterministic keyword matcher used when no other responder answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordResponder;

impl Responder for KeywordResponder {
    fn respond(&self, message: &str, _history: &[ChatTurn]) -> Option<String> {
        Some(fallback_response(message).to_string())
    }
}

/// Runs one exchange against `responder`.
pub fn chat(responder: &dyn Responder, request: &ChatRequest) -> ChatReply {
    let message = request.message.trim();
    if message.is_empty() {
        return ChatReply::failed(EMPTY_MESSAGE_REPLY);
    }

    let start = request.history.len().saturating_sub(HISTORY_WINDOW);
    let history = &request.history[start..];
    let reply = match responder.respond(message, history) {
        Some(answer) => ChatReply::ok(answer),
        None => ChatReply::ok(fallback_response(message)),
    };
    info!(
        "event=assistant_chat module=assistant status=ok history_turns={}",
        history.len()
    );
    reply
}

/// Parses a JSON request body and runs the exchange.
pub fn chat_json(responder: &dyn Responder, body: &str) -> ChatReply {
    match serde_json::from_str::<ChatRequest>(body) {
        Ok(request) => chat(responder, &request),
        Err(err) => {
            warn!(
                "event=assistant_chat module=assistant status=error error_kind=invalid_json line={}",
                err.line()
            );
            ChatReply::failed(INVALID_REQUEST_REPLY)
        }
    }
}

/// Keyword answers for navigation, statuses, approvals and contract
/// creation, with a help menu as default.
pub fn fallback_response(message: &str) -> &'static str {
    let text = message.to_lowercase();
    let has = |word: &str| text.contains(word);

    if ["where", "find", "navigate", "go to", "how to get"]
        .iter()
        .any(|word| has(word))
    {
        if has("contract") && (has("create") || has("new")) {
            return "To create a new contract, run `contract create` or start the creation wizard from the dashboard.";
        }
        if has("approval") {
            return "Approval requests assigned to you or raised by you are listed by `approval list`.";
        }
        if has("setting") || has("config") {
            return "Contract types, tags, departments and the clause playbook are managed with `config` (legal admins only).";
        }
    }

    if has("status") {
        return "Contract statuses are:\n\
                - Draft: being created or edited\n\
                - Pending: awaiting approval\n\
                - Active: currently in effect\n\
                - Expired: past its end date\n\
                - Terminated: ended early\n\
                - Archived: kept for records";
    }

    if has("approval") || has("approve") {
        return "To manage approvals:\n\
                1. Open the contract\n\
                2. Request an approval and pick an approver\n\
                3. Add a reason and optional due date\n\
                4. The approver decides from their approval list";
    }

    if has("create") && has("contract") {
        return "To create a contract:\n\
                1. Choose the upload or template method\n\
                2. Fill in the wizard steps\n\
                3. Save as draft or submit for approval";
    }

    "I can help you with:\n\
     - Creating contracts: \"How do I create a contract?\"\n\
     - Navigation: \"Where can I find approvals?\"\n\
     - Statuses: \"What are the contract statuses?\"\n\
     - Approvals: \"How do approvals work?\""
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingResponder {
        seen_history: Cell<usize>,
    }

    impl Responder for CountingResponder {
        fn respond(&self, _message: &str, history: &[ChatTurn]) -> Option<String> {
            self.seen_history.set(history.len());
            None
        }
    }

    fn turn(index: usize) -> ChatTurn {
        ChatTurn {
            role: "user".to_string(),
            content: format!("message {index}"),
        }
    }

    #[test]
    fn blank_message_is_rejected() {
        let reply = chat(&KeywordResponder, &ChatRequest::default());
        assert!(!reply.success);
        assert_eq!(reply.response, "Please enter a message.");
    }

    #[test]
    fn history_is_trimmed_and_fallback_answers() {
        let responder = CountingResponder {
            seen_history: Cell::new(0),
        };
        let request = ChatRequest {
            message: "  what statuses exist? ".to_string(),
            history: (0..10).map(turn).collect(),
        };
        let reply = chat(&responder, &request);
        assert_eq!(responder.seen_history.get(), HISTORY_WINDOW);
        assert!(reply.success);
        assert!(reply.response.starts_with("Contract statuses are:"));
    }

    #[test]
    fn keyword_routing() {
        assert!(fallback_response("Where do I find approvals?").contains("approval list"));
        assert!(fallback_response("how to create a contract").starts_with("To create a contract"));
        assert!(fallback_response("hello").starts_with("I can help you with"));
    }

    #[test]
    fn malformed_json_gets_failure_envelope() {
        let reply = chat_json(&KeywordResponder, "{not json");
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"success": false, "response": "Invalid request format."})
        );
    }
}
