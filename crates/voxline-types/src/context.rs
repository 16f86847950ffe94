//! Conversation history turns.

use serde::{Deserialize, Serialize};

/// One exchange with a caller: what they said and what the service replied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_text: String,
    pub reply_text: String,
}

impl ConversationTurn {
    pub fn new(user_text: impl Into<String>, reply_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            reply_text: reply_text.into(),
        }
    }
}
