use crate::api::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only sequence of turns shared across tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub agent_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_grows_monotonically() {
        let mut conversation = Conversation::new("agent-1");
        conversation.append([Message::user("hi"), Message::assistant("hello")]);
        conversation.append([Message::user("again"), Message::assistant("sure")]);

        assert_eq!(conversation.messages.len(), 4);
        assert_eq!(conversation.messages[0].content, "hi");
        assert_eq!(conversation.messages[3].content, "sure");
        assert!(conversation.updated_at >= conversation.created_at);
    }
}
