use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "You"),
            Sender::Assistant => write!(f, "Jarvis"),
            Sender::System => write!(f, "System"),
        }
    }
}

/// One transcript entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(body: impl Into<String>) -> Self {
        Self::new(Sender::User, body)
    }

    pub fn assistant(body: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, body)
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self::new(Sender::System, body)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_sender() {
        assert_eq!(Message::user("hi").sender, Sender::User);
        assert_eq!(Message::assistant("hi").sender, Sender::Assistant);
        assert_eq!(Message::system("hi").sender, Sender::System);
    }

    #[test]
    fn test_display() {
        let message = Message::assistant("Hello there");
        assert_eq!(message.to_string(), "Jarvis: Hello there");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }
}
