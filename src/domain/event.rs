//! Topics and published events.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use super::foundation::{EventId, Timestamp, ValidationError};

/// Name of a bus channel. Many subscriptions may listen on one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Creates a topic, rejecting empty names.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::empty_field("topic"));
        }
        Ok(Self(name))
    }

    /// Returns the topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque payload published to a topic.
///
/// Events are shared as `Arc<Event>` between listeners and never mutated
/// after construction; fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    topic: Topic,
    payload: JsonValue,
    published_at: Timestamp,
}

impl Event {
    /// Stamps a new event for `topic`.
    pub fn new(topic: Topic, payload: JsonValue) -> Self {
        Self {
            id: EventId::new(),
            topic,
            payload,
            published_at: Timestamp::now(),
        }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn published_at(&self) -> Timestamp {
        self.published_at
    }

    /// Looks up a top-level field of an object payload.
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.payload.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_rejects_empty_name() {
        assert!(Topic::new("").is_err());
        assert_eq!(Topic::new("newCommentsChannel").unwrap().as_str(), "newCommentsChannel");
    }

    #[test]
    fn event_field_reads_object_payload() {
        let event = Event::new(
            Topic::new("newCommentsChannel").unwrap(),
            json!({"id": 123, "repoFullName": "apollostack/GitHunt-API"}),
        );
        assert_eq!(event.field("id"), Some(&json!(123)));
        assert_eq!(event.field("missing"), None);
        assert_eq!(event.topic().as_str(), "newCommentsChannel");
    }

    #[test]
    fn event_survives_json_round_trip() {
        let event = Event::new(Topic::new("t").unwrap(), json!({"a": 1}));
        let text = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(event, back);
    }
}
