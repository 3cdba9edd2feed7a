use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// A Topics API topic, identified within a specific taxonomy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalTopic {
    pub topic_id: i32,
    pub taxonomy_version: i64,
}

impl CanonicalTopic {
    pub fn new(topic_id: i32, taxonomy_version: i64) -> Self {
        Self {
            topic_id,
            taxonomy_version,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "topic_id": self.topic_id,
            "taxonomy_version": self.taxonomy_version,
        })
    }

    /// Decode a stored topic. Missing or ill-typed fields and non-positive
    /// topic ids yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let topic = serde_json::from_value::<CanonicalTopic>(value.clone()).ok()?;
        (topic.topic_id > 0).then_some(topic)
    }
}

impl fmt::Display for CanonicalTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.topic_id, self.taxonomy_version)
    }
}
