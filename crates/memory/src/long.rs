//! Long-term memory: slow-changing facts about the user and their resources.
//!
//! Updated out of band by the surrounding application.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongMemory {
    /// Free-text user preference, exposed as the `Preference` parameter
    #[serde(default)]
    pub preference: String,

    /// Knowledge base uuids the user owns
    #[serde(default)]
    pub knowledge_collections: Vec<String>,

    /// API uuids the user has registered
    #[serde(default)]
    pub apis: Vec<String>,
}
