//! Short-term memory: what the last few units produced.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortMemory {
    /// Oldest first
    #[serde(default)]
    pub chat_history: VecDeque<String>,

    /// Parameter values as of the last unit boundary
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ShortMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chat_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chat_history.is_empty()
    }

    /// The history as one newline-separated transcript.
    pub fn transcript(&self) -> String {
        self.chat_history
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
