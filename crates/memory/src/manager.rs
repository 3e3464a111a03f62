//! FIFO memory manager.
//!
//! The history never holds more than `cap` entries after any mutation. Old
//! entries are dropped, never summarized.

use std::collections::BTreeMap;

use crate::long::LongMemory;
use crate::short::ShortMemory;

pub const DEFAULT_MEMORY_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryState {
    Normal,
    /// History length has reached the cap
    Overloading,
}

#[derive(Debug, Clone)]
pub struct MemoryManager {
    short: ShortMemory,
    long: LongMemory,
    cap: usize,
}

impl MemoryManager {
    /// Take ownership of the caller's memory. A cap of zero is raised to one.
    pub fn new(short: ShortMemory, long: LongMemory, cap: usize) -> Self {
        let mut manager = Self {
            short,
            long,
            cap: cap.max(1),
        };
        manager.clear_short_memory();
        manager
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn short(&self) -> &ShortMemory {
        &self.short
    }

    pub fn long(&self) -> &LongMemory {
        &self.long
    }

    pub fn check_memory_state(&self) -> MemoryState {
        if self.short.len() >= self.cap {
            MemoryState::Overloading
        } else {
            MemoryState::Normal
        }
    }

    /// Append records, replace the parameter snapshot, then evict down to the cap.
    pub fn update_short_memory(
        &mut self,
        records: impl IntoIterator<Item = String>,
        parameters: BTreeMap<String, String>,
    ) {
        self.short.chat_history.extend(records);
        self.short.parameters = parameters;
        self.clear_short_memory();
    }

    /// Drop the oldest entries until at most `cap` remain.
    pub fn clear_short_memory(&mut self) {
        let excess = self.short.len().saturating_sub(self.cap);
        if excess > 0 {
            self.short.chat_history.drain(..excess);
            tracing::debug!(evicted = excess, cap = self.cap, "Short memory evicted");
        }
    }

    /// Hand the (mutated) memory back to the caller.
    pub fn into_parts(self) -> (ShortMemory, LongMemory) {
        (self.short, self.long)
    }
}
