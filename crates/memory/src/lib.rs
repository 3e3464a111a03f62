//! Conversational memory for splforge.
//!
//! - [`ShortMemory`]: a bounded chat history plus the last parameter snapshot,
//!   mutated only at unit boundaries.
//! - [`LongMemory`]: preference and resource lists, read-only during a run.
//! - [`MemoryManager`]: the FIFO policy that keeps the history within its cap.
//!
//! The engine never persists memory itself. Callers hand it in at invocation
//! start and store what comes back; [`MemorySnapshot`] is the file format the
//! CLI uses for that.

pub mod long;
pub mod manager;
pub mod short;
pub mod snapshot;
pub mod vector;

pub use long::LongMemory;
pub use manager::{MemoryManager, MemoryState, DEFAULT_MEMORY_CAP};
pub use short::ShortMemory;
pub use snapshot::{MemorySnapshot, SnapshotError};
pub use vector::{cosine_similarity, top_k_by_similarity};
