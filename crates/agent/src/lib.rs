//! Chain binding and execution for splforge.
//!
//! A compiled [`ChainDescriptor`](splforge_compiler::ChainDescriptor) goes
//! through three stages here:
//!
//! 1. **Bind**: the [`ChainInitializer`] resolves every link id against the
//!    API and knowledge-base catalogs and produces a [`BoundChain`]
//! 2. **Execute**: the [`ChainExecutor`] runs its units in order on a spawned
//!    task and streams [`ChainStreamEvent`]s as output arrives
//! 3. **Format**: the [`ResponseFormatter`] wraps each event in the envelope
//!    clients render
//!
//! Multi-tool model statements run a tool-calling loop against the API
//! catalog until the model stops asking for tools.

pub mod chain;
pub mod executor;
pub mod initializer;
pub mod response;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chain::{BoundChain, BoundStatement, BoundUnit, ModelCall, StatementAction};
pub use executor::{
    ChainExecutor, Collaborators, ExecutorSettings, Invocation, InvocationInput, InvocationReport,
};
pub use initializer::{build_view, ChainInitializer};
pub use response::{generate_suggestions, parse_suggestions, ResponseEnvelope, ResponseFormatter};
pub use stream_event::{ChainStreamEvent, Payload, UnitEvent, UnitStatus};
