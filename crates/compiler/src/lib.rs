//! # splforge Compiler
//!
//! Compiles an SPL prompt document into an unbound [`ChainDescriptor`].
//!
//! ```text
//! SplDocument ──► decomposer ──► FuncDef* ──► builder ──► UnitDescriptor*
//!        └──────► context builder ──► global params ──────┘
//! ```
//!
//! Compilation never fails on a malformed section. Problems become warnings
//! and a default is synthesized in place.

pub mod builder;
pub mod context;
pub mod decomposer;
pub mod document;
pub mod ir;
pub mod lexer;

pub use document::{Section, SplDocument, SubSection};
pub use ir::{ChainDescriptor, StatementDescriptor, StatementKind, UnitDescriptor};

use splforge_core::error::CompileError;

/// The compiled chain plus every warning raised along the way.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub chain: ChainDescriptor,
    pub warnings: Vec<CompileError>,
}

/// Compile a parsed document.
pub fn compile(doc: &SplDocument) -> CompileOutput {
    let decomposition = decomposer::decompose(doc);
    let chain = ChainDescriptor {
        global_params: context::build_global_params(doc),
        workflow: decomposition.funcs.iter().map(builder::build_unit).collect(),
    };
    tracing::debug!(
        units = chain.workflow.len(),
        global_params = chain.global_params.len(),
        warnings = decomposition.warnings.len(),
        "Compiled SPL document"
    );
    CompileOutput {
        chain,
        warnings: decomposition.warnings,
    }
}

/// Parse and compile a JSON document.
pub fn compile_str(json: &str) -> Result<CompileOutput, serde_json::Error> {
    Ok(compile(&SplDocument::from_json(json)?))
}
