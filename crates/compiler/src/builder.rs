//! Unit builder: turns a function definition into a unit descriptor.
//!
//! Every reference token in the definition becomes one API or data statement.
//! Model definitions additionally get exactly one model statement, placed
//! last, whose system prompt is the serialized non-reference text with each
//! reference replaced by its output placeholder.

use splforge_core::parameter::placeholder;

use crate::decomposer::FuncDef;
use crate::ir::{StatementDescriptor, StatementKind, UnitDescriptor};
use crate::lexer::{self, RefKind};

fn push_section(out: &mut String, heading: &str, lines: &[String], bullet: bool) {
    if lines.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push('\n');
    for line in lines {
        if bullet {
            out.push_str("- ");
        }
        out.push_str(line);
        out.push('\n');
    }
}

/// Serialize the raw (pre-rewrite) prompt text of a model definition.
fn raw_prompt(func: &FuncDef) -> String {
    let mut out = String::new();
    for block in &func.context {
        out.push_str(&format!("# {}\n", block.section));
        for (sub_type, lines) in &block.entries {
            push_section(&mut out, &format!("## {sub_type}"), lines, false);
        }
        out.push('\n');
    }

    if func.description.is_empty() {
        out.push_str("# Instruction\n");
    } else {
        out.push_str(&format!("# Instruction: {}\n", func.description));
    }
    push_section(&mut out, "## Commands", &func.commands, true);
    push_section(&mut out, "## Rules", &func.rules, true);
    push_section(&mut out, "## Format", &func.format, false);
    push_section(&mut out, "## Example", &func.examples, false);
    out
}

/// The system prompt of a model definition.
pub fn system_prompt(func: &FuncDef) -> String {
    let text = lexer::rewrite_global_params(&raw_prompt(func));
    lexer::replace_refs_with_outputs(&text).trim_end().to_string()
}

/// Build the unit descriptor for one function definition.
pub fn build_unit(func: &FuncDef) -> UnitDescriptor {
    let scanned = if func.kind.is_model() {
        raw_prompt(func)
    } else {
        func.commands.join("\n")
    };

    let tokens = lexer::ref_tokens(&scanned);
    let last_token = tokens.len().saturating_sub(1);
    let mut statements: Vec<StatementDescriptor> = tokens
        .into_iter()
        .enumerate()
        .map(|(i, token)| {
            let kind = match token.kind {
                RefKind::Api => StatementKind::Api,
                RefKind::Data => StatementKind::Data,
            };
            // In a ref unit the last token also feeds the unit's wired output.
            let wired = !func.kind.is_model() && i == last_token;
            let (output, aliases) = match (token.output.is_empty(), func.kind.is_model()) {
                (true, true) => (format!("{}_Output", token.link_id), Vec::new()),
                (true, false) => (func.output.clone(), Vec::new()),
                (false, _) if wired && token.output != func.output => {
                    (token.output, vec![func.output.clone()])
                }
                (false, _) => (token.output, Vec::new()),
            };
            StatementDescriptor {
                name: format!("{}:{}", kind, token.link_id),
                description: format!("{kind} reference to {}", token.link_id),
                kind,
                link_id: Some(token.link_id),
                input: token.input,
                output,
                aliases,
                system_prompt: None,
            }
        })
        .collect();

    if func.kind.is_model() {
        statements.push(StatementDescriptor {
            name: func.kind.as_str().to_string(),
            description: if func.description.is_empty() {
                func.commands.join("; ")
            } else {
                func.description.clone()
            },
            kind: func.kind,
            link_id: None,
            input: serde_json::Value::String(placeholder(&func.input)),
            output: func.output.clone(),
            aliases: Vec::new(),
            system_prompt: Some(system_prompt(func)),
        });
    }

    tracing::debug!(
        unit = %func.name,
        kind = %func.kind,
        statements = statements.len(),
        "Built unit"
    );

    UnitDescriptor {
        name: func.name.clone(),
        kind: func.kind,
        input: placeholder(&func.input),
        functions: statements
            .into_iter()
            .enumerate()
            .map(|(i, s)| (format!("statement_{i}"), s))
            .collect(),
    }
}
