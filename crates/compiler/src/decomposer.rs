//! Prompt decomposer: groups SPL sections into per-unit function definitions.
//!
//! Contextual sections accumulate as the document is walked. Each Instruction
//! is split into segments: every command carrying an API or data reference is
//! its own segment, and each maximal run of plain commands forms one model
//! segment that sees all context emitted so far. Segments are chained through
//! parameters so segment k's output is segment k+1's input.

use splforge_core::error::CompileError;
use splforge_core::parameter::normalize_name;
use splforge_core::AgentKind;

use crate::document::{Section, SectionKind, SplDocument};
use crate::ir::StatementKind;
use crate::lexer::{self, RefKind};

/// Name every instruction reads when it declares no input.
pub const DEFAULT_INPUT: &str = "UserRequest";

/// A contextual section as it will appear in a model prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub section: String,
    /// `(subSectionType, lines)` in document order
    pub entries: Vec<(String, Vec<String>)>,
}

impl ContextBlock {
    fn from_section(section: &Section) -> Self {
        Self {
            section: section.section_type.clone(),
            entries: section
                .section
                .iter()
                .map(|sub| (sub.sub_section_type.clone(), sub.lines()))
                .collect(),
        }
    }
}

/// One function definition; becomes one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub description: String,
    pub kind: StatementKind,
    /// 1-based index of the Instruction this came from
    pub instruction: usize,
    /// Bare input parameter name
    pub input: String,
    /// Bare output parameter name. A reference unit that ends its Instruction
    /// carries the Instruction's output here even when its token declares
    /// another name; the builder writes the result to both.
    pub output: String,
    pub context: Vec<ContextBlock>,
    pub commands: Vec<String>,
    pub rules: Vec<String>,
    pub format: Vec<String>,
    pub examples: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Decomposition {
    pub funcs: Vec<FuncDef>,
    pub warnings: Vec<CompileError>,
}

enum Segment {
    Model(Vec<String>),
    Ref(String, RefKind),
}

fn partition(commands: Vec<String>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut run = Vec::new();
    for command in commands {
        match lexer::ref_tokens(&command).first().map(|t| t.kind) {
            Some(kind) => {
                if !run.is_empty() {
                    segments.push(Segment::Model(std::mem::take(&mut run)));
                }
                segments.push(Segment::Ref(command, kind));
            }
            None => run.push(command),
        }
    }
    if !run.is_empty() || segments.is_empty() {
        segments.push(Segment::Model(run));
    }
    segments
}

fn temp_name(instruction: usize, segment: usize) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("Instruction{instruction}_Temp{segment}_{}", &suffix[..8])
}

fn first_line(lines: Option<Vec<String>>) -> Option<String> {
    lines?
        .into_iter()
        .map(|l| normalize_name(&l))
        .find(|l| !l.is_empty())
}

struct Decomposer {
    model_kind: StatementKind,
    context: Vec<ContextBlock>,
    instructions: usize,
    out: Decomposition,
}

impl Decomposer {
    fn new(agent: AgentKind) -> Self {
        Self {
            model_kind: StatementKind::model_for(agent),
            context: Vec::new(),
            instructions: 0,
            out: Decomposition::default(),
        }
    }

    fn warn(&mut self, err: CompileError) {
        tracing::warn!(warning = %err, "SPL compile warning");
        self.out.warnings.push(err);
    }

    fn section(&mut self, section: &Section) {
        match section.kind() {
            SectionKind::Instruction => self.instruction(section),
            SectionKind::Other(name) => {
                self.warn(CompileError::UnknownSection(name));
                self.context.push(ContextBlock::from_section(section));
            }
            _ => self.context.push(ContextBlock::from_section(section)),
        }
    }

    fn instruction(&mut self, section: &Section) {
        self.instructions += 1;
        let k = self.instructions;
        let base = format!("Instruction{k}");

        if section.section.is_empty() {
            self.warn(CompileError::MalformedSection(format!("{base} has no subsections")));
        }

        let input = match first_line(section.subsection("InputVariable")) {
            Some(name) => name,
            None => {
                self.warn(CompileError::MissingSubsection {
                    index: k,
                    subsection: "InputVariable".into(),
                    default: format!("${{{DEFAULT_INPUT}}}$"),
                });
                DEFAULT_INPUT.to_string()
            }
        };
        let output = match first_line(section.subsection("OutputVariable")) {
            Some(name) => name,
            None => {
                let default = format!("{base}_Output");
                self.warn(CompileError::MissingSubsection {
                    index: k,
                    subsection: "OutputVariable".into(),
                    default: default.clone(),
                });
                default
            }
        };
        let commands = section.subsection("Commands").unwrap_or_else(|| {
            self.warn(CompileError::MissingSubsection {
                index: k,
                subsection: "Commands".into(),
                default: String::new(),
            });
            Vec::new()
        });
        let description = section
            .subsection("Name")
            .map(|lines| lines.join(" "))
            .unwrap_or_default();
        let rules = section.subsection("Rules").unwrap_or_default();
        let format = section.subsection("Format").unwrap_or_default();
        let examples = section.subsection("Example").unwrap_or_default();

        let segments = partition(commands);
        let count = segments.len();
        let mut prev = input.clone();

        for (i, segment) in segments.into_iter().enumerate() {
            let last = i + 1 == count;
            let name = if count == 1 {
                base.clone()
            } else {
                format!("{base}_Part{}", i + 1)
            };

            let func = match segment {
                Segment::Model(commands) => FuncDef {
                    name,
                    description: description.clone(),
                    kind: self.model_kind,
                    instruction: k,
                    input: prev.clone(),
                    output: if last { output.clone() } else { temp_name(k, i + 1) },
                    context: self.context.clone(),
                    commands,
                    rules: rules.clone(),
                    format: format.clone(),
                    examples: examples.clone(),
                },
                Segment::Ref(command, ref_kind) => {
                    let command = if i > 0 {
                        lexer::rewrite_ref_inputs(&command, &input, &prev)
                    } else {
                        command
                    };
                    let declared = lexer::ref_tokens(&command)
                        .last()
                        .map(|t| t.output.clone())
                        .filter(|o| !o.is_empty());
                    let output = match declared {
                        _ if last => output.clone(),
                        Some(declared) => declared,
                        None => temp_name(k, i + 1),
                    };
                    FuncDef {
                        name,
                        description: description.clone(),
                        kind: match ref_kind {
                            RefKind::Api => StatementKind::Api,
                            RefKind::Data => StatementKind::Data,
                        },
                        instruction: k,
                        input: prev.clone(),
                        output,
                        context: Vec::new(),
                        commands: vec![command],
                        rules: Vec::new(),
                        format: Vec::new(),
                        examples: Vec::new(),
                    }
                }
            };
            prev = func.output.clone();
            self.out.funcs.push(func);
        }
    }
}

/// Decompose a document into function definitions, one per unit.
pub fn decompose(doc: &SplDocument) -> Decomposition {
    let mut decomposer = Decomposer::new(doc.agent_type);
    for section in &doc.sections {
        decomposer.section(section);
    }
    decomposer.out
}
