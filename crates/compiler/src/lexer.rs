//! Placeholder lexer for the reference micro-syntax embedded in SPL text.
//!
//! Four productions are recognized:
//!
//! ```text
//! param_ref    = "${" NAME "}$"
//! api_ref      = "~refAPI{" ID "}[" INPUT "][" OUTPUT "]/refAPI"
//! data_ref     = "~refData{" ID "}[" INPUT "][" OUTPUT "]/refData"
//! global_param = "~refParameter{" NAME "}/refParameter"
//! ```
//!
//! `ID` and `NAME` contain no braces. `INPUT` is the body of a JSON object and
//! may hold one level of nested brackets; `OUTPUT` holds none. Anything that
//! does not match a production stays literal text and is never an error.

use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use splforge_core::parameter::{self, PARAM_REF_PATTERN};
use std::ops::Range;
use std::sync::LazyLock;

const API_REF_PATTERN: &str =
    r"~refAPI\{([^{}]*)\}\[((?:[^\[\]]|\[[^\[\]]*\])*)\]\[([^\[\]]*)\]/refAPI";
const DATA_REF_PATTERN: &str =
    r"~refData\{([^{}]*)\}\[((?:[^\[\]]|\[[^\[\]]*\])*)\]\[([^\[\]]*)\]/refData";
const GLOBAL_PARAM_PATTERN: &str = r"~refParameter\{([^{}]*)\}/refParameter";

static API_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(API_REF_PATTERN).expect("api reference pattern is valid"));
static DATA_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DATA_REF_PATTERN).expect("data reference pattern is valid"));
static GLOBAL_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GLOBAL_PARAM_PATTERN).expect("global parameter pattern is valid"));
static PARAM_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PARAM_REF_PATTERN).expect("parameter reference pattern is valid"));

/// Which resource a reference token points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    #[serde(rename = "API")]
    Api,
    Data,
}

impl RefKind {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Api => &API_REF,
            Self::Data => &DATA_REF,
        }
    }
}

/// A parsed `~refAPI` or `~refData` token.
#[derive(Debug, Clone, PartialEq)]
pub struct RefToken {
    pub kind: RefKind,
    pub link_id: String,
    /// The input slot exactly as written
    pub raw_input: String,
    /// The input slot parsed as JSON
    pub input: serde_json::Value,
    /// Bare output parameter name
    pub output: String,
    /// Byte range of the whole token in the scanned text
    pub span: Range<usize>,
}

impl RefToken {
    fn from_captures(kind: RefKind, caps: &Captures<'_>) -> Option<Self> {
        let whole = caps.get(0)?;
        let raw_input = caps.get(2).map_or("", |m| m.as_str()).to_string();
        Some(Self {
            kind,
            link_id: caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            input: parse_input(&raw_input),
            raw_input,
            output: parameter::normalize_name(caps.get(3).map_or("", |m| m.as_str())),
            span: whole.range(),
        })
    }
}

/// One lexical unit of SPL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Text(&'a str),
    ParamRef(String),
    GlobalParam(String),
    Ref(RefToken),
}

/// Parse the input slot of a reference token.
///
/// The slot normally holds an object body (`"query":"${UserRequest}$"`), so it
/// is first tried wrapped in braces, then as-is, and finally kept as a string.
pub fn parse_input(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(&format!("{{{trimmed}}}"))
        .or_else(|_| serde_json::from_str(trimmed))
        .unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string()))
}

/// Every API and data reference in `text`, in order of appearance.
pub fn ref_tokens(text: &str) -> Vec<RefToken> {
    let mut tokens: Vec<RefToken> = [RefKind::Api, RefKind::Data]
        .into_iter()
        .flat_map(|kind| {
            kind.regex()
                .captures_iter(text)
                .filter_map(move |caps| RefToken::from_captures(kind, &caps))
        })
        .collect();
    tokens.sort_by_key(|t| t.span.start);
    tokens
}

/// Whether `text` contains at least one API or data reference.
pub fn contains_ref(text: &str) -> bool {
    API_REF.is_match(text) || DATA_REF.is_match(text)
}

/// Names declared with `~refParameter{name}/refParameter`, in order, with repeats.
pub fn global_params(text: &str) -> Vec<String> {
    GLOBAL_PARAM
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Rewrite every global parameter declaration to its `${name}$` reference.
pub fn rewrite_global_params(text: &str) -> String {
    GLOBAL_PARAM
        .replace_all(text, |caps: &Captures<'_>| parameter::placeholder(caps[1].trim()))
        .into_owned()
}

/// Replace every API and data reference by its output placeholder.
pub fn replace_refs_with_outputs(text: &str) -> String {
    let mut out = text.to_string();
    for kind in [RefKind::Api, RefKind::Data] {
        out = kind
            .regex()
            .replace_all(&out, |caps: &Captures<'_>| {
                parameter::placeholder(&parameter::normalize_name(&caps[3]))
            })
            .into_owned();
    }
    out
}

/// Inside the input slots of reference tokens only, rewrite `${from}$` to `${to}$`.
pub fn rewrite_ref_inputs(text: &str, from: &str, to: &str) -> String {
    let from_ref = parameter::placeholder(from);
    let to_ref = parameter::placeholder(to);
    let mut out = text.to_string();
    for (kind, tag) in [(RefKind::Api, "refAPI"), (RefKind::Data, "refData")] {
        out = kind
            .regex()
            .replace_all(&out, |caps: &Captures<'_>| {
                format!(
                    "~{tag}{{{}}}[{}][{}]/{tag}",
                    &caps[1],
                    caps[2].replace(&from_ref, &to_ref),
                    &caps[3]
                )
            })
            .into_owned();
    }
    out
}

/// Split `text` into literal runs and tokens of all four productions.
///
/// Where matches overlap (a `${x}$` inside a reference's input slot), the
/// earlier-starting match wins and swallows the inner one.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut found: Vec<(Range<usize>, Token<'_>)> = ref_tokens(text)
        .into_iter()
        .map(|t| (t.span.clone(), Token::Ref(t)))
        .collect();
    found.extend(GLOBAL_PARAM.captures_iter(text).filter_map(|caps| {
        let m = caps.get(0)?;
        Some((m.range(), Token::GlobalParam(caps[1].trim().to_string())))
    }));
    found.extend(PARAM_REF.captures_iter(text).filter_map(|caps| {
        let m = caps.get(0)?;
        Some((m.range(), Token::ParamRef(caps[1].trim().to_string())))
    }));
    found.sort_by_key(|(range, _)| range.start);

    let mut tokens = Vec::new();
    let mut cursor = 0;
    for (range, token) in found {
        if range.start < cursor {
            continue;
        }
        if range.start > cursor {
            tokens.push(Token::Text(&text[cursor..range.start]));
        }
        cursor = range.end;
        tokens.push(token);
    }
    if cursor < text.len() {
        tokens.push(Token::Text(&text[cursor..]));
    }
    tokens
}
