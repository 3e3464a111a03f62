//! Context builder: declares the chain's global parameters.
//!
//! The whole document is scanned, not each unit, so a parameter declared in
//! any section is visible to every statement.

use splforge_core::Parameter;
use std::collections::HashSet;

use crate::document::SplDocument;
use crate::lexer;

/// Deduplicated `~refParameter{..}/refParameter` declarations, first occurrence first.
pub fn build_global_params(doc: &SplDocument) -> Vec<Parameter> {
    let mut seen = HashSet::new();
    doc.all_lines()
        .flat_map(|line| lexer::global_params(&line))
        .filter(|name| seen.insert(name.clone()))
        .map(|name| {
            let mut param = Parameter::new(&name);
            param.description = format!("Global parameter {name}");
            param
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_are_deduplicated_across_sections() {
        let doc = SplDocument::from_json(
            r#"[
              {"sectionType":"Persona","section":[{"subSectionType":"Role","content":"Speak ~refParameter{Tone}/refParameter"}]},
              {"sectionType":"Instruction","section":[{"subSectionType":"Commands","content":[
                "use ~refParameter{Tone}/refParameter",
                "greet ~refParameter{Name}/refParameter"
              ]}]}
            ]"#,
        )
        .unwrap();
        let names: Vec<String> = build_global_params(&doc).iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Tone", "Name"]);
    }

    #[test]
    fn no_declarations_no_params() {
        let doc = SplDocument::from_json("[]").unwrap();
        assert!(build_global_params(&doc).is_empty());
    }
}
