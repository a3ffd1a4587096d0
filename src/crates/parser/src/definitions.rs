//! Definitions extraction from a designated definitions section.
//!
//! Extraction is hybrid: a regex pass finds the conventional
//! `"Term" means ...` forms, and callers may merge in model-supplied entries
//! afterwards. Model entries never overwrite a regex-extracted term.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a definition entry was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionSource {
    Regex,
    Model,
}

/// One defined term and its definition text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub term: String,
    pub definition: String,
    pub source: DefinitionSource,
}

/// Extract `"Term" means ...` style definitions from the section text.
/// Handles straight and curly quotes; a term is kept once, first hit wins.
pub fn extract_definitions(section_text: &str) -> Vec<Definition> {
    // Compiled on each call; definitions sections are parsed once per upload.
    let pattern = Regex::new(
        r#"["\u{201C}]([^"\u{201D}]+)["\u{201D}]\s+(?:means|shall mean|refers to)\s+([^\n]+)"#,
    )
    .expect("definition pattern is valid");

    let mut out: Vec<Definition> = Vec::new();
    for caps in pattern.captures_iter(section_text) {
        let term = caps[1].trim().to_string();
        if term.is_empty() || out.iter().any(|d| d.term == term) {
            continue;
        }
        out.push(Definition {
            term,
            definition: caps[2].trim().trim_end_matches('.').to_string(),
            source: DefinitionSource::Regex,
        });
    }
    out
}

/// Merge model-supplied definitions into a regex-extracted set. Entries for
/// terms the regex pass already found are discarded; new terms are appended
/// in the order given.
pub fn merge_supplemental(
    definitions: &mut Vec<Definition>,
    supplemental: Vec<(String, String)>,
) {
    for (term, definition) in supplemental {
        let term = term.trim().to_string();
        if term.is_empty() || definitions.iter().any(|d| d.term == term) {
            continue;
        }
        definitions.push(Definition {
            term,
            definition: definition.trim().to_string(),
            source: DefinitionSource::Model,
        });
    }
}
