//! Parser configuration supplied by domain plugins.

use serde::{Deserialize, Serialize};

/// Configuration controlling how a document family is parsed.
///
/// Domain plugins carry one of these; the defaults describe a generic
/// decimal-numbered contract (`1`, `1.1`, `1.1.1`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Regex matched against the start of each line to detect clause
    /// headings. Capture group 1 is the clause id, group 2 (optional) the
    /// title.
    pub clause_pattern: String,

    /// Maximum nesting depth of the produced tree. Headings deeper than
    /// this are folded into the text of their nearest kept ancestor.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Clause id of the definitions section, if the document family has one.
    #[serde(default)]
    pub definitions_section_id: Option<String>,

    /// Regexes used to find references to other clauses inside clause text.
    /// Capture group 1 is the referenced clause id.
    #[serde(default = "default_reference_patterns")]
    pub cross_reference_patterns: Vec<String>,

    /// Label recorded on the resulting tree, e.g. `"construction_gc"`.
    #[serde(default = "default_structure_type")]
    pub structure_type: String,
}

impl ParserConfig {
    /// Generic decimal-numbered configuration.
    pub fn generic_numbered() -> Self {
        Self::default()
    }

    pub fn with_definitions_section(mut self, clause_id: impl Into<String>) -> Self {
        self.definitions_section_id = Some(clause_id.into());
        self
    }

    pub fn with_structure_type(mut self, structure_type: impl Into<String>) -> Self {
        self.structure_type = structure_type.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            clause_pattern: r"^(\d+(?:\.\d+)*)\s+(.+)$".to_string(),
            max_depth: default_max_depth(),
            definitions_section_id: None,
            cross_reference_patterns: default_reference_patterns(),
            structure_type: default_structure_type(),
        }
    }
}

fn default_max_depth() -> usize {
    4
}

fn default_structure_type() -> String {
    "generic_numbered".to_string()
}

fn default_reference_patterns() -> Vec<String> {
    vec![
        r"Sub-Clause\s+(\d+(?:\.\d+)*)".to_string(),
        r"Clause\s+(\d+(?:\.\d+)*)".to_string(),
        r"Section\s+(\d+(?:\.\d+)*)".to_string(),
    ]
}
