//! Clause tree data structures.

use crate::definitions::Definition;
use serde::{Deserialize, Serialize};

/// One node of the hierarchical clause structure.
///
/// Clause ids are unique within a document; a parent's level is always
/// strictly smaller than its children's, and character offsets are monotonic
/// in depth-first order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseNode {
    /// Dotted or domain-specific identifier, e.g. `"14.2"`.
    pub clause_id: String,
    /// Heading text following the id on the heading line.
    pub title: String,
    /// Body text up to the next heading.
    pub text: String,
    /// Nesting depth, root clauses are level 0.
    pub level: usize,
    /// Byte offset of the heading line in the source text.
    pub start_offset: usize,
    /// Byte offset one past the end of the clause body.
    pub end_offset: usize,
    /// Ordered sub-clauses.
    #[serde(default)]
    pub children: Vec<ClauseNode>,
}

impl ClauseNode {
    pub fn new(clause_id: impl Into<String>, title: impl Into<String>, level: usize) -> Self {
        Self {
            clause_id: clause_id.into(),
            title: title.into(),
            text: String::new(),
            level,
            start_offset: 0,
            end_offset: 0,
            children: Vec::new(),
        }
    }

    /// Depth-first search for a clause by id.
    pub fn find(&self, clause_id: &str) -> Option<&ClauseNode> {
        if self.clause_id == clause_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(clause_id))
    }

    /// Count this node and all descendants.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ClauseNode::count).sum::<usize>()
    }
}

/// A reference from one clause to another, found in the clause body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReference {
    pub source_clause_id: String,
    pub target_clause_id: String,
    /// Short snippet around the match, for display.
    pub context: String,
}

/// Parsed structure of a whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseTree {
    /// Ordered root clauses.
    pub clauses: Vec<ClauseNode>,
    /// Total number of clauses at all levels.
    pub total_clauses: usize,
    /// Which pattern family produced this tree.
    pub structure_type: String,
    #[serde(default)]
    pub cross_references: Vec<CrossReference>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

impl ClauseTree {
    /// Single-clause tree holding the entire document; used when no heading
    /// pattern matches enough of the text.
    pub fn single_clause(text: &str) -> Self {
        let mut node = ClauseNode::new("1", "Document", 0);
        node.text = text.to_string();
        node.end_offset = text.len();
        Self {
            clauses: vec![node],
            total_clauses: 1,
            structure_type: "single_clause".to_string(),
            cross_references: Vec::new(),
            definitions: Vec::new(),
        }
    }

    /// Depth-first search over all roots.
    pub fn find(&self, clause_id: &str) -> Option<&ClauseNode> {
        self.clauses.iter().find_map(|c| c.find(clause_id))
    }

    /// All clause ids in depth-first order.
    pub fn clause_ids(&self) -> Vec<String> {
        fn walk(node: &ClauseNode, out: &mut Vec<String>) {
            out.push(node.clause_id.clone());
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.clauses {
            walk(root, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ClauseTree {
        let mut root = ClauseNode::new("1", "General", 0);
        let mut child = ClauseNode::new("1.1", "Definitions", 1);
        child.text = "Terms are defined here.".to_string();
        child.children.push(ClauseNode::new("1.1.1", "Scope", 2));
        root.children.push(child);
        ClauseTree {
            clauses: vec![root],
            total_clauses: 3,
            structure_type: "generic_numbered".to_string(),
            cross_references: Vec::new(),
            definitions: Vec::new(),
        }
    }

    #[test]
    fn find_nested() {
        let tree = sample_tree();
        let node = tree.find("1.1.1").unwrap();
        assert_eq!(node.title, "Scope");
        assert!(tree.find("9.9").is_none());
    }

    #[test]
    fn clause_ids_depth_first() {
        let tree = sample_tree();
        assert_eq!(tree.clause_ids(), vec!["1", "1.1", "1.1.1"]);
    }

    #[test]
    fn single_clause_fallback() {
        let tree = ClauseTree::single_clause("just some text");
        assert_eq!(tree.total_clauses, 1);
        assert_eq!(tree.structure_type, "single_clause");
        assert_eq!(tree.clauses[0].text, "just some text");
    }
}
