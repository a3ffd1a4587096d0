//! Cross-reference extraction.

use crate::error::{ParserError, Result};
use crate::tree::{ClauseNode, ClauseTree, CrossReference};
use regex::Regex;
use std::collections::HashSet;

/// Length of the context snippet kept around each reference match.
const CONTEXT_CHARS: usize = 60;

/// Scan every clause body for the configured reference patterns and build
/// the cross-reference table. Duplicate (source, target) pairs are folded.
pub fn extract_cross_references(
    tree: &ClauseTree,
    patterns: &[String],
) -> Result<Vec<CrossReference>> {
    let compiled: Vec<Regex> = patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| ParserError::InvalidReferencePattern(e.to_string())))
        .collect::<Result<_>>()?;

    let mut refs = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for root in &tree.clauses {
        walk(root, &compiled, &mut refs, &mut seen);
    }
    Ok(refs)
}

fn walk(
    node: &ClauseNode,
    patterns: &[Regex],
    refs: &mut Vec<CrossReference>,
    seen: &mut HashSet<(String, String)>,
) {
    for pattern in patterns {
        for caps in pattern.captures_iter(&node.text) {
            let Some(target) = caps.get(1) else { continue };
            let target_id = target.as_str().to_string();
            if target_id == node.clause_id {
                continue;
            }
            let key = (node.clause_id.clone(), target_id.clone());
            if !seen.insert(key) {
                continue;
            }
            let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
            let start = whole.start.saturating_sub(CONTEXT_CHARS / 2);
            let end = (whole.end + CONTEXT_CHARS / 2).min(node.text.len());
            let context = node.text
                .get(start..end)
                .unwrap_or("")
                .trim()
                .to_string();
            refs.push(CrossReference {
                source_clause_id: node.clause_id.clone(),
                target_clause_id: target_id,
                context,
            });
        }
    }
    for child in &node.children {
        walk(child, patterns, refs, seen);
    }
}
