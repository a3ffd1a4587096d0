//! The structure parser proper.
//!
//! Scans the document line by line with the configured heading pattern,
//! nests clauses by their dotted-id prefix relationship, and falls back to
//! built-in patterns when the configured one matches too little of the
//! document.

use crate::config::ParserConfig;
use crate::crossref::extract_cross_references;
use crate::definitions::extract_definitions;
use crate::error::{ParserError, Result};
use crate::tree::{ClauseNode, ClauseTree};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Minimum fraction of non-empty lines that must look like headings for a
/// pattern to be considered a match for the document.
const MATCH_RATIO_THRESHOLD: f64 = 0.05;

/// Built-in fallback heading patterns, tried in order when the configured
/// pattern scores below the threshold.
const FALLBACK_PATTERNS: &[(&str, &str)] = &[
    ("numbered_article", r"^(?:Article|ARTICLE)\s+(\d+)[.:]?\s*(.*)$"),
    ("chapter_numbered", r"^(?:Chapter|CHAPTER)\s+([IVXLC]+|\d+)[.:]?\s*(.*)$"),
    ("section_numbered", r"^(?:Section|SECTION)\s+(\d+(?:\.\d+)*)[.:]?\s*(.*)$"),
    ("generic_dotted", r"^(\d+(?:\.\d+)*)[.)]?\s+(.+)$"),
];

#[derive(Debug)]
struct Heading {
    clause_id: String,
    title: String,
    start_offset: usize,
    body_start: usize,
}

/// Parses plain text into a [`ClauseTree`].
pub struct StructureParser {
    config: ParserConfig,
}

impl StructureParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a document with the configured pattern, falling back to the
    /// built-in patterns when it matches too little. Never fails on odd
    /// input: the worst case is a single-clause tree.
    pub fn parse(&self, text: &str) -> Result<ClauseTree> {
        if text.trim().is_empty() {
            return Err(ParserError::EmptyDocument);
        }

        let configured = Regex::new(&self.config.clause_pattern)?;
        let non_empty = text.lines().filter(|l| !l.trim().is_empty()).count().max(1);

        let mut best: Option<(String, Vec<Heading>)> = None;
        let headings = scan_headings(text, &configured);
        let ratio = headings.len() as f64 / non_empty as f64;
        if ratio >= MATCH_RATIO_THRESHOLD && !headings.is_empty() {
            best = Some((self.config.structure_type.clone(), headings));
        } else {
            debug!(ratio, "configured clause pattern matched too little, trying fallbacks");
            let mut best_ratio = MATCH_RATIO_THRESHOLD;
            for (name, pattern) in FALLBACK_PATTERNS {
                let re = Regex::new(pattern).map_err(|e| {
                    ParserError::InvalidPattern(format!("{name}: {e}"))
                })?;
                let candidate = scan_headings(text, &re);
                let candidate_ratio = candidate.len() as f64 / non_empty as f64;
                if candidate_ratio > best_ratio && !candidate.is_empty() {
                    best_ratio = candidate_ratio;
                    best = Some((name.to_string(), candidate));
                }
            }
        }

        let Some((structure_type, headings)) = best else {
            return Ok(ClauseTree::single_clause(text));
        };

        let clauses = build_tree(text, headings, self.config.max_depth);
        let total_clauses = clauses.iter().map(ClauseNode::count).sum();
        let mut tree = ClauseTree {
            clauses,
            total_clauses,
            structure_type,
            cross_references: Vec::new(),
            definitions: Vec::new(),
        };

        tree.cross_references =
            extract_cross_references(&tree, &self.config.cross_reference_patterns)?;
        if let Some(section_id) = &self.config.definitions_section_id {
            if let Some(section) = tree.find(section_id) {
                tree.definitions = extract_definitions(&section.text);
            }
        }

        Ok(tree)
    }

    /// Resolve a clause's surrounding context as display text: its heading,
    /// body, and the titles of its direct sub-clauses.
    pub fn clause_context(&self, tree: &ClauseTree, clause_id: &str) -> Option<String> {
        let node = tree.find(clause_id)?;
        let mut out = format!("{} {}\n{}", node.clause_id, node.title, node.text);
        if !node.children.is_empty() {
            out.push_str("\nSub-clauses:");
            for child in &node.children {
                out.push_str(&format!("\n  {} {}", child.clause_id, child.title));
            }
        }
        Some(out)
    }
}

impl Default for StructureParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

fn scan_headings(text: &str, pattern: &Regex) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if let Some(caps) = pattern.captures(trimmed) {
            let clause_id = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            // Duplicate ids stay body text; ids are unique within a document.
            if !clause_id.is_empty() && seen.insert(clause_id.clone()) {
                let title = caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                headings.push(Heading {
                    clause_id,
                    title,
                    start_offset: offset,
                    body_start: offset + line.len(),
                });
            }
        }
        offset += line.len();
    }
    headings
}

fn build_tree(text: &str, headings: Vec<Heading>, max_depth: usize) -> Vec<ClauseNode> {
    let max_depth = max_depth.max(1);
    let mut roots: Vec<ClauseNode> = Vec::new();
    // Stack of clause ids from root to the most recently placed node.
    let mut stack: Vec<String> = Vec::new();

    let ends: Vec<usize> = headings
        .iter()
        .skip(1)
        .map(|h| h.start_offset)
        .chain(std::iter::once(text.len()))
        .collect();

    for (heading, end) in headings.into_iter().zip(ends) {
        let body = text[heading.body_start.min(end)..end].trim().to_string();

        while let Some(top) = stack.last() {
            if is_descendant_id(&heading.clause_id, top) {
                break;
            }
            stack.pop();
        }

        if stack.len() >= max_depth {
            // Too deep: fold heading and body into the nearest kept ancestor.
            if let Some(parent) = node_at_path_mut(&mut roots, &stack) {
                if !parent.text.is_empty() {
                    parent.text.push('\n');
                }
                parent.text.push_str(&format!("{} {}", heading.clause_id, heading.title));
                if !body.is_empty() {
                    parent.text.push('\n');
                    parent.text.push_str(&body);
                }
                parent.end_offset = end;
            }
            continue;
        }

        let level = stack.len();
        let mut node = ClauseNode::new(heading.clause_id.clone(), heading.title, level);
        node.text = body;
        node.start_offset = heading.start_offset;
        node.end_offset = end;

        if stack.is_empty() {
            roots.push(node);
        } else if let Some(parent) = node_at_path_mut(&mut roots, &stack) {
            parent.children.push(node);
        }
        stack.push(heading.clause_id);
    }

    roots
}

fn is_descendant_id(candidate: &str, ancestor: &str) -> bool {
    candidate.len() > ancestor.len() + 1
        && candidate.starts_with(ancestor)
        && candidate.as_bytes()[ancestor.len()] == b'.'
}

fn node_at_path_mut<'a>(roots: &'a mut [ClauseNode], path: &[String]) -> Option<&'a mut ClauseNode> {
    let (first, rest) = path.split_first()?;
    let mut node = roots.iter_mut().find(|n| &n.clause_id == first)?;
    for id in rest {
        node = node.children.iter_mut().find(|n| &n.clause_id == id)?;
    }
    Some(node)
}
