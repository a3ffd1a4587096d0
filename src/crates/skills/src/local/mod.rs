//! Built-in local skills.
//!
//! These run in-process against the task's parsed documents: clause
//! context lookup, defined-term extraction, cross-reference checking,
//! baseline comparison, and reference-document search.

use crate::dispatcher::SkillResources;
use crate::registry::SkillRegistry;
use crate::schema::{SkillHandler, SkillSpec};
use async_trait::async_trait;
use parser::ClauseTree;
use review_core::react::SkillInvocation;
use review_core::Result;
use serde_json::{json, Value};
use std::sync::Arc;

/// Register the default skill set into a registry.
pub fn register_builtin_skills(registry: &mut SkillRegistry) -> Result<()> {
    registry.register(SkillSpec::local(
        "get_clause_context",
        "Fetch a clause's text, position, and immediate sub-clauses from the primary document",
        json!({
            "type": "object",
            "properties": {"clause_id": {"type": "string"}},
            "required": []
        }),
        json!({
            "type": "object",
            "properties": {
                "clause_id": {"type": "string"},
                "title": {"type": "string"},
                "text": {"type": "string"},
                "level": {"type": "integer"},
                "sub_clauses": {"type": "array"}
            },
            "required": ["clause_id", "text"]
        }),
        Arc::new(GetClauseContext),
    ))?;

    registry.register(SkillSpec::local(
        "extract_definitions",
        "Look up defined terms from the primary document's definitions section",
        json!({
            "type": "object",
            "properties": {"term": {"type": "string"}},
            "required": []
        }),
        json!({
            "type": "object",
            "properties": {"definitions": {"type": "array"}},
            "required": ["definitions"]
        }),
        Arc::new(ExtractDefinitions),
    ))?;

    registry.register(SkillSpec::local(
        "check_cross_references",
        "List the clauses a clause refers to and flag references to missing clauses",
        json!({
            "type": "object",
            "properties": {"clause_id": {"type": "string"}},
            "required": []
        }),
        json!({
            "type": "object",
            "properties": {
                "references": {"type": "array"},
                "broken": {"type": "array"}
            },
            "required": ["references", "broken"]
        }),
        Arc::new(CheckCrossReferences),
    ))?;

    registry.register(SkillSpec::local(
        "compare_with_baseline",
        "Compare a clause's text against the same clause in the baseline document",
        json!({
            "type": "object",
            "properties": {"clause_id": {"type": "string"}},
            "required": []
        }),
        json!({
            "type": "object",
            "properties": {
                "primary_text": {"type": "string"},
                "baseline_text": {"type": "string"},
                "differs": {"type": "boolean"}
            },
            "required": ["differs"]
        }),
        Arc::new(CompareWithBaseline),
    ))?;

    registry.register(SkillSpec::local(
        "search_reference_docs",
        "Search the uploaded reference documents for a phrase",
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }),
        json!({
            "type": "object",
            "properties": {"matches": {"type": "array"}},
            "required": ["matches"]
        }),
        Arc::new(SearchReferenceDocs),
    ))?;

    Ok(())
}

fn requested_clause_id(input: &Value, invocation: &SkillInvocation) -> String {
    input["clause_id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(&invocation.clause_id)
        .to_string()
}

fn primary<'a>(resources: &'a SkillResources) -> std::result::Result<&'a Arc<ClauseTree>, String> {
    resources
        .primary
        .as_ref()
        .ok_or_else(|| "no primary document uploaded".to_string())
}

struct GetClauseContext;

#[async_trait]
impl SkillHandler for GetClauseContext {
    async fn run(
        &self,
        input: Value,
        resources: &SkillResources,
        invocation: &SkillInvocation,
    ) -> std::result::Result<Value, String> {
        let clause_id = requested_clause_id(&input, invocation);
        let tree = primary(resources)?;
        let node = tree
            .find(&clause_id)
            .ok_or_else(|| format!("clause {clause_id} not found in the primary document"))?;
        let sub_clauses: Vec<Value> = node
            .children
            .iter()
            .map(|c| json!({"clause_id": c.clause_id, "title": c.title}))
            .collect();
        Ok(json!({
            "clause_id": node.clause_id,
            "title": node.title,
            "text": node.text,
            "level": node.level,
            "sub_clauses": sub_clauses,
        }))
    }
}

struct ExtractDefinitions;

#[async_trait]
impl SkillHandler for ExtractDefinitions {
    async fn run(
        &self,
        input: Value,
        resources: &SkillResources,
        _invocation: &SkillInvocation,
    ) -> std::result::Result<Value, String> {
        let tree = primary(resources)?;
        let term_filter = input["term"].as_str().map(str::to_lowercase);
        let definitions: Vec<Value> = tree
            .definitions
            .iter()
            .filter(|d| match &term_filter {
                Some(term) => d.term.to_lowercase().contains(term),
                None => true,
            })
            .map(|d| json!({"term": d.term, "definition": d.definition}))
            .collect();
        Ok(json!({"definitions": definitions}))
    }
}

struct CheckCrossReferences;

#[async_trait]
impl SkillHandler for CheckCrossReferences {
    async fn run(
        &self,
        input: Value,
        resources: &SkillResources,
        invocation: &SkillInvocation,
    ) -> std::result::Result<Value, String> {
        let clause_id = requested_clause_id(&input, invocation);
        let tree = primary(resources)?;
        let mut references = Vec::new();
        let mut broken = Vec::new();
        for reference in tree
            .cross_references
            .iter()
            .filter(|r| r.source_clause_id == clause_id)
        {
            references.push(json!({
                "target": reference.target_clause_id,
                "context": reference.context,
            }));
            if tree.find(&reference.target_clause_id).is_none() {
                broken.push(json!(reference.target_clause_id));
            }
        }
        Ok(json!({"references": references, "broken": broken}))
    }
}

struct CompareWithBaseline;

#[async_trait]
impl SkillHandler for CompareWithBaseline {
    async fn run(
        &self,
        input: Value,
        resources: &SkillResources,
        invocation: &SkillInvocation,
    ) -> std::result::Result<Value, String> {
        let clause_id = requested_clause_id(&input, invocation);
        let tree = primary(resources)?;
        let baseline = resources
            .baseline
            .as_ref()
            .ok_or_else(|| "no baseline document uploaded".to_string())?;

        let primary_text = tree.find(&clause_id).map(|n| n.text.clone());
        let baseline_text = baseline.find(&clause_id).map(|n| n.text.clone());
        let differs = primary_text != baseline_text;
        Ok(json!({
            "primary_text": primary_text.unwrap_or_default(),
            "baseline_text": baseline_text.unwrap_or_default(),
            "differs": differs,
        }))
    }
}

struct SearchReferenceDocs;

const SNIPPET_CHARS: usize = 160;
const MAX_MATCHES: usize = 10;

#[async_trait]
impl SkillHandler for SearchReferenceDocs {
    async fn run(
        &self,
        input: Value,
        resources: &SkillResources,
        _invocation: &SkillInvocation,
    ) -> std::result::Result<Value, String> {
        let query = input["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| "query must be a non-empty string".to_string())?
            .to_lowercase();

        let mut matches = Vec::new();
        for tree in &resources.reference {
            search_tree(tree, &query, &mut matches);
            if matches.len() >= MAX_MATCHES {
                break;
            }
        }
        matches.truncate(MAX_MATCHES);
        Ok(json!({"matches": matches}))
    }
}

fn search_tree(tree: &ClauseTree, query: &str, out: &mut Vec<Value>) {
    fn walk(node: &parser::ClauseNode, query: &str, out: &mut Vec<Value>) {
        if out.len() >= MAX_MATCHES {
            return;
        }
        let haystack = node.text.to_lowercase();
        if let Some(pos) = haystack.find(query) {
            let start = pos.saturating_sub(SNIPPET_CHARS / 2);
            let end = (pos + query.len() + SNIPPET_CHARS / 2).min(node.text.len());
            let snippet = node.text.get(start..end).unwrap_or(&node.text).trim();
            out.push(json!({
                "clause_id": node.clause_id,
                "title": node.title,
                "snippet": snippet,
            }));
        }
        for child in &node.children {
            walk(child, query, out);
        }
    }
    for root in &tree.clauses {
        walk(root, query, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::SkillDispatcher;
    use parser::{ParserConfig, StructureParser};
    use review_core::react::SkillExecutor;

    const PRIMARY: &str = "\
1 General

1.1 Definitions
\"Employer\" means the person named in the Contract Data.
\"Works\" means the permanent works.

14 Payment

14.2 Advance Payment
The Advance Payment shall be 10%. See Clause 1.1 and Clause 99.9.
";

    const BASELINE: &str = "\
14 Payment

14.2 Advance Payment
The Advance Payment shall be 15%.
";

    fn resources() -> Arc<SkillResources> {
        let parser =
            StructureParser::new(ParserConfig::default().with_definitions_section("1.1"));
        let primary = Arc::new(parser.parse(PRIMARY).unwrap());
        let baseline = Arc::new(parser.parse(BASELINE).unwrap());
        Arc::new(SkillResources {
            primary: Some(primary.clone()),
            baseline: Some(baseline),
            reference: vec![primary],
        })
    }

    fn dispatcher() -> SkillDispatcher {
        let mut registry = SkillRegistry::new();
        register_builtin_skills(&mut registry).unwrap();
        SkillDispatcher::new(Arc::new(registry), resources())
    }

    fn invocation(clause_id: &str) -> SkillInvocation {
        SkillInvocation {
            task_id: "t1".to_string(),
            clause_id: clause_id.to_string(),
            domain_id: "construction".to_string(),
            language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn clause_context_defaults_to_invocation_clause() {
        let result = dispatcher()
            .dispatch("get_clause_context", json!({}), &invocation("14.2"))
            .await;
        assert!(result.success, "{:?}", result.error);
        let data = result.data.unwrap();
        assert_eq!(data["clause_id"], "14.2");
        assert!(data["text"].as_str().unwrap().contains("10%"));
    }

    #[tokio::test]
    async fn clause_context_missing_clause_fails() {
        let result = dispatcher()
            .dispatch("get_clause_context", json!({"clause_id": "77.7"}), &invocation("14.2"))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("77.7"));
    }

    #[tokio::test]
    async fn definitions_filtered_by_term() {
        let result = dispatcher()
            .dispatch("extract_definitions", json!({"term": "employer"}), &invocation("1.1"))
            .await;
        assert!(result.success);
        let defs = result.data.unwrap()["definitions"].as_array().unwrap().clone();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["term"], "Employer");
    }

    #[tokio::test]
    async fn cross_references_flag_broken_targets() {
        let result = dispatcher()
            .dispatch("check_cross_references", json!({}), &invocation("14.2"))
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        let targets: Vec<&str> = data["references"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["target"].as_str().unwrap())
            .collect();
        assert!(targets.contains(&"1.1"));
        assert!(targets.contains(&"99.9"));
        assert_eq!(data["broken"].as_array().unwrap(), &vec![json!("99.9")]);
    }

    #[tokio::test]
    async fn baseline_comparison_detects_change() {
        let result = dispatcher()
            .dispatch("compare_with_baseline", json!({}), &invocation("14.2"))
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["differs"], true);
        assert!(data["primary_text"].as_str().unwrap().contains("10%"));
        assert!(data["baseline_text"].as_str().unwrap().contains("15%"));
    }

    #[tokio::test]
    async fn reference_search_finds_snippets() {
        let result = dispatcher()
            .dispatch(
                "search_reference_docs",
                json!({"query": "advance payment"}),
                &invocation("14.2"),
            )
            .await;
        assert!(result.success);
        let matches = result.data.unwrap()["matches"].as_array().unwrap().clone();
        assert!(!matches.is_empty());
        assert_eq!(matches[0]["clause_id"], "14.2");
    }

    #[tokio::test]
    async fn empty_query_rejected() {
        let result = dispatcher()
            .dispatch("search_reference_docs", json!({"query": "  "}), &invocation("1.1"))
            .await;
        assert!(!result.success);
    }
}
