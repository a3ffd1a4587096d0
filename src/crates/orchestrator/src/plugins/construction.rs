//! Construction-contract domain plugin.
//!
//! Checklist modeled on the general conditions of international EPC
//! contracts: decimal-numbered clauses, a definitions section at 1.1, and
//! the usual risk hot spots (obligations, time, payment, liability,
//! claims).

use super::{DomainPlugin, PluginRegistry};
use parser::ParserConfig;
use review_core::{ChecklistItem, Priority};

pub const CONSTRUCTION_DOMAIN_ID: &str = "construction";

/// Register the construction plugin into a registry.
pub fn register_construction_plugin(registry: &PluginRegistry) {
    registry.register(construction_plugin());
}

pub fn construction_plugin() -> DomainPlugin {
    DomainPlugin {
        domain_id: CONSTRUCTION_DOMAIN_ID.to_string(),
        name: "Construction / EPC contracts".to_string(),
        supported_subtypes: vec![
            "epc_turnkey".to_string(),
            "design_build".to_string(),
            "plant_supply".to_string(),
        ],
        parser_config: ParserConfig::default()
            .with_definitions_section("1.1")
            .with_structure_type("construction_gc"),
        checklist: construction_checklist(),
        preferred_skills: vec![
            "get_clause_context".to_string(),
            "check_cross_references".to_string(),
        ],
    }
}

fn item(
    clause_id: &str,
    name: &str,
    description: &str,
    priority: Priority,
    required: &[&str],
    suggested: &[&str],
) -> ChecklistItem {
    ChecklistItem {
        clause_id: clause_id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        priority,
        required_skills: required.iter().map(|s| s.to_string()).collect(),
        suggested_skills: suggested.iter().map(|s| s.to_string()).collect(),
    }
}

fn construction_checklist() -> Vec<ChecklistItem> {
    vec![
        item(
            "1.1",
            "Definitions",
            "Check that key terms are defined and used consistently",
            Priority::Medium,
            &["get_clause_context", "extract_definitions"],
            &["check_cross_references"],
        ),
        item(
            "1.5",
            "Priority of Documents",
            "Verify the order of precedence between contract documents",
            Priority::Medium,
            &["get_clause_context"],
            &[],
        ),
        item(
            "4.1",
            "Contractor's General Obligations",
            "Check scope wording for open-ended obligations and fitness-for-purpose language",
            Priority::Critical,
            &["get_clause_context"],
            &["compare_with_baseline", "search_reference_docs"],
        ),
        item(
            "4.12",
            "Unforeseeable Difficulties",
            "Check who carries the ground and site-condition risk",
            Priority::High,
            &["get_clause_context"],
            &["compare_with_baseline"],
        ),
        item(
            "8.2",
            "Time for Completion",
            "Verify completion obligations and the basis for extensions of time",
            Priority::High,
            &["get_clause_context"],
            &["check_cross_references"],
        ),
        item(
            "8.7",
            "Delay Damages",
            "Check the delay damages rate and whether a cap applies",
            Priority::Critical,
            &["get_clause_context"],
            &["extract_definitions"],
        ),
        item(
            "13.1",
            "Right to Vary",
            "Check variation powers and pricing of variations",
            Priority::Medium,
            &["get_clause_context"],
            &[],
        ),
        item(
            "14.2",
            "Advance Payment",
            "Check the advance payment amount, guarantee, and repayment schedule",
            Priority::High,
            &["get_clause_context"],
            &["compare_with_baseline"],
        ),
        item(
            "14.7",
            "Timing of Payments",
            "Verify payment periods and interest on late payment",
            Priority::High,
            &["get_clause_context"],
            &[],
        ),
        item(
            "15.2",
            "Termination by Employer",
            "Check termination triggers and their notice requirements",
            Priority::Critical,
            &["get_clause_context"],
            &["check_cross_references"],
        ),
        item(
            "16.1",
            "Contractor's Entitlement to Suspend",
            "Check suspension rights for non-payment",
            Priority::Medium,
            &["get_clause_context"],
            &[],
        ),
        item(
            "17.6",
            "Limitation of Liability",
            "Verify the liability cap and the carve-outs from it",
            Priority::Critical,
            &["get_clause_context"],
            &["extract_definitions", "compare_with_baseline"],
        ),
        item(
            "18.1",
            "General Requirements for Insurances",
            "Check insured parties, cover amounts, and deductibles",
            Priority::Low,
            &["get_clause_context"],
            &[],
        ),
        item(
            "20.1",
            "Contractor's Claims",
            "Check claim notice periods and whether they are time-barred",
            Priority::Critical,
            &["get_clause_context"],
            &["check_cross_references", "search_reference_docs"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_covers_the_hot_spots() {
        let checklist = construction_checklist();
        assert!(checklist.len() >= 12);
        let ids: Vec<&str> = checklist.iter().map(|c| c.clause_id.as_str()).collect();
        assert!(ids.contains(&"4.1"));
        assert!(ids.contains(&"14.2"));
        assert!(ids.contains(&"17.6"));
        assert!(ids.contains(&"20.1"));
    }

    #[test]
    fn priorities_are_weighted() {
        let checklist = construction_checklist();
        let critical = checklist.iter().filter(|c| c.priority == Priority::Critical).count();
        let high = checklist.iter().filter(|c| c.priority == Priority::High).count();
        assert!(critical >= 4);
        assert!(high >= 4);
    }

    #[test]
    fn every_item_requires_at_least_context() {
        for item in construction_checklist() {
            assert!(
                item.required_skills.contains(&"get_clause_context".to_string()),
                "{} is missing the context skill",
                item.clause_id
            );
        }
    }

    #[test]
    fn plugin_parser_config() {
        let plugin = construction_plugin();
        assert_eq!(plugin.parser_config.structure_type, "construction_gc");
        assert_eq!(plugin.parser_config.definitions_section_id.as_deref(), Some("1.1"));
        assert!(plugin.supported_subtypes.contains(&"epc_turnkey".to_string()));
    }
}
