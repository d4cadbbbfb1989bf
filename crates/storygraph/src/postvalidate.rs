use crate::{Diagnostic, NodeType, StoryPayload};
use std::collections::HashSet;

/// Additional check run after the built-in payload invariants.
pub trait PayloadRule {
    fn name(&self) -> &str;
    fn check(&self, payload: &StoryPayload) -> Option<Diagnostic>;
}

/// Checks canonical-graph invariants. The first failure blocks persistence.
pub fn validate_payload(
    payload: &StoryPayload,
    extra_rules: &[&dyn PayloadRule],
) -> Result<(), Diagnostic> {
    let builtin: [fn(&StoryPayload) -> Option<Diagnostic>; 7] = [
        rule_nodes_present,
        rule_unique_node_keys,
        rule_paths_present,
        rule_unique_path_keys,
        rule_transitions_present,
        rule_transition_references,
        rule_terminal_nodes_resolve,
    ];

    for rule in builtin {
        if let Some(diagnostic) = rule(payload) {
            return Err(diagnostic);
        }
    }

    for rule in extra_rules {
        if let Some(diagnostic) = rule.check(payload) {
            return Err(diagnostic);
        }
    }

    Ok(())
}

fn rule_nodes_present(payload: &StoryPayload) -> Option<Diagnostic> {
    payload
        .nodes
        .is_empty()
        .then(|| Diagnostic::error("nodes_present", "story graph has no nodes"))
}

fn rule_unique_node_keys(payload: &StoryPayload) -> Option<Diagnostic> {
    let mut seen = HashSet::new();
    payload
        .nodes
        .iter()
        .find(|node| !seen.insert(node.key.as_str()))
        .map(|node| {
            Diagnostic::error(
                "unique_node_keys",
                format!("node key '{}' appears more than once", node.key),
            )
            .with_node_key(node.key.clone())
        })
}

fn rule_paths_present(payload: &StoryPayload) -> Option<Diagnostic> {
    payload
        .paths
        .is_empty()
        .then(|| Diagnostic::error("paths_present", "story graph has no paths"))
}

fn rule_unique_path_keys(payload: &StoryPayload) -> Option<Diagnostic> {
    let mut seen = HashSet::new();
    payload
        .paths
        .iter()
        .find(|path| !seen.insert(path.key.as_str()))
        .map(|path| {
            Diagnostic::error(
                "unique_path_keys",
                format!("path key '{}' appears more than once", path.key),
            )
        })
}

fn rule_transitions_present(payload: &StoryPayload) -> Option<Diagnostic> {
    payload
        .transitions
        .is_empty()
        .then(|| Diagnostic::error("transitions_present", "story graph has no transitions"))
}

fn rule_transition_references(payload: &StoryPayload) -> Option<Diagnostic> {
    let nodes: HashSet<&str> = payload.nodes.iter().map(|n| n.key.as_str()).collect();
    let paths: HashSet<&str> = payload.paths.iter().map(|p| p.key.as_str()).collect();

    for (index, transition) in payload.transitions.iter().enumerate() {
        if !nodes.contains(transition.from.as_str()) {
            return Some(
                Diagnostic::error(
                    "transition_references",
                    format!(
                        "transition #{index} starts at unknown node '{}'",
                        transition.from
                    ),
                )
                .with_node_key(transition.from.clone()),
            );
        }
        if !paths.contains(transition.path.as_str()) {
            return Some(
                Diagnostic::error(
                    "transition_references",
                    format!(
                        "transition #{index} uses unknown path '{}'",
                        transition.path
                    ),
                )
                .with_node_key(transition.from.clone()),
            );
        }
        if let Some(to) = &transition.to {
            if !nodes.contains(to.as_str()) {
                return Some(
                    Diagnostic::error(
                        "transition_references",
                        format!("transition #{index} points to unknown node '{to}'"),
                    )
                    .with_node_key(transition.from.clone()),
                );
            }
        }
    }
    None
}

fn rule_terminal_nodes_resolve(payload: &StoryPayload) -> Option<Diagnostic> {
    let sources: HashSet<&str> = payload
        .transitions
        .iter()
        .map(|t| t.from.as_str())
        .collect();
    payload
        .nodes
        .iter()
        .find(|node| !sources.contains(node.key.as_str()) && node.node_type != NodeType::Resolution)
        .map(|node| {
            Diagnostic::error(
                "terminal_nodes_resolve",
                format!(
                    "node '{}' has no outgoing transitions but is typed {}",
                    node.key, node.node_type
                ),
            )
            .with_node_key(node.key.clone())
            .with_fix("type nodes without outgoing transitions as RESOLUTION")
        })
}
