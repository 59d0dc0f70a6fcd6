//! Router: picks which registered agent handles a task.
//!
//! Priority order: an explicit `agent` override already recorded in the
//! task's embedded meta, then keyword scoring against the registry (ties
//! broken by registry declaration order), then the registry's flagged
//! default, then the first enabled entry, then a hardcoded fallback id if
//! the registry is completely empty.

use crate::constants::HARDCODED_FALLBACK_AGENT_ID;
use crate::models::{AgentDefinition, Task};
use crate::registry::RegistrySnapshot;
use std::sync::Arc;

pub fn route(
    task: &Task,
    meta_agent_override: Option<&str>,
    registry: &RegistrySnapshot,
) -> String {
    if let Some(id) = meta_agent_override {
        if registry.get(id).is_some() {
            return id.to_string();
        }
        tracing::warn!(agent = id, "meta override names an unknown agent, ignoring");
    }

    if let Some(agent) = best_keyword_match(task, registry) {
        return agent.id.clone();
    }

    if let Some(agent) = registry.default_agent() {
        return agent.id.clone();
    }

    if let Some(agent) = registry.first_enabled() {
        return agent.id.clone();
    }

    HARDCODED_FALLBACK_AGENT_ID.to_string()
}

fn best_keyword_match(task: &Task, registry: &RegistrySnapshot) -> Option<Arc<AgentDefinition>> {
    let title_lower = task.title.to_lowercase();
    let description_lower = crate::meta::strip(&task.description).to_lowercase();

    let mut best: Option<(usize, Arc<AgentDefinition>)> = None;

    for agent in registry.enabled_in_order() {
        let score = score(agent, &title_lower, &description_lower);
        if score == 0 {
            continue;
        }
        match &best {
            Some((best_score, _)) if *best_score >= score => {}
            _ => best = Some((score, agent.clone())),
        }
    }

    best.map(|(_, agent)| agent)
}

/// Title matches count once per distinct keyword regardless of repetition,
/// so a keyword mentioned twice in the title can't outweigh the description.
fn score(agent: &AgentDefinition, title_lower: &str, description_lower: &str) -> usize {
    let mut score = 0;
    for keyword in &agent.keywords {
        let keyword_lower = keyword.to_lowercase();
        if keyword_lower.is_empty() {
            continue;
        }
        if title_lower.contains(&keyword_lower) {
            score += 1;
        }
        score += description_lower.matches(&keyword_lower).count();
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn agent(id: &str, keywords: &[&str], default: bool) -> AgentDefinition {
        AgentDefinition {
            id: id.to_string(),
            name: id.to_string(),
            cmd: "x".to_string(),
            args: vec!["{prompt}".to_string()],
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ram_mb: 1,
            default,
            enabled: true,
            note: None,
        }
    }

    #[test]
    fn meta_override_wins_when_agent_exists() {
        let registry = RegistrySnapshot::from_definitions(vec![
            agent("claude", &["rust"], true),
            agent("copilot", &["frontend"], false),
        ]);
        let task = Task::new("Add a react button", "frontend work", 0);
        assert_eq!(route(&task, Some("copilot"), &registry), "copilot");
    }

    #[test]
    fn unknown_override_falls_through_to_keyword_match() {
        let registry = RegistrySnapshot::from_definitions(vec![agent("claude", &["rust"], true)]);
        let task = Task::new("Rust refactor", "", 0);
        assert_eq!(route(&task, Some("ghost"), &registry), "claude");
    }

    #[test]
    fn keyword_score_breaks_ties_by_registry_order() {
        let registry = RegistrySnapshot::from_definitions(vec![
            agent("first", &["shared"], false),
            agent("second", &["shared"], false),
        ]);
        let task = Task::new("shared task", "needs shared work", 0);
        assert_eq!(route(&task, None, &registry), "first");
    }

    #[test]
    fn falls_back_to_default_agent_with_no_keyword_match() {
        let registry = RegistrySnapshot::from_definitions(vec![
            agent("claude", &["rust"], true),
            agent("copilot", &["frontend"], false),
        ]);
        let task = Task::new("unrelated", "nothing matches", 0);
        assert_eq!(route(&task, None, &registry), "claude");
    }

    #[test]
    fn falls_back_to_hardcoded_id_with_empty_registry() {
        let registry = RegistrySnapshot::from_definitions(vec![]);
        let task = Task::new("anything", "", 0);
        assert_eq!(route(&task, None, &registry), HARDCODED_FALLBACK_AGENT_ID);
    }

    #[test]
    fn embedded_agent_meta_is_excluded_from_keyword_scoring() {
        let registry = RegistrySnapshot::from_definitions(vec![
            agent("claude", &["rust"], true),
            agent("copilot", &["frontend"], false),
        ]);
        let mut task = Task::new("unrelated", "nothing matches", 0);
        let stale_meta = crate::models::AgentMeta {
            agent: Some("copilot".to_string()),
            status: crate::models::AgentMetaStatus::Queued,
            attempts: 1,
            started_at: None,
            result_path: None,
            last_error: Some("frontend build failed".to_string()),
            result_summary: Some("frontend frontend frontend".to_string()),
        };
        task.description = crate::meta::embed(&task.description, &stale_meta);
        // Keywords buried in the stale meta block must not sway routing.
        assert_eq!(route(&task, None, &registry), "claude");
    }

    #[test]
    fn title_keyword_repetition_does_not_outweigh_single_description_hit() {
        let registry = RegistrySnapshot::from_definitions(vec![
            agent("title_heavy", &["foo"], false),
            agent("desc_heavy", &["bar"], false),
        ]);
        let task = Task::new("foo foo foo", "bar", 0);
        // "title_heavy" would win on raw substring count without
        // deduplication; with dedup both score 1, registry order decides.
        assert_eq!(route(&task, None, &registry), "title_heavy");
    }
}
