//! Embedded agent-meta codec.
//!
//! The board CRUD has no structured metadata field for a task, so
//! orchestration state rides inside the free-text `description` after a
//! sentinel line. This module is the sole mutator of that encoding — every
//! other component must go through `parse`/`strip`/`embed` rather than
//! touching the sentinel directly, or a concurrent edit to the user-visible
//! description could corrupt the meta block.

use crate::constants::AGENT_META_SENTINEL;
use crate::models::AgentMeta;

/// Returns the parsed meta block, or `None` if the sentinel is absent or the
/// suffix isn't valid JSON. Never panics or errors — callers treat an
/// unparsable block the same as a missing one.
pub fn parse(description: &str) -> Option<AgentMeta> {
    let (_, suffix) = description.split_once(AGENT_META_SENTINEL)?;
    serde_json::from_str(suffix.trim()).ok()
}

/// Returns the user-visible prefix, trimmed, with the sentinel and
/// everything after it removed. Idempotent: `strip(strip(d)) == strip(d)`.
pub fn strip(description: &str) -> String {
    match description.split_once(AGENT_META_SENTINEL) {
        Some((prefix, _)) => prefix.trim().to_string(),
        None => description.trim().to_string(),
    }
}

/// Returns a new description: the stripped prefix, the sentinel, and the
/// canonical JSON encoding of `meta`.
pub fn embed(description: &str, meta: &AgentMeta) -> String {
    let prefix = strip(description);
    let encoded = serde_json::to_string(meta).expect("AgentMeta always serializes");
    if prefix.is_empty() {
        format!("{AGENT_META_SENTINEL}\n{encoded}")
    } else {
        format!("{prefix}\n\n{AGENT_META_SENTINEL}\n{encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentMetaStatus;

    fn sample_meta() -> AgentMeta {
        AgentMeta {
            agent: Some("claude".to_string()),
            status: AgentMetaStatus::Running,
            attempts: 1,
            started_at: Some(chrono::Utc::now()),
            result_path: None,
            last_error: None,
            result_summary: None,
        }
    }

    #[test]
    fn embed_then_parse_round_trips() {
        let meta = sample_meta();
        let encoded = embed("do the thing", &meta);
        assert_eq!(parse(&encoded), Some(meta));
    }

    #[test]
    fn strip_removes_sentinel_and_trims() {
        let encoded = embed("  do the thing  ", &sample_meta());
        assert_eq!(strip(&encoded), "do the thing");
    }

    #[test]
    fn strip_is_idempotent() {
        let encoded = embed("do the thing", &sample_meta());
        let once = strip(&encoded);
        assert_eq!(strip(&once), once);
    }

    #[test]
    fn parse_returns_none_without_sentinel() {
        assert_eq!(parse("just a plain description"), None);
    }

    #[test]
    fn parse_returns_none_on_malformed_json() {
        let broken = format!("desc\n\n{AGENT_META_SENTINEL}\nnot json at all");
        assert_eq!(parse(&broken), None);
    }

    #[test]
    fn embed_contains_exactly_one_sentinel() {
        let encoded = embed("desc", &sample_meta());
        assert_eq!(encoded.matches(AGENT_META_SENTINEL).count(), 1);

        // Embedding again (simulating a second dispatch) still has exactly one.
        let reembedded = embed(&encoded, &sample_meta());
        assert_eq!(reembedded.matches(AGENT_META_SENTINEL).count(), 1);
    }

    #[test]
    fn strip_on_description_with_no_sentinel_is_noop_trim() {
        assert_eq!(strip("already plain"), "already plain");
    }
}
