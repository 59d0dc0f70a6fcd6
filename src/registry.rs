//! Agent Registry: loads the set of dispatchable CLI agents from a JSON
//! file and keeps it hot-reloadable. A SIGHUP (or explicit `reload()`) swaps
//! in a freshly parsed registry atomically; a dispatch already holding a
//! clone of the old `Arc` keeps running against that snapshot rather than
//! observing a half-updated set.

use crate::models::AgentDefinition;
use crate::{CoreError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    by_id: HashMap<String, Arc<AgentDefinition>>,
    /// Declaration order from the registry file, preserved for the
    /// router's keyword-tie-break.
    ordered: Vec<Arc<AgentDefinition>>,
}

impl RegistrySnapshot {
    /// Builds a snapshot directly from a list of definitions, in order,
    /// without reading a file. Used by the router's tests and by any
    /// other caller that already has definitions in hand.
    pub fn from_definitions(definitions: Vec<AgentDefinition>) -> Self {
        let mut by_id = HashMap::with_capacity(definitions.len());
        let mut ordered = Vec::with_capacity(definitions.len());
        for def in definitions {
            let def = Arc::new(def);
            by_id.insert(def.id.clone(), def.clone());
            ordered.push(def);
        }
        Self { by_id, ordered }
    }

    pub fn get(&self, id: &str) -> Option<Arc<AgentDefinition>> {
        self.by_id.get(id).cloned()
    }

    pub fn enabled_in_order(&self) -> impl Iterator<Item = &Arc<AgentDefinition>> {
        self.ordered.iter().filter(|a| a.enabled)
    }

    /// All registered agents, enabled or not, in declaration order — used
    /// by the `/api/agents` listing endpoint.
    pub fn all_in_order(&self) -> impl Iterator<Item = &Arc<AgentDefinition>> {
        self.ordered.iter()
    }

    pub fn default_agent(&self) -> Option<Arc<AgentDefinition>> {
        self.ordered.iter().find(|a| a.enabled && a.default).cloned()
    }

    pub fn first_enabled(&self) -> Option<Arc<AgentDefinition>> {
        self.ordered.iter().find(|a| a.enabled).cloned()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

pub struct AgentRegistry {
    path: PathBuf,
    snapshot: Arc<RwLock<Arc<RegistrySnapshot>>>,
}

impl AgentRegistry {
    /// Loads the registry file at construction time; fails fast if it's
    /// missing or invalid since there is nothing useful to dispatch to
    /// without it.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = parse_registry_file(&path).await?;
        Ok(Self {
            path,
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    pub async fn current(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Re-reads the registry file and swaps it in. On a parse or validation
    /// failure the previous snapshot is retained and the error is returned
    /// (and logged by the caller) rather than leaving the registry empty.
    pub async fn reload(&self) -> Result<()> {
        match parse_registry_file(&self.path).await {
            Ok(fresh) => {
                let mut guard = self.snapshot.write().await;
                *guard = Arc::new(fresh);
                tracing::info!(path = %self.path.display(), agents = guard.len(), "agent registry reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "agent registry reload failed, keeping previous snapshot");
                Err(e)
            }
        }
    }
}

async fn parse_registry_file(path: &PathBuf) -> Result<RegistrySnapshot> {
    let bytes = tokio::fs::read(path).await.map_err(CoreError::Io)?;
    let definitions: Vec<AgentDefinition> = serde_json::from_slice(&bytes)?;

    let mut seen = std::collections::HashSet::with_capacity(definitions.len());
    for def in &definitions {
        validate(def)?;
        if !seen.insert(def.id.clone()) {
            return Err(CoreError::Config(format!(
                "duplicate agent id '{}' in registry",
                def.id
            )));
        }
    }

    Ok(RegistrySnapshot::from_definitions(definitions))
}

fn validate(def: &AgentDefinition) -> Result<()> {
    if def.id.trim().is_empty() {
        return Err(CoreError::Config("agent definition missing id".to_string()));
    }
    if def.cmd.trim().is_empty() {
        return Err(CoreError::Config(format!(
            "agent '{}' has an empty cmd",
            def.id
        )));
    }
    if def.args.is_empty() {
        return Err(CoreError::Config(format!(
            "agent '{}' has an empty args template",
            def.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_registry(json: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();
        file
    }

    fn sample_json() -> &'static str {
        r#"[
            {"id": "claude", "name": "Claude", "cmd": "claude", "args": ["{prompt}"], "keywords": ["rust", "backend"], "ramMB": 512, "default": true, "enabled": true},
            {"id": "copilot", "name": "Copilot", "cmd": "copilot", "args": ["-p", "{prompt}"], "keywords": ["frontend"], "ramMB": 256, "enabled": true}
        ]"#
    }

    #[tokio::test]
    async fn loads_valid_registry_in_declaration_order() {
        let file = write_registry(sample_json());
        let registry = AgentRegistry::load(file.path()).await.unwrap();
        let snapshot = registry.current().await;
        assert_eq!(snapshot.len(), 2);
        let ordered: Vec<_> = snapshot.enabled_in_order().map(|a| a.id.clone()).collect();
        assert_eq!(ordered, vec!["claude", "copilot"]);
    }

    #[tokio::test]
    async fn default_agent_is_the_flagged_one() {
        let file = write_registry(sample_json());
        let registry = AgentRegistry::load(file.path()).await.unwrap();
        let snapshot = registry.current().await;
        assert_eq!(snapshot.default_agent().unwrap().id, "claude");
    }

    #[tokio::test]
    async fn rejects_empty_args_template() {
        let file = write_registry(
            r#"[{"id": "bad", "name": "Bad", "cmd": "x", "args": [], "ramMB": 1}]"#,
        );
        let result = AgentRegistry::load(file.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let file = write_registry(
            r#"[
                {"id": "a", "name": "A", "cmd": "x", "args": ["{prompt}"], "ramMB": 1},
                {"id": "a", "name": "A2", "cmd": "y", "args": ["{prompt}"], "ramMB": 1}
            ]"#,
        );
        let result = AgentRegistry::load(file.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reload_keeps_previous_snapshot_on_failure() {
        let file = write_registry(sample_json());
        let registry = AgentRegistry::load(file.path()).await.unwrap();

        std::fs::write(file.path(), "not json").unwrap();
        let result = registry.reload().await;
        assert!(result.is_err());

        let snapshot = registry.current().await;
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn reload_picks_up_fresh_agents() {
        let file = write_registry(sample_json());
        let registry = AgentRegistry::load(file.path()).await.unwrap();

        std::fs::write(
            file.path(),
            r#"[{"id": "new", "name": "New", "cmd": "x", "args": ["{prompt}"], "ramMB": 1}]"#,
        )
        .unwrap();
        registry.reload().await.unwrap();

        let snapshot = registry.current().await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("new").is_some());
    }
}
