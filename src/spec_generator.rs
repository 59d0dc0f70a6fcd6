//! Spec Generator Loop: polls the backlog every 10 s, dedupes in-flight
//! projects, and fires off Context → LLM → Extractor → `updateBacklog` for
//! each newly-generating project without awaiting the result. Mirrors the
//! teacher's monitoring loop shape (`interval.tick()` raced against a
//! shutdown signal inside a spawned task) but fans each tick's work out into
//! detached per-project tasks instead of awaiting a single collector.

use crate::board::BoardStore;
use crate::config::Config;
use crate::constants::{SPEC_GENERATION_REAP_AFTER_SECS, SPEC_GENERATOR_POLL_INTERVAL_SECS};
use crate::context;
use crate::extract::extract_spec_output;
use crate::llm::FallbackChain;
use crate::models::{BacklogPatch, SpecStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub struct SpecGenerator {
    store: Arc<dyn BoardStore>,
    http_client: reqwest::Client,
    llm: Arc<FallbackChain>,
    in_flight: Mutex<HashMap<String, Instant>>,
}

impl SpecGenerator {
    pub fn new(store: Arc<dyn BoardStore>, llm: Arc<FallbackChain>) -> Self {
        Self {
            store,
            http_client: reqwest::Client::new(),
            llm,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs the poll loop until `shutdown` fires. Each tick's eligible
    /// projects are dispatched as detached tasks; the loop itself never
    /// awaits a generation to completion.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(SPEC_GENERATOR_POLL_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.clone().tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("spec generator loop shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(self: Arc<Self>) {
        self.reap_stale_entries();

        let backlog = match self.store.list_backlog().await {
            Ok(backlog) => backlog,
            Err(err) => {
                tracing::warn!(error = %err, "spec generator: failed to list backlog");
                return;
            }
        };

        for project in backlog {
            if project.spec_status != SpecStatus::Generating {
                continue;
            }
            let already_running = {
                let in_flight = self.in_flight.lock().unwrap();
                in_flight.contains_key(&project.id)
            };
            if already_running {
                continue;
            }
            self.in_flight.lock().unwrap().insert(project.id.clone(), Instant::now());

            let generator = self.clone();
            let project_id = project.id.clone();
            tokio::spawn(async move {
                generator.generate(project).await;
                generator.in_flight.lock().unwrap().remove(&project_id);
            });
        }
    }

    fn reap_stale_entries(&self) {
        let cutoff = Duration::from_secs(SPEC_GENERATION_REAP_AFTER_SECS as u64);
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight.retain(|id, started| {
            let alive = started.elapsed() < cutoff;
            if !alive {
                tracing::warn!(project_id = %id, "spec generation abandoned, freeing for retry");
            }
            alive
        });
    }

    async fn generate(&self, project: crate::models::BacklogProject) {
        let context = context::gather(&self.http_client, &project).await;
        let prompt = context::build_prompt(&project, &context);

        let outcome = self.llm.complete("", &prompt).await;
        let patch = match outcome {
            Ok(completion) => match extract_spec_output(&completion.text) {
                Some(extraction) => BacklogPatch {
                    spec_status: Some(SpecStatus::Ready),
                    spec: Some(extraction.spec),
                    spec_tasks: Some(extraction.tasks),
                },
                None => {
                    tracing::warn!(project_id = %project.id, raw = %completion.text, "failed to extract spec/tasks from model output");
                    BacklogPatch {
                        spec_status: Some(SpecStatus::Error),
                        spec: Some("Failed to parse model output into a spec.".to_string()),
                        spec_tasks: None,
                    }
                }
            },
            Err(err) => {
                tracing::warn!(project_id = %project.id, error = %err, "spec generation failed");
                BacklogPatch {
                    spec_status: Some(SpecStatus::Error),
                    spec: Some(format!("Generation failed: {err}")),
                    spec_tasks: None,
                }
            }
        };

        if let Err(err) = self.store.update_backlog(&project.id, patch).await {
            tracing::warn!(project_id = %project.id, error = %err, "failed to write back spec generation result");
        }
    }
}

/// Constructs the generator from process configuration.
pub fn build(config: &Config, store: Arc<dyn BoardStore>) -> Arc<SpecGenerator> {
    let llm = Arc::new(FallbackChain::from_config(&config.llm));
    Arc::new(SpecGenerator::new(store, llm))
}
