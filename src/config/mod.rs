use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub board: BoardConfig,
    pub llm: LlmConfig,
    pub runner: RunnerConfig,
    pub api: ApiConfig,
    pub paths: PathsConfig,
}

/// Which [`crate::board::BoardStore`] implementation to construct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub mode: BoardMode,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub local_file_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardMode {
    Remote,
    LocalFile,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub primary_api_key: Option<String>,
    pub primary_base_url: String,
    pub primary_model: String,
    pub fallback_api_key: Option<String>,
    pub fallback_base_url: String,
    pub fallback_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub max_concurrent_agents: usize,
    pub global_ram_floor_mb: u64,
    pub agent_registry_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub workspaces_dir: String,
    pub results_dir: String,
    pub exports_dir: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("loaded .env file from: {:?}", path),
            Err(e) => tracing::debug!("no .env file loaded: {}", e),
        }

        let mode = match env::var("BOARD_MODE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "remote" => BoardMode::Remote,
            "local-file" | "local_file" => BoardMode::LocalFile,
            "memory" => BoardMode::Memory,
            other => {
                return Err(CoreError::Config(format!(
                    "unknown BOARD_MODE '{other}' (expected remote, local-file, or memory)"
                )))
            }
        };

        if mode == BoardMode::Remote && env::var("BOARD_BASE_URL").is_err() {
            return Err(CoreError::Config(
                "BOARD_BASE_URL is required when BOARD_MODE=remote".to_string(),
            ));
        }

        let board = BoardConfig {
            mode,
            base_url: env::var("BOARD_BASE_URL").ok(),
            token: env::var("BOARD_TOKEN").ok(),
            local_file_path: env::var("BOARD_LOCAL_FILE_PATH")
                .ok()
                .or_else(|| Some("board.json".to_string())),
        };

        let llm = LlmConfig {
            primary_api_key: env::var("PRIMARY_LLM_API_KEY").ok(),
            primary_base_url: env::var("PRIMARY_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            primary_model: env::var("PRIMARY_LLM_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5".to_string()),
            fallback_api_key: env::var("FALLBACK_LLM_API_KEY").ok(),
            fallback_base_url: env::var("FALLBACK_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            fallback_model: env::var("FALLBACK_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
        };

        let runner = RunnerConfig {
            max_concurrent_agents: env::var("MAX_CONCURRENT_AGENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::constants::DEFAULT_MAX_CONCURRENT_AGENTS),
            global_ram_floor_mb: env::var("GLOBAL_RAM_FLOOR_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::constants::DEFAULT_GLOBAL_RAM_FLOOR_MB),
            agent_registry_path: env::var("AGENT_REGISTRY_PATH")
                .unwrap_or_else(|_| "agents.json".to_string()),
        };

        let api = ApiConfig {
            host: env::var("HEALTH_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3300),
        };

        let paths = PathsConfig {
            workspaces_dir: env::var("WORKSPACES_DIR").unwrap_or_else(|_| "workspaces".to_string()),
            results_dir: env::var("RESULTS_DIR").unwrap_or_else(|_| "results".to_string()),
            exports_dir: env::var("EXPORTS_DIR").unwrap_or_else(|_| "exports".to_string()),
        };

        Ok(Config {
            board,
            llm,
            runner,
            api,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        for key in [
            "BOARD_MODE",
            "BOARD_BASE_URL",
            "BOARD_TOKEN",
            "MAX_CONCURRENT_AGENTS",
            "GLOBAL_RAM_FLOOR_MB",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_to_memory_board_with_no_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        let config = Config::load().expect("config should load with no env set");
        assert_eq!(config.board.mode, BoardMode::Memory);
        assert_eq!(
            config.runner.max_concurrent_agents,
            crate::constants::DEFAULT_MAX_CONCURRENT_AGENTS
        );
    }

    #[test]
    fn remote_mode_requires_base_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("BOARD_MODE", "remote");
        let result = Config::load();
        assert!(result.is_err());
        clear();
    }

    #[test]
    fn remote_mode_with_base_url_succeeds() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        env::set_var("BOARD_MODE", "remote");
        env::set_var("BOARD_BASE_URL", "https://board.example.com");
        let config = Config::load().expect("config should load");
        assert_eq!(config.board.mode, BoardMode::Remote);
        clear();
    }
}
