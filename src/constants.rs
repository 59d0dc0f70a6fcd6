//! System-wide tunables. Centralized so the runner and generator loops agree
//! on timeouts and limits without magic numbers scattered through the code.

// Poll intervals
pub const SPEC_GENERATOR_POLL_INTERVAL_SECS: u64 = 10;
pub const TASK_RUNNER_POLL_INTERVAL_SECS: u64 = 15;

/// In-flight spec generations older than this are considered abandoned and
/// become eligible for retry on the next tick.
pub const SPEC_GENERATION_REAP_AFTER_SECS: i64 = 300;

// Board HTTP client
pub const BOARD_REQUEST_TIMEOUT_SECS: u64 = 30;

// LLM fallback chain
pub const PRIMARY_LLM_TIMEOUT_SECS: u64 = 120;
pub const FALLBACK_LLM_TIMEOUT_SECS: u64 = 180;
pub const LLM_TEMPERATURE: f32 = 0.7;
pub const LLM_MAX_OUTPUT_TOKENS: u32 = 8192;

// Context pipeline
pub const README_TRUNCATE_LENGTH: usize = 2500;
pub const FILE_TREE_MAX_ENTRIES: usize = 40;
pub const DOCUMENT_TRUNCATE_LENGTH: usize = 3000;
pub const MAX_ATTACHED_DOCUMENTS: usize = 5;
pub const DOCUMENT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const GITHUB_FETCH_TIMEOUT_SECS: u64 = 10;
pub const GITHUB_BRANCHES: &[&str] = &["main", "master"];

// Task supervisor
pub const AGENT_TIMEOUT_SECS: u64 = 600;
pub const AGENT_KILL_GRACE_SECS: u64 = 5;
pub const AGENT_OUTPUT_CAP_BYTES: usize = 10 * 1024 * 1024;

// Result archiver
pub const RESULT_SUMMARY_MAX_CHARS: usize = 500;
pub const AGENT_META_RESULT_SUMMARY_MAX_CHARS: usize = 2000;
pub const SYNTHESIZED_RESULT_TAIL_LINES: usize = 20;

// Task runner scheduling
pub const DEFAULT_MAX_CONCURRENT_AGENTS: usize = 1;
pub const DEFAULT_GLOBAL_RAM_FLOOR_MB: u64 = 400;
pub const MAX_TASK_ATTEMPTS: u32 = 3;

// Shutdown
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

// Workflow column titles, in bootstrap order relative to `Done`.
pub const COLUMN_QUEUE: &str = "Queue";
pub const COLUMN_AGENT_WIP: &str = "Agent WIP";
pub const COLUMN_REVIEW: &str = "Review";
pub const COLUMN_DONE: &str = "Done";

/// Sentinel separating the user-visible description from the embedded
/// agent-meta JSON block.
pub const AGENT_META_SENTINEL: &str = "---agent-meta---";

/// Agent id used when the router exhausts every other fallback.
pub const HARDCODED_FALLBACK_AGENT_ID: &str = "default";
