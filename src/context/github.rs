//! GitHub-derived project context: README, recursive file tree, and package
//! manifest, fetched straight from the public REST/raw-content surfaces (no
//! local clone). Grounded on the same URL-parsing shape the pack's own
//! GitHub client uses for repo slugs, adapted from device-flow auth to
//! anonymous raw-content reads.

use crate::constants::{
    FILE_TREE_MAX_ENTRIES, GITHUB_BRANCHES, GITHUB_FETCH_TIMEOUT_SECS, README_TRUNCATE_LENGTH,
};
use std::time::Duration;

const USER_AGENT: &str = "kanflow-core";

#[derive(Debug, Clone, Default)]
pub struct RepoContext {
    pub branch: String,
    pub readme: Option<String>,
    pub file_tree: Option<String>,
    pub manifest: Option<ManifestSummary>,
}

#[derive(Debug, Clone)]
pub struct ManifestSummary {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
}

/// Extracts `owner/repo` from a GitHub URL, tolerating a trailing `.git`
/// and any path segments after the repo name.
pub fn parse_owner_repo(link: &str) -> Option<(String, String)> {
    let idx = link.find("github.com/")?;
    let rest = &link[idx + "github.com/".len()..];
    let mut segments = rest.splitn(3, '/');
    let owner = segments.next()?;
    let repo = segments.next()?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    Some((owner.to_string(), repo.to_string()))
}

/// Tries each candidate branch in order, stopping at the first one whose
/// README actually exists; the tree and manifest are then fetched from
/// that same branch.
pub async fn fetch_repo_context(client: &reqwest::Client, owner: &str, repo: &str) -> Option<RepoContext> {
    for branch in GITHUB_BRANCHES {
        if let Some(readme) = fetch_readme(client, owner, repo, branch).await {
            let file_tree = fetch_file_tree(client, owner, repo, branch).await;
            let manifest = fetch_manifest(client, owner, repo, branch).await;
            return Some(RepoContext {
                branch: branch.to_string(),
                readme: Some(readme),
                file_tree,
                manifest,
            });
        }
    }
    None
}

async fn fetch_readme(client: &reqwest::Client, owner: &str, repo: &str, branch: &str) -> Option<String> {
    let url = format!("https://raw.githubusercontent.com/{owner}/{repo}/{branch}/README.md");
    let body = get_text(client, &url).await?;
    Some(truncate_with_ellipsis(&body, README_TRUNCATE_LENGTH))
}

async fn fetch_file_tree(client: &reqwest::Client, owner: &str, repo: &str, branch: &str) -> Option<String> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/git/trees/{branch}?recursive=1");
    let response = client
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .timeout(Duration::from_secs(GITHUB_FETCH_TIMEOUT_SECS))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let parsed: TreeResponse = response.json().await.ok()?;
    let paths: Vec<&str> = parsed.tree.iter().map(|e| e.path.as_str()).collect();
    Some(render_file_tree(&paths))
}

fn render_file_tree(paths: &[&str]) -> String {
    if paths.len() <= FILE_TREE_MAX_ENTRIES {
        return paths.join("\n");
    }
    let shown = paths[..FILE_TREE_MAX_ENTRIES].join("\n");
    let remaining = paths.len() - FILE_TREE_MAX_ENTRIES;
    format!("{shown}\n... and {remaining} more entries")
}

async fn fetch_manifest(
    client: &reqwest::Client,
    owner: &str,
    repo: &str,
    branch: &str,
) -> Option<ManifestSummary> {
    let url = format!("https://raw.githubusercontent.com/{owner}/{repo}/{branch}/package.json");
    let body = get_text(client, &url).await?;
    let value: serde_json::Value = serde_json::from_str(&body).ok()?;
    Some(ManifestSummary {
        name: value.get("name").and_then(|v| v.as_str()).map(str::to_string),
        version: value.get("version").and_then(|v| v.as_str()).map(str::to_string),
        dependencies: object_keys(&value, "dependencies"),
        dev_dependencies: object_keys(&value, "devDependencies"),
    })
}

fn object_keys(value: &serde_json::Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(|v| v.as_object())
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

async fn get_text(client: &reqwest::Client, url: &str) -> Option<String> {
    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .timeout(Duration::from_secs(GITHUB_FETCH_TIMEOUT_SECS))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

pub(crate) fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(limit).collect();
        format!("{truncated}…")
    }
}

#[derive(serde::Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(serde::Deserialize)]
struct TreeEntry {
    path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_github_url() {
        assert_eq!(
            parse_owner_repo("https://github.com/owner/repo"),
            Some(("owner".to_string(), "repo".to_string()))
        );
    }

    #[test]
    fn parses_url_with_git_suffix() {
        assert_eq!(
            parse_owner_repo("https://github.com/owner/repo.git"),
            Some(("owner".to_string(), "repo".to_string()))
        );
    }

    #[test]
    fn parses_url_with_trailing_path() {
        assert_eq!(
            parse_owner_repo("https://github.com/owner/repo/tree/main"),
            Some(("owner".to_string(), "repo".to_string()))
        );
    }

    #[test]
    fn returns_none_for_non_github_link() {
        assert_eq!(parse_owner_repo("https://gitlab.com/owner/repo"), None);
    }

    #[test]
    fn returns_none_when_repo_segment_missing() {
        assert_eq!(parse_owner_repo("https://github.com/owner"), None);
    }

    #[test]
    fn readme_at_exactly_the_limit_is_not_truncated() {
        let text = "a".repeat(README_TRUNCATE_LENGTH);
        assert_eq!(truncate_with_ellipsis(&text, README_TRUNCATE_LENGTH), text);
    }

    #[test]
    fn readme_one_over_the_limit_is_truncated_with_ellipsis() {
        let text = "a".repeat(README_TRUNCATE_LENGTH + 1);
        let truncated = truncate_with_ellipsis(&text, README_TRUNCATE_LENGTH);
        assert_eq!(truncated.chars().count(), README_TRUNCATE_LENGTH + 1);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn file_tree_with_max_entries_shows_all() {
        let paths: Vec<&str> = (0..FILE_TREE_MAX_ENTRIES).map(|_| "file.rs").collect();
        let rendered = render_file_tree(&paths);
        assert_eq!(rendered.lines().count(), FILE_TREE_MAX_ENTRIES);
    }

    #[test]
    fn file_tree_beyond_max_entries_has_a_summary_tail() {
        let paths: Vec<&str> = (0..FILE_TREE_MAX_ENTRIES + 1).map(|_| "file.rs").collect();
        let rendered = render_file_tree(&paths);
        assert_eq!(rendered.lines().count(), FILE_TREE_MAX_ENTRIES + 1);
        assert!(rendered.ends_with("and 1 more entries"));
    }

    #[test]
    fn manifest_reduces_to_name_version_and_dependency_keys() {
        let value: serde_json::Value = serde_json::from_str(
            r#"{"name":"demo","version":"1.0.0","dependencies":{"a":"1.0"},"devDependencies":{"b":"2.0"}}"#,
        )
        .unwrap();
        assert_eq!(object_keys(&value, "dependencies"), vec!["a".to_string()]);
        assert_eq!(object_keys(&value, "devDependencies"), vec!["b".to_string()]);
    }
}
