//! Attached-document rendering: inline content is taken as-is, remote
//! content is fetched and, if HTML, stripped down to text. A document we
//! can't retrieve becomes a placeholder section rather than a failed
//! generation — per-document failures are never fatal (spec.md 4.C.2).

use crate::constants::DOCUMENT_TRUNCATE_LENGTH;
use crate::context::github::truncate_with_ellipsis;
use crate::models::Document;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

const USER_AGENT: &str = "kanflow-core";
const DOCUMENT_FETCH_TIMEOUT_SECS: u64 = crate::constants::DOCUMENT_FETCH_TIMEOUT_SECS;

static SCRIPT_OR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</\1>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Renders a single document section, truncated and labeled, for inclusion
/// in the generation prompt.
pub async fn render(client: &reqwest::Client, doc: &Document) -> String {
    let body = resolve_body(client, doc).await;
    format!("### {}\n{}", doc.name, body)
}

async fn resolve_body(client: &reqwest::Client, doc: &Document) -> String {
    if let Some(content) = &doc.content {
        return truncate_with_ellipsis(content, DOCUMENT_TRUNCATE_LENGTH);
    }

    let Some(url) = &doc.url else {
        return "(no content available)".to_string();
    };

    if looks_like_pdf(url) {
        return format!("(PDF document, not decoded — see {url})");
    }

    match fetch(client, url).await {
        Some((content_type, body)) => {
            let text = if content_type.contains("html") {
                strip_html(&body)
            } else {
                body
            };
            truncate_with_ellipsis(&text, DOCUMENT_TRUNCATE_LENGTH)
        }
        None => format!("(failed to fetch document — see {url})"),
    }
}

fn looks_like_pdf(url: &str) -> bool {
    url.to_lowercase().ends_with(".pdf")
}

async fn fetch(client: &reqwest::Client, url: &str) -> Option<(String, String)> {
    let response = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .timeout(Duration::from_secs(DOCUMENT_FETCH_TIMEOUT_SECS))
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    let body = response.text().await.ok()?;
    Some((content_type, body))
}

/// Removes script/style blocks first (so their contents don't leak into the
/// stripped text), then every remaining tag, then collapses whitespace.
fn strip_html(html: &str) -> String {
    let without_scripts = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = ANY_TAG.replace_all(&without_scripts, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_blocks_entirely() {
        let html = "<html><head><style>.a{color:red}</style></head><body><script>evil()</script><p>Hello</p></body></html>";
        assert_eq!(strip_html(html), "Hello");
    }

    #[test]
    fn collapses_whitespace_after_tag_removal() {
        let html = "<p>Hello</p>\n\n<p>World</p>";
        assert_eq!(strip_html(html), "Hello World");
    }

    #[test]
    fn pdf_urls_are_referenced_not_fetched() {
        assert!(looks_like_pdf("https://example.com/spec.PDF"));
        assert!(!looks_like_pdf("https://example.com/spec.md"));
    }

    #[tokio::test]
    async fn inline_content_is_used_without_a_network_call() {
        let client = reqwest::Client::new();
        let doc = Document {
            name: "notes".to_string(),
            url: None,
            content: Some("inline text".to_string()),
        };
        let rendered = render(&client, &doc).await;
        assert_eq!(rendered, "### notes\ninline text");
    }

    #[tokio::test]
    async fn missing_content_and_url_is_a_placeholder() {
        let client = reqwest::Client::new();
        let doc = Document {
            name: "empty".to_string(),
            url: None,
            content: None,
        };
        let rendered = render(&client, &doc).await;
        assert!(rendered.contains("no content available"));
    }

    #[tokio::test]
    async fn html_document_is_fetched_and_stripped() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/doc.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>Hello <b>world</b></p>")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let doc = Document {
            name: "doc".to_string(),
            url: Some(format!("{}/doc.html", server.url())),
            content: None,
        };
        let rendered = render(&client, &doc).await;
        assert!(rendered.contains("Hello world"));
    }

    #[tokio::test]
    async fn fetch_failure_becomes_a_placeholder_not_a_panic() {
        let client = reqwest::Client::new();
        let doc = Document {
            name: "doc".to_string(),
            url: Some("http://127.0.0.1:1/unreachable".to_string()),
            content: None,
        };
        let rendered = render(&client, &doc).await;
        assert!(rendered.contains("failed to fetch"));
    }
}
