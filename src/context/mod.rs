//! Context Pipeline: enriches a backlog project with README, file tree,
//! package manifest, and attached-document excerpts, then composes the
//! prompt handed to the LLM fallback chain. GitHub enrichment and document
//! fetches run concurrently — neither blocks the other, and a GitHub
//! failure or a missing link still yields a usable (shorter) prompt.

pub mod documents;
pub mod github;

use crate::constants::MAX_ATTACHED_DOCUMENTS;
use crate::models::BacklogProject;
use github::RepoContext;

const SYSTEM_INSTRUCTION: &str = "Du bist ein erfahrener Product Manager und Solutions \
    Architect. Deine Aufgabe ist es, aus den folgenden Projektinformationen eine \
    strukturierte Spezifikation sowie eine Liste konkreter Aufgaben abzuleiten.";

const OUTPUT_CONTRACT: &str = "Antworte ausschließlich mit einem einzigen JSON-Objekt der Form \
    {\"spec\": \"<Markdown-Spezifikation>\", \"tasks\": [{\"title\": \"...\", \"details\": \"...\"}]}. \
    Verwende keine Code-Fences und keinen zusätzlichen Text außerhalb des JSON-Objekts.";

/// Bounded, prompt-ready enrichment for a single backlog project.
pub struct ProjectContext {
    pub repo: Option<RepoContext>,
    pub document_sections: Vec<String>,
}

/// Gathers GitHub context and attached documents concurrently.
pub async fn gather(client: &reqwest::Client, project: &BacklogProject) -> ProjectContext {
    let repo_fut = async {
        let (owner, repo) = github::parse_owner_repo(project.github_link.as_deref()?)?;
        github::fetch_repo_context(client, &owner, &repo).await
    };

    let documents_fut = async {
        let mut sections = Vec::new();
        for doc in project.documents.iter().take(MAX_ATTACHED_DOCUMENTS) {
            sections.push(documents::render(client, doc).await);
        }
        sections
    };

    let (repo, document_sections) = tokio::join!(repo_fut, documents_fut);
    ProjectContext {
        repo,
        document_sections,
    }
}

/// Builds the full generation prompt from the project, its gathered
/// context, and the fixed instruction/contract framing.
pub fn build_prompt(project: &BacklogProject, context: &ProjectContext) -> String {
    let mut prompt = String::new();
    prompt.push_str(SYSTEM_INSTRUCTION);
    prompt.push_str("\n\n## Projekt\n");
    prompt.push_str(&format!("**Titel:** {}\n", project.title));
    prompt.push_str(&format!("**Beschreibung:** {}\n", project.description));
    if let Some(link) = &project.github_link {
        prompt.push_str(&format!("**Repository:** {link}\n"));
    }

    if let Some(repo) = &context.repo {
        prompt.push_str(&format!("\n## Repository-Kontext (Branch `{}`)\n", repo.branch));
        if let Some(readme) = &repo.readme {
            prompt.push_str("### README\n");
            prompt.push_str(readme);
            prompt.push('\n');
        }
        if let Some(tree) = &repo.file_tree {
            prompt.push_str("### Dateibaum\n");
            prompt.push_str(tree);
            prompt.push('\n');
        }
        if let Some(manifest) = &repo.manifest {
            prompt.push_str("### Manifest\n");
            if let Some(name) = &manifest.name {
                prompt.push_str(&format!("- name: {name}\n"));
            }
            if let Some(version) = &manifest.version {
                prompt.push_str(&format!("- version: {version}\n"));
            }
            prompt.push_str(&format!(
                "- dependencies: {}\n",
                manifest.dependencies.join(", ")
            ));
            prompt.push_str(&format!(
                "- devDependencies: {}\n",
                manifest.dev_dependencies.join(", ")
            ));
        }
    }

    if !context.document_sections.is_empty() {
        prompt.push_str("\n## Angehängte Dokumente\n");
        for section in &context.document_sections {
            prompt.push_str(section);
            prompt.push('\n');
        }
    }

    prompt.push_str("\n## Anforderung\n");
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_project() -> BacklogProject {
        BacklogProject {
            id: "p1".to_string(),
            title: "Demo".to_string(),
            description: "A demo project".to_string(),
            github_link: None,
            documents: vec![],
            spec_status: Default::default(),
            spec: None,
            spec_tasks: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prompt_includes_title_description_and_contract() {
        let project = sample_project();
        let context = ProjectContext {
            repo: None,
            document_sections: vec![],
        };
        let prompt = build_prompt(&project, &context);
        assert!(prompt.contains("Demo"));
        assert!(prompt.contains("A demo project"));
        assert!(prompt.contains("\"spec\""));
        assert!(prompt.contains("\"tasks\""));
    }

    #[test]
    fn prompt_includes_repo_context_when_present() {
        let project = sample_project();
        let context = ProjectContext {
            repo: Some(RepoContext {
                branch: "main".to_string(),
                readme: Some("# Demo readme".to_string()),
                file_tree: Some("src/main.rs".to_string()),
                manifest: None,
            }),
            document_sections: vec![],
        };
        let prompt = build_prompt(&project, &context);
        assert!(prompt.contains("# Demo readme"));
        assert!(prompt.contains("src/main.rs"));
    }

    #[tokio::test]
    async fn gather_returns_no_repo_when_link_is_absent() {
        let client = reqwest::Client::new();
        let project = sample_project();
        let context = gather(&client, &project).await;
        assert!(context.repo.is_none());
        assert!(context.document_sections.is_empty());
    }
}
