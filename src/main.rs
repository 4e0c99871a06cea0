use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use aeo_scoring::domain::{PageContent, PageMetadata, ProjectContext};
use aeo_scoring::lifecycle::init_logging;
use aeo_scoring::repository::{KeyValueStore, MemoryStore, SqliteStore};
use aeo_scoring::service::llm::{DisabledLlm, HttpLlmClient, LlmClient};
use aeo_scoring::{ContentKpiEngine, ScoringConfig};

#[derive(Parser)]
#[command(name = "aeo-score", version, about = "Score pages and domains for answer-engine visibility")]
struct Cli {
    /// JSON scoring configuration; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// sqlx sqlite URL for persisted results (e.g. sqlite://scores.db)
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a single HTML file
    Page {
        /// Page URL the HTML was fetched from
        #[arg(long)]
        url: String,
        /// HTML file to score
        file: PathBuf,
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Score a directory of *.html files as one domain
    Domain {
        /// Domain the pages belong to
        #[arg(long)]
        domain: String,
        #[arg(long, default_value = "default")]
        project_id: String,
        /// Ignore any cached analysis and recompute
        #[arg(long)]
        refresh: bool,
        /// Directory whose *.html files map to https://<domain>/<relative path>
        dir: PathBuf,
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Args)]
struct ProjectArgs {
    #[arg(long)]
    brand: Option<String>,
    #[arg(long = "keyword")]
    keywords: Vec<String>,
    #[arg(long = "competitor")]
    competitors: Vec<String>,
    #[arg(long = "attribute")]
    attributes: Vec<String>,
}

impl From<ProjectArgs> for ProjectContext {
    fn from(args: ProjectArgs) -> Self {
        ProjectContext {
            brand_name: args.brand.filter(|b| !b.trim().is_empty()),
            key_attributes: args.attributes,
            keywords: args.keywords,
            competitors: args.competitors,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ScoringConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ScoringConfig::default(),
    };
    let store: Arc<dyn KeyValueStore> = match &cli.store {
        Some(url) => Arc::new(
            SqliteStore::connect(url)
                .await
                .with_context(|| format!("Failed to open store {url}"))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let http = HttpLlmClient::from_env();
    let llm: Arc<dyn LlmClient> = if http.is_configured() {
        Arc::new(http)
    } else {
        tracing::warn!("No GEMINI_API_KEY or PERPLEXITY_API_KEY set, LLM rules will degrade");
        Arc::new(DisabledLlm)
    };

    let engine = ContentKpiEngine::builder()
        .config(config)
        .llm(llm)
        .store(store)
        .build()
        .context("Failed to build scoring engine")?;

    let output = match cli.command {
        Command::Page { url, file, project } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let score = engine
                .evaluate_page(&url, &html, PageMetadata::default(), &project.into())
                .await
                .with_context(|| format!("Failed to score {url}"))?;
            serde_json::to_string_pretty(&score)?
        }
        Command::Domain {
            domain,
            project_id,
            refresh,
            dir,
            project,
        } => {
            let pages = load_pages(&domain, &dir)?;
            tracing::info!("Loaded {} pages from {}", pages.len(), dir.display());
            let result = if refresh {
                engine.refresh_domain(&domain, &project_id, project.into(), pages).await
            } else {
                engine.evaluate_domain(&domain, &project_id, project.into(), pages).await
            }
            .with_context(|| format!("Failed to analyze {domain}"))?;
            serde_json::to_string_pretty(&result)?
        }
    };

    println!("{output}");
    Ok(())
}

/// Every `*.html` file under `dir`, keyed by the URL it would be served at.
fn load_pages(domain: &str, dir: &Path) -> Result<Vec<PageContent>> {
    let mut files = Vec::new();
    collect_html_files(dir, &mut files)?;
    files.sort();

    files
        .into_iter()
        .map(|file| {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            Ok(PageContent::new(page_url(domain, dir, &file), html))
        })
        .collect()
}

fn collect_html_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_html_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("html")) {
            files.push(path);
        }
    }
    Ok(())
}

/// `blog/post.html` -> `https://<domain>/blog/post`, `index.html` -> `https://<domain>/`.
fn page_url(domain: &str, root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.last().is_some_and(|s| s == "index") {
        segments.pop();
    }
    format!("https://{}/{}", domain.trim_end_matches('/'), segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_map_to_urls() {
        let root = Path::new("/site");
        assert_eq!(page_url("example.com", root, Path::new("/site/index.html")), "https://example.com/");
        assert_eq!(
            page_url("example.com", root, Path::new("/site/blog/post.html")),
            "https://example.com/blog/post"
        );
        assert_eq!(
            page_url("example.com", root, Path::new("/site/docs/index.html")),
            "https://example.com/docs"
        );
    }

    #[test]
    fn pages_are_loaded_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("blog").join("post.html"), "<html><h1>x</h1></html>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let pages = load_pages("example.com", dir.path()).unwrap();
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/blog/post", "https://example.com/"]);
    }

    #[test]
    fn cli_parses_project_flags() {
        let cli = Cli::parse_from([
            "aeo-score", "page", "--url", "https://example.com/", "--brand", "Acme", "--keyword", "widgets",
            "--keyword", "gadgets", "page.html",
        ]);
        let Command::Page { project, .. } = cli.command else {
            panic!("expected page command");
        };
        let project = ProjectContext::from(project);
        assert_eq!(project.brand_name.as_deref(), Some("Acme"));
        assert_eq!(project.keywords, vec!["widgets", "gadgets"]);
    }
}
