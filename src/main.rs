use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use git_archaeologist::config::Config;
use git_archaeologist::context::{render_context, render_prompt};
use git_archaeologist::mcp_server::ArchaeologistMcpServer;
use git_archaeologist::pipeline::{BuildControl, BuildReport, RepositorySource};
use git_archaeologist::session::Session;
use git_archaeologist::types::CommitHit;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(name = "git-archaeologist", version = VERSION, about)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "ARCHAEOLOGIST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio (default)
    Serve,
    /// Analyze a repository, then answer questions interactively
    Chat {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Analyze a repository and print the commits matching one query
    Search {
        /// Question or search phrase
        query: String,
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Local repository path
    #[arg(long, conflicts_with = "url")]
    path: Option<PathBuf>,
    /// Remote repository to clone into the session
    #[arg(long)]
    url: Option<String>,
    /// Clone depth for --url (0 = full history)
    #[arg(long, requires = "url")]
    depth: Option<u32>,
    /// Branch to analyze
    #[arg(long)]
    branch: Option<String>,
    /// Most-recent commits to index (0 = all)
    #[arg(long)]
    commit_limit: Option<usize>,
    /// Commits retrieved per question
    #[arg(long, short = 'k')]
    top: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => ArchaeologistMcpServer::serve_stdio(config).await?,
        Commands::Chat { source } => with_session(config, |session| chat(session, source)).await?,
        Commands::Search { query, source } => {
            with_session(config, |session| search_once(session, source, query)).await?
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Run `task` against a fresh session, tearing it down on completion or Ctrl-C
async fn with_session<F, Fut>(config: Config, task: F) -> Result<()>
where
    F: FnOnce(std::sync::Arc<Session>) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let session = std::sync::Arc::new(Session::open(config).await?);

    let result = tokio::select! {
        result = task(session.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    session
        .teardown()
        .await
        .context("Failed to tear down session")?;
    result
}

async fn analyze(session: &Session, source: &SourceArgs) -> Result<BuildReport> {
    let path = match (&source.path, &source.url) {
        (_, Some(url)) => session.clone_repository(url, source.depth).await?,
        (Some(path), None) => path.clone(),
        (None, None) => std::env::current_dir().context("Failed to read current directory")?,
    };
    let branch = source
        .branch
        .clone()
        .unwrap_or_else(|| session.config().extraction.branch.clone());
    let options = session.extraction_options(source.commit_limit)?;

    eprintln!("Analyzing {} ({})...", path.display(), branch);
    let report = session
        .analyze(
            &RepositorySource::new(path, branch),
            &options,
            BuildControl::default(),
        )
        .await?;
    eprintln!(
        "Indexed {} commits from '{}' in {}ms",
        report.commits_indexed, report.branch, report.duration_ms
    );
    Ok(report)
}

fn print_hits(hits: &[CommitHit]) {
    if hits.is_empty() {
        println!("No matching commits.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        let short = hit.hash.get(..8).unwrap_or(&hit.hash);
        let subject = hit
            .content
            .lines()
            .find_map(|line| line.strip_prefix("Message: "))
            .unwrap_or("");
        println!(
            "{}. {} {} {} (score {:.3})\n   {}",
            i + 1,
            short,
            hit.date,
            hit.author,
            hit.score,
            subject
        );
    }
}

async fn search_once(
    session: std::sync::Arc<Session>,
    source: SourceArgs,
    query: String,
) -> Result<()> {
    analyze(&session, &source).await?;
    let config = session.config();
    let hits = session
        .search(
            &query,
            source.top.unwrap_or(config.search.limit),
            config.search.min_score,
        )
        .await?;
    print_hits(&hits);
    Ok(())
}

async fn chat(session: std::sync::Arc<Session>, source: SourceArgs) -> Result<()> {
    analyze(&session, &source).await?;
    let top = source.top.unwrap_or(session.config().search.limit);
    if top == 0 {
        bail!("--top must be greater than 0");
    }
    let min_score = session.config().search.min_score;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nquestion> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match session.search(question, top, min_score).await {
            Ok(hits) => {
                print_hits(&hits);
                println!("\n{}", render_prompt(question, &render_context(&hits)));
            }
            Err(e) => eprintln!("Error: {}", e.to_user_string()),
        }
    }

    Ok(())
}
