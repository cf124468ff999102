mod logging;

use clap::Parser;
use dep_harvester::config::{DEFAULT_INDEX_URL, INDEX_URL_ENV};
use dep_harvester::render::{render_tree, GraphRenderer};
use dep_harvester::{CrawlConfig, CrawlScheduler, PackageName};
use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "dep-harvester")]
#[command(author, version, about = "Crawl the transitive dependencies of a Python package", long_about = None)]
struct Cli {
    /// Package to crawl (prompted for when omitted)
    package: Option<String>,

    /// Also follow dependencies that only apply to optional extras
    #[arg(long)]
    include_extras: bool,

    /// Index listing page template; `{name}` is replaced by the package name
    #[arg(
        long,
        env = INDEX_URL_ENV,
        default_value = DEFAULT_INDEX_URL
    )]
    index_url: String,

    /// Directory for downloaded artifacts (also the artifact cache)
    #[arg(long, value_name = "PATH", default_value = ".")]
    work_dir: PathBuf,

    /// Print the dependency graph as JSON instead of a tree
    #[arg(long)]
    json: bool,

    /// Write a Graphviz description named after the root package
    #[arg(long)]
    graph: bool,

    /// Render the graph with Graphviz `dot` into this format (implies --graph)
    #[arg(long, value_name = "FORMAT")]
    render: Option<String>,

    /// Open the rendered graph in the system viewer
    #[arg(long, requires = "render")]
    view: bool,

    /// Per-stage timeout in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush().into_diagnostic()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).into_diagnostic()?;
    Ok(line)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let raw = match cli.package {
        Some(package) => package,
        None => prompt("Enter package to download: ")?,
    };
    let Some(root) = PackageName::new(raw.trim()) else {
        miette::bail!("'{}' is not a valid package name", raw.trim());
    };

    std::fs::create_dir_all(&cli.work_dir).into_diagnostic()?;
    let config = CrawlConfig::default()
        .with_index_url(cli.index_url)
        .with_work_dir(&cli.work_dir)
        .with_extras(cli.include_extras)
        .with_timeout(Duration::from_secs(cli.timeout));

    let scheduler = CrawlScheduler::from_config(&config).into_diagnostic()?;
    let report = scheduler.crawl(root, config.include_extras).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report.graph).into_diagnostic()?
        );
    } else {
        match report.root_artifact() {
            Some(path) => println!("Saved main file as {}", path.display()),
            None => println!("Saved main file as None"),
        }
        println!("Dependency tree:");
        print!("{}", render_tree(&report.graph));
    }

    if cli.graph || cli.render.is_some() {
        let renderer = GraphRenderer::new(&cli.work_dir)
            .with_format(cli.render)
            .with_view(cli.view);
        match renderer.render(&report.graph).await {
            Ok(path) => eprintln!("Graph written to {}", path.display()),
            Err(e) => warn!(error = %e, "Graph rendering failed"),
        }
    }

    Ok(())
}
