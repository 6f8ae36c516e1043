//! go2web CLI - HTTP requests and web search from the terminal
//!
//! A command-line interface over the go2web library.

use anyhow::{Context, anyhow};
use clap::{ArgGroup, CommandFactory, Parser, error::ErrorKind};
use colored::Colorize;
use go2web::{
    APP_NAME, VERSION,
    cache::{CacheConfig, ResponseCache, default_cache_path},
    tools::{DEFAULT_MAX_REDIRECTS, FetchClient, FetchConfig, SearchClient},
    transport::SocketTransport,
    types::SearchOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

/// go2web - make HTTP requests and search the web from the terminal
#[derive(Parser, Debug)]
#[command(
    name = APP_NAME,
    version = VERSION,
    about = "Make HTTP requests and search the web from the terminal",
    long_about = "go2web sends HTTP/1.1 requests over raw TCP/TLS sockets and prints a readable\n\
                  rendering of the response: page title, headings, paragraphs and links for HTML,\n\
                  a bounded summary for JSON, and the start of the body for anything else.\n\n\
                  Responses are cached for one hour."
)]
#[command(group(ArgGroup::new("action").required(true).args(["url", "search"])))]
struct Cli {
    /// Make an HTTP request to the URL and print the response
    #[arg(short = 'u', long, value_name = "URL")]
    url: Option<String>,

    /// Search the term and print the top 10 results
    #[arg(short = 's', long, value_name = "TERM", num_args = 1..)]
    search: Option<Vec<String>>,

    /// After searching, fetch and print the Nth result
    #[arg(short = 'o', long, value_name = "N", requires = "search")]
    open: Option<usize>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Maximum number of redirects to follow
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Cache file location
    #[arg(long, env = "GO2WEB_CACHE", value_name = "PATH")]
    cache_file: Option<PathBuf>,

    /// Bypass the response cache
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable all logging output
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    /// Argument combinations the derive attributes do not reject
    fn validate(&self) -> Result<(), clap::Error> {
        if self.open.is_some() && self.search.is_none() {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "--open needs a search: pass -s <TERM>",
            ));
        }
        Ok(())
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Set up logging on stderr so stdout carries only results
///
/// # Arguments
/// * `verbose` - Enable debug-level logging
/// * `quiet` - Disable all logging output
fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

fn print_section(title: &str) {
    println!("\n{}", title.yellow().bold());
    println!("{}", "─".repeat(40).bright_black());
}

fn print_lines(lines: &[String]) {
    for line in lines {
        if let Some(title) = line.strip_prefix("Title: ") {
            println!("{} {}", "Title:".bright_blue(), title.white().bold());
        } else if line.starts_with('#') {
            println!("{}", line.yellow().bold());
        } else if line.starts_with("Error: ") {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
}

fn print_search(term: &str, outcome: &SearchOutcome) {
    print_section(&format!("Search results for: {}", term.cyan()));

    for entry in &outcome.results {
        let mut lines = entry.lines();
        if let Some(headline) = lines.next() {
            if headline.starts_with("Error: ") {
                println!("{}", headline.red());
            } else {
                println!("{}", headline.white().bold());
            }
        }
        if let Some(url) = lines.next() {
            println!("{}", url.bright_blue().underline());
        }
        for rest in lines {
            println!("{}", rest.bright_white());
        }
        println!();
    }
}

fn build_fetcher(cli: &Cli) -> anyhow::Result<FetchClient> {
    let cache_config = if cli.no_cache {
        CacheConfig {
            enabled: false,
            path: None,
            ..Default::default()
        }
    } else {
        CacheConfig {
            path: cli.cache_file.clone().or_else(default_cache_path),
            ..Default::default()
        }
    };

    let transport = SocketTransport::new().context("Failed to initialize transport")?;

    Ok(FetchClient::from_parts(
        Arc::new(transport),
        Arc::new(ResponseCache::new(cache_config)),
        FetchConfig {
            max_redirects: cli.max_redirects,
            extra_headers: cli.headers.clone(),
        },
    ))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let fetcher = build_fetcher(&cli)?;

    if let Some(url) = &cli.url {
        print_lines(&fetcher.fetch(url).await);
    }

    if let Some(terms) = &cli.search {
        let term = terms.join(" ");
        let search = SearchClient::from_fetcher(fetcher.clone());
        let outcome = search.search(&term).await;
        print_search(&term, &outcome);

        if let Some(n) = cli.open {
            let url = n
                .checked_sub(1)
                .and_then(|i| outcome.urls.get(i))
                .ok_or_else(|| {
                    anyhow!(
                        "No result #{} to open ({} available)",
                        n,
                        outcome.urls.len()
                    )
                })?;

            print_section(&format!("Opening result #{}: {}", n, url));
            print_lines(&fetcher.fetch(url).await);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }

    // Handle color settings
    if cli.no_color {
        colored::control::set_override(false);
    }

    setup_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
