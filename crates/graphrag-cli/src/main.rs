//! GraphRAG CLI
//!
//! Command-line front end for:
//! - Validating and repairing a single Cypher query
//! - Dry-running a decomposition plan through validate → fallback → execute
//! - Listing the rewrite rule table
//! - Decomposing a question into a plan with an LLM (`llm-openai` feature)
//!
//! Machine-readable output goes to stdout; logs go to stderr
//! (`RUST_LOG` overrides the default `info` filter).

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use graphrag_agents::{AgentConfig, GraphRetrieverAgent, MemoryGraphStore, QueryPlan, Row};
use graphrag_repair::{QueryRepairEngine, RepairOutcome};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "graphrag")]
#[command(author, version, about = "GraphRAG: Cypher query repair and graph retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and repair one Cypher query.
    ///
    /// Reads the query from the argument, `--file`, or stdin (in that order).
    /// Exits non-zero when the query is rejected.
    Validate {
        /// Query text
        query: Option<String>,
        /// Read the query from a file (`-` for stdin)
        #[arg(short, long, conflicts_with = "query")]
        file: Option<PathBuf>,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a query plan through validation and an in-memory graph store.
    Plan {
        /// Plan JSON: `{"query_plan": [{"purpose", "cypher"}], "thought_process"}` (`-` for stdin)
        input: PathBuf,
        /// Original question to record in the report
        #[arg(short, long, default_value = "")]
        question: String,
        /// JSON object mapping exact query text to result rows
        #[arg(long)]
        rows: Option<PathBuf>,
    },

    /// List the rewrite rules in application order.
    Rules {
        #[arg(long)]
        json: bool,
    },

    /// Decompose a question into a query plan using an LLM.
    #[cfg(feature = "llm-openai")]
    Decompose {
        /// Natural-language question
        question: String,
        /// Schema JSON (`GraphSchema`) to embed in the prompt
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Validate { query, file, json } => cmd_validate(query, file.as_deref(), json),
        Commands::Plan {
            input,
            question,
            rows,
        } => cmd_plan(&input, &question, rows.as_deref()).await,
        Commands::Rules { json } => cmd_rules(json),
        #[cfg(feature = "llm-openai")]
        Commands::Decompose { question, schema } => {
            cmd_decompose(&question, schema.as_deref()).await
        }
    }
}

// ============================================================================
// Input helpers
// ============================================================================

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| anyhow!("failed to read stdin: {e}"))?;
    Ok(input)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return read_stdin();
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Query text from the CLI, trimming only the newline a shell or editor adds.
fn query_text(query: Option<String>, file: Option<&Path>) -> Result<String> {
    let raw = match (query, file) {
        (Some(q), _) => return Ok(q),
        (None, Some(path)) => read_input(path)?,
        (None, None) => read_stdin()?,
    };
    Ok(raw
        .strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(raw.as_str())
        .to_string())
}

fn parse_plan(text: &str) -> Result<QueryPlan> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| anyhow!("invalid plan JSON: {e}"))?;
    QueryPlan::from_llm_json(value).map_err(|e| anyhow!("invalid plan: {e}"))
}

fn parse_rows(text: &str) -> Result<BTreeMap<String, Vec<Row>>> {
    serde_json::from_str(text)
        .map_err(|e| anyhow!("rows file must map query text to arrays of objects: {e}"))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_validate(query: Option<String>, file: Option<&Path>, json: bool) -> Result<()> {
    let query = query_text(query, file)?;
    let engine = QueryRepairEngine::try_new()?;
    let outcome = engine.repair(&query);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.verdict)?);
    } else {
        print_outcome(&query, &outcome);
    }

    if !outcome.verdict.is_valid {
        bail!("query rejected");
    }
    Ok(())
}

fn print_outcome(original: &str, outcome: &RepairOutcome) {
    let verdict = &outcome.verdict;
    if !verdict.is_valid {
        println!(
            "{} {}",
            "invalid".red().bold(),
            verdict.message.as_deref().unwrap_or_default()
        );
        return;
    }

    if outcome.was_modified() {
        println!("{}", "Repaired".green().bold());
        println!("  {} {}", "before:".dimmed(), original);
        println!("  {} {}", "after: ".dimmed(), verdict.fixed_query.cyan());
        for rule in &outcome.applied_rules {
            println!("  {} {}", "→".yellow(), rule);
        }
    } else {
        println!("{} {}", "ok".green().bold(), verdict.fixed_query);
    }

    for issue in outcome.issues.iter() {
        println!("  {} {}", "warning:".yellow().bold(), issue);
    }
}

async fn cmd_plan(input: &Path, question: &str, rows: Option<&Path>) -> Result<()> {
    let plan = parse_plan(&read_input(input)?)?;

    let mut store = MemoryGraphStore::new();
    if let Some(path) = rows {
        for (query, rows) in parse_rows(&read_input(path)?)? {
            store = store.with_rows(query, rows);
        }
    }

    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    let agent = GraphRetrieverAgent::new(Arc::new(store), config);
    let report = agent.process(&plan, question).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_rules(json: bool) -> Result<()> {
    let engine = QueryRepairEngine::try_new()?;

    if json {
        let rules: Vec<_> = engine
            .rules()
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name(),
                    "kind": r.kind_name(),
                    "description": r.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    for (i, rule) in engine.rules().iter().enumerate() {
        println!(
            "{:>2}. {} {}",
            i + 1,
            rule.name().green().bold(),
            format!("({})", rule.kind_name()).dimmed()
        );
        println!("    {}", rule.description());
    }
    Ok(())
}

#[cfg(feature = "llm-openai")]
async fn cmd_decompose(question: &str, schema: Option<&Path>) -> Result<()> {
    use graphrag_agents::{GraphSchema, OpenAIClient, QueryDecompositionAgent, StaticSchemaProvider};

    let schema = match schema {
        Some(path) => serde_json::from_str::<GraphSchema>(&read_input(path)?)
            .map_err(|e| anyhow!("invalid schema JSON: {e}"))?,
        None => GraphSchema::default(),
    };

    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    let llm = OpenAIClient::from_env()?;
    let agent = QueryDecompositionAgent::new(
        Arc::new(llm),
        Arc::new(StaticSchemaProvider::new(schema)),
        &config,
    );

    let plan = agent.decompose(question).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
