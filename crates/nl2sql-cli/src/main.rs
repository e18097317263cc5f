use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nl2sql_catalog::{load_cache, load_graph, refresh, PostgresIntrospector, SnapshotSource};
use nl2sql_core::{Config, Diagnostic, Policy, SchemaGraph, Severity, TableId};
use nl2sql_llm::{ask, build_prompt, create_generator, Answer};
use nl2sql_retrieval::{retrieve, RetrievalResult};
use nl2sql_sql::{Guardrail, ValidationResult};

/// pg-nl2sql - Natural language to reviewed, read-only PostgreSQL
#[derive(Parser)]
#[command(name = "pg-nl2sql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: nl2sql.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (debug logging unless RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and show effective settings
    ConfigCheck,

    /// Check database connectivity and read-only status
    Healthcheck,

    /// Introspect the database and rewrite the schema cache
    RefreshSchema {
        /// Schemas to introspect (default: database.schemas or default_schema)
        #[arg(short, long = "schema")]
        schemas: Vec<String>,
    },

    /// Summarize the schema cache
    ShowCache {
        /// Print the cache envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank the tables relevant to a question
    RetrieveTables {
        question: String,

        /// Maximum number of tables (default: retrieval.max_tables)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Print the prompt that would be sent to the generator
    BuildPrompt {
        question: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Generate SQL for a question and validate it
    GenerateSql {
        question: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Validate SQL against the cached schema
    ValidateSql {
        sql: String,

        /// Restrict the allowlist to these tables (`schema.name` or `name`)
        #[arg(short, long = "allow-table")]
        allow_tables: Vec<String>,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!(
        default_schema = %config.default_schema,
        cache = %config.cache.path.display(),
        "loaded configuration"
    );

    let accepted = match cli.command {
        Commands::ConfigCheck => config_check_command(&config),
        Commands::Healthcheck => healthcheck_command(&config).await,
        Commands::RefreshSchema { schemas } => refresh_command(&config, schemas).await,
        Commands::ShowCache { json } => show_cache_command(&config, json),
        Commands::RetrieveTables { question, top_k, json } => {
            retrieve_command(&config, &question, top_k, json)
        }
        Commands::BuildPrompt { question, top_k, json } => {
            build_prompt_command(&config, &question, top_k, json)
        }
        Commands::GenerateSql { question, top_k, json } => {
            generate_command(&config, &question, top_k, json).await
        }
        Commands::ValidateSql { sql, allow_tables, json } => {
            validate_command(&config, &sql, &allow_tables, json)
        }
    }?;

    if !accepted {
        std::process::exit(1);
    }

    Ok(())
}

/// Load the cached graph and the configured policy
fn load_context(config: &Config, top_k: Option<usize>) -> Result<(SchemaGraph, Policy)> {
    let graph = load_graph(&config.cache.path)
        .with_context(|| format!("Failed to load schema cache {}", config.cache.path.display()))?;

    let mut policy = Policy::from_config(config, &graph);
    if let Some(k) = top_k {
        anyhow::ensure!(k >= 1, "--top-k must be at least 1");
        policy = policy.with_max_tables(k);
    }

    Ok((graph, policy))
}

async fn connect(config: &Config) -> Result<PostgresIntrospector> {
    let dsn = config.require_dsn()?;
    PostgresIntrospector::connect(dsn, config.database.tls)
        .await
        .context("Failed to connect to PostgreSQL")
}

fn config_check_command(config: &Config) -> Result<bool> {
    let set = |present: bool| if present { "set".green() } else { "not set".yellow() };

    println!("{}", "Configuration OK".green().bold());
    println!("  default_schema:  {}", config.default_schema);
    println!("  target schemas:  {}", config.target_schemas().join(", "));
    println!("  POSTGRES_DSN:    {}", set(config.database.dsn.is_some()));
    println!("  tls:             {}", config.database.tls);
    println!("  cache path:      {}", config.cache.path.display());
    println!("  max_tables:      {}", config.retrieval.max_tables);
    println!("  default_limit:   {}", config.guardrail.default_limit);
    println!("  llm provider:    {:?} ({})", config.llm.provider, config.llm.model);
    println!("  OPENAI_API_KEY:  {}", set(config.llm.api_key.is_some()));

    if !config.guardrail.tables.allow.is_empty() {
        println!("  allow tables:    {}", config.guardrail.tables.allow.join(", "));
    }
    if !config.guardrail.tables.deny.is_empty() {
        println!("  deny tables:     {}", config.guardrail.tables.deny.join(", "));
    }

    Ok(true)
}

async fn healthcheck_command(config: &Config) -> Result<bool> {
    let source = connect(config).await?;
    let report = source.test_connection().await.context("Health check failed")?;

    println!("{} {}", "✓".green().bold(), "Database reachable".bold());
    println!("  database:   {}", report.database);
    println!("  user:       {}", report.user);
    println!("  version:    {}", report.server_version);
    println!("  read-only:  {}", report.read_only.to_string().green());

    Ok(true)
}

async fn refresh_command(config: &Config, schemas: Vec<String>) -> Result<bool> {
    let schemas = if schemas.is_empty() {
        config.target_schemas()
    } else {
        schemas
    };

    let source = connect(config).await?;
    eprintln!("{} {}...", "Introspecting".cyan(), schemas.join(", "));

    let cached = refresh(&source, &schemas, &config.cache.path, None).await?;

    println!(
        "{} {} tables from {} written to {}",
        "✓".green().bold(),
        cached.snapshot.tables.len(),
        cached.snapshot.database,
        config.cache.path.display()
    );
    println!("  fingerprint: {}", cached.fingerprint);

    Ok(true)
}

fn show_cache_command(config: &Config, json: bool) -> Result<bool> {
    let cached = load_cache(&config.cache.path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cached)?);
        return Ok(true);
    }

    println!("{}", "Schema Cache".bold().bright_blue());
    println!("  path:         {}", config.cache.path.display());
    println!("  version:      {}", cached.cache_format_version);
    println!("  generated at: {}", cached.generated_at_label());
    println!("  fingerprint:  {}", cached.fingerprint);
    println!("  database:     {}", cached.snapshot.database);
    println!();

    for table in &cached.snapshot.tables {
        println!(
            "  {} ({} columns, {} foreign keys)",
            table.id.to_string().bold(),
            table.columns.len(),
            table.foreign_keys.len()
        );
    }

    Ok(true)
}

fn retrieve_command(config: &Config, question: &str, top_k: Option<usize>, json: bool) -> Result<bool> {
    let (graph, policy) = load_context(config, top_k)?;
    let result = retrieve(question, &graph, &policy);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_retrieval(&result);
    }

    Ok(true)
}

fn build_prompt_command(config: &Config, question: &str, top_k: Option<usize>, json: bool) -> Result<bool> {
    let (graph, policy) = load_context(config, top_k)?;
    let retrieval = retrieve(question, &graph, &policy);
    let prompt = build_prompt(question, &retrieval, &graph, &policy)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prompt)?);
    } else {
        println!("{}", "System prompt:".bold());
        println!("{}\n", prompt.system_prompt);
        println!("{}", "User prompt:".bold());
        println!("{}", prompt.user_prompt);
    }

    Ok(true)
}

async fn generate_command(config: &Config, question: &str, top_k: Option<usize>, json: bool) -> Result<bool> {
    let (graph, policy) = load_context(config, top_k)?;
    let generator = create_generator(config.require_llm()?)?;

    let answer = ask(question, &graph, &policy, generator.as_ref()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }

    Ok(answer.is_accepted())
}

fn validate_command(config: &Config, sql: &str, allow_tables: &[String], json: bool) -> Result<bool> {
    let (graph, mut policy) = load_context(config, None)?;

    if !allow_tables.is_empty() {
        let ids = allow_tables
            .iter()
            .map(|t| TableId::parse_with_default(t, &config.default_schema))
            .collect::<Result<Vec<_>, _>>()?;
        policy = policy.restricted_to(ids.iter());
    }

    let result = Guardrail::new(&graph).validate_sql(sql, &policy);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_validation(&result);
    }

    Ok(result.is_accepted())
}

fn print_retrieval(result: &RetrievalResult) {
    if result.is_empty() {
        println!("{}", "No relevant tables found".yellow());
        return;
    }

    for (rank, table) in result.tables.iter().enumerate() {
        println!(
            "{:>2}. {} {}",
            rank + 1,
            table.id.to_string().bold(),
            format!("(score {})", table.score).dimmed()
        );
        for reason in &table.reasons {
            println!("      {}", reason);
        }
    }
}

fn print_diagnostic(diag: &Diagnostic) {
    let severity = match diag.severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
    };
    println!("  [{}] {} {}: {}", severity, diag.kind, diag.detail, diag.message);
}

fn print_validation(result: &ValidationResult) {
    match result {
        ValidationResult::Accepted(accepted) => {
            println!("{}", "✓ Accepted".green().bold());
            println!("{}", accepted.sql);
            if accepted.limit_added {
                println!("{}", "  (LIMIT added)".dimmed());
            }
            for warning in &accepted.warnings {
                print_diagnostic(warning);
            }
        }
        ValidationResult::Rejected(rejected) => {
            println!("{}", "✗ Rejected".red().bold());
            for diag in rejected.errors.iter().chain(&rejected.warnings) {
                print_diagnostic(diag);
            }
        }
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", "Tables:".bold());
    print_retrieval(&answer.retrieval);
    println!();

    println!("{} {:.2}", "Confidence:".bold(), answer.generation.confidence);
    println!("{}", "Assumptions:".bold());
    for assumption in &answer.assumptions {
        println!("  - {}", assumption);
    }
    println!();

    if !answer.is_accepted() {
        println!("{}", "Generated SQL:".bold());
        println!("{}", answer.generation.sql);
    }
    print_validation(&answer.validation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_validate_sql_flags() {
        let cli = Cli::parse_from([
            "pg-nl2sql",
            "validate-sql",
            "SELECT 1",
            "--allow-table",
            "public.orders",
            "--allow-table",
            "customers",
        ]);
        match cli.command {
            Commands::ValidateSql { allow_tables, .. } => {
                assert_eq!(allow_tables, vec!["public.orders", "customers"]);
            }
            _ => panic!("expected validate-sql"),
        }
    }
}
