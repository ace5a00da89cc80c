mod adapters;
mod config;
mod core;

use anyhow::Result;
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;

const NO_CHANGES_MESSAGE: &str = "No changes detected";

#[derive(Parser)]
#[command(name = "safeguard")]
#[command(about = "Code change analysis: diffs files between two revisions and asks an LLM for likely bugs", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long = "file", value_delimiter = ',', help = "Path to a file to analyze (repeatable)")]
    files: Vec<String>,

    #[arg(long, help = "Source revision")]
    source: Option<String>,

    #[arg(long, help = "Target revision")]
    target: Option<String>,

    #[arg(long, help = "LLM provider (anthropic or openai)")]
    provider: Option<String>,

    #[arg(long, help = "Model to use (defaults depend on the provider)")]
    model: Option<String>,

    #[arg(long, help = "API key for the provider")]
    key: Option<String>,

    #[arg(short, long, help = "Pick files from the repository interactively")]
    interactive: bool,

    #[arg(
        short,
        long,
        help = "Output file path (prints to stdout if not provided)"
    )]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Safeguard - Code Change Analysis Tool v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = match config::Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!("Ignoring configuration file: {:#}", err);
            config::Config::default()
        }
    };
    config.merge_with_cli(cli.provider.clone(), cli.model.clone(), cli.key.clone());

    let source = cli.source.clone().unwrap_or_default();
    let target = cli.target.clone().unwrap_or_default();
    check_inputs(&source, &target, &cli.files, cli.interactive)?;

    let provider = config.provider_kind()?;
    let model = config.model_for(provider);
    info!("Using model: {}", model);

    let credential = config::resolve_credential(config.api_key.as_deref(), provider, |name| {
        std::env::var(name).ok()
    })?;

    let git = core::GitIntegration::new(".")?;

    let picked = if cli.interactive {
        let candidates =
            core::picker::filter_candidates(git.list_tracked_files()?, &config.exclude_patterns()?);
        core::picker::pick_files(&candidates)?
    } else {
        Vec::new()
    };
    let files = merge_file_lists(cli.files, picked);

    let request = core::AnalysisRequest::new(files, source, target, provider, model, credential)?;

    let mut model_config = request.model_config();
    model_config.base_url = config.base_url.clone();
    model_config.timeout_secs = config.request_timeout_secs;
    let adapter = adapters::llm::create_adapter(&model_config)?;

    let differ = core::DiffGenerator::new(config.diff_engine, config.diff_command.clone());
    let orchestrator = core::BatchOrchestrator::new(&git, &differ);
    let outcome = orchestrator.run(&request, adapter.as_ref()).await?;

    for skipped in outcome.skipped() {
        if let Some(reason) = skipped.skip_reason() {
            info!("Not reviewed: {} ({})", skipped.path, reason);
        }
    }

    if let core::RunOutcome::Analyzed { reviewed, .. } = &outcome {
        info!("Analysis of potential bugs in: {}", reviewed.join(", "));
    }
    emit_analysis(report_text(&outcome), cli.output).await?;

    Ok(())
}

/// Rejects missing revisions, and a missing file list unless the picker will
/// supply one, before the repository is touched.
fn check_inputs(
    source: &str,
    target: &str,
    files: &[String],
    interactive: bool,
) -> Result<(), ConfigError> {
    let no_files = files.iter().all(|f| f.trim().is_empty());
    if source.trim().is_empty() || target.trim().is_empty() || (no_files && !interactive) {
        return Err(ConfigError::MissingInput);
    }
    Ok(())
}

fn report_text(outcome: &core::RunOutcome) -> &str {
    match outcome {
        core::RunOutcome::NoChanges { .. } => NO_CHANGES_MESSAGE,
        core::RunOutcome::Analyzed { analysis, .. } => analysis,
    }
}

async fn emit_analysis(analysis: &str, output_path: Option<PathBuf>) -> Result<()> {
    if let Some(path) = output_path {
        tokio::fs::write(&path, analysis).await?;
        info!("Analysis written to {}", path.display());
    } else {
        println!("{}", analysis);
    }
    Ok(())
}

/// Joins flag-supplied and picked paths, dropping repeats after their first
/// occurrence.
fn merge_file_lists(cli_files: Vec<String>, picked: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    cli_files
        .into_iter()
        .chain(picked)
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty() && seen.insert(f.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_file_lists_keeps_first_occurrence() {
        let merged = merge_file_lists(
            vec!["b.rs".to_string(), "a.rs".to_string(), " ".to_string()],
            vec!["a.rs".to_string(), "c.rs".to_string()],
        );
        assert_eq!(merged, vec!["b.rs", "a.rs", "c.rs"]);
    }

    #[test]
    fn cli_accepts_repeated_and_comma_separated_files() {
        let cli = Cli::try_parse_from([
            "safeguard",
            "--file",
            "a.rs,b.rs",
            "-f",
            "c.rs",
            "--source",
            "main",
            "--target",
            "feat",
        ])
        .unwrap();
        assert_eq!(cli.files, vec!["a.rs", "b.rs", "c.rs"]);
        assert_eq!(cli.source.as_deref(), Some("main"));
        assert!(!cli.interactive);
    }

    #[test]
    fn missing_file_list_is_rejected_unless_interactive() {
        assert!(matches!(
            check_inputs("main", "feat", &[], false),
            Err(ConfigError::MissingInput)
        ));
        assert!(matches!(
            check_inputs("main", "feat", &[" ".to_string()], false),
            Err(ConfigError::MissingInput)
        ));
        assert!(check_inputs("main", "feat", &[], true).is_ok());
        assert!(check_inputs("main", "feat", &["a.rs".to_string()], false).is_ok());
        assert!(matches!(
            check_inputs("", "feat", &["a.rs".to_string()], true),
            Err(ConfigError::MissingInput)
        ));
    }

    #[tokio::test]
    async fn no_changes_outcome_goes_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.txt");
        let outcome = core::RunOutcome::NoChanges { skipped: Vec::new() };

        emit_analysis(report_text(&outcome), Some(path.clone())).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "No changes detected");
    }

    #[test]
    fn analyzed_outcome_reports_analysis_verbatim() {
        let outcome = core::RunOutcome::Analyzed {
            analysis: "no issues found".to_string(),
            reviewed: vec!["a.txt".to_string()],
            skipped: Vec::new(),
        };
        assert_eq!(report_text(&outcome), "no issues found");
    }

    #[tokio::test]
    async fn analysis_is_written_verbatim_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.txt");
        emit_analysis("no issues found", Some(path.clone())).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "no issues found");
    }
}
