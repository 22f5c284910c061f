//! flowgraph CLI: content exports to actions, topics, flows and a graph.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use serde_json::json;

use flowgraph::config::PipelineConfig;
use flowgraph::content::SourceCategory;
use flowgraph::flow::NextAction;
use flowgraph::normalize::{SourceRecord, detect_category, records_from_document};
use flowgraph::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "flowgraph", version, about = "Content exports to prioritized task flows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print JSON.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Section of the run to print.
        #[arg(long, value_enum, default_value = "all")]
        output: OutputSection,
    },

    /// Print the detected source category of each record.
    Detect {
        /// JSON export file (array, or object holding one array field).
        #[arg(long)]
        input: PathBuf,
    },

    /// Complete actions in order, then print what comes next.
    Next {
        #[command(flatten)]
        source: SourceArgs,

        /// Restrict to one topic's flow.
        #[arg(long)]
        topic: Option<String>,

        /// Action ids to mark complete first (repeatable).
        #[arg(long)]
        complete: Vec<String>,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    /// JSON export file (array, or object holding one array field).
    #[arg(long)]
    input: PathBuf,

    /// Declared category for every record; skips auto-detection.
    #[arg(long)]
    category: Option<SourceCategory>,

    /// Pipeline config (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputSection {
    All,
    Graph,
    Actions,
    Topics,
    Flows,
    Diagnostics,
}

fn load_records(path: &Path, category: Option<SourceCategory>) -> Result<Vec<SourceRecord>> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    let doc: serde_json::Value = serde_json::from_str(&content).into_diagnostic()?;
    let origin = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let records = records_from_document(doc, category, origin.as_deref());
    tracing::info!(path = %path.display(), records = records.len(), "loaded input");
    Ok(records)
}

fn build_pipeline(config: Option<&Path>) -> Result<Pipeline> {
    let config = match config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    Ok(Pipeline::new(config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { source, output } => {
            let pipeline = build_pipeline(source.config.as_deref())?;
            let records = load_records(&source.input, source.category)?;
            let run = pipeline.run(&records);
            eprint!("{}", run.stats());
            match output {
                OutputSection::All => print_json(&run.report())?,
                OutputSection::Graph => print_json(run.graph())?,
                OutputSection::Actions => print_json(&run.actions())?,
                OutputSection::Topics => print_json(&run.topic_summaries())?,
                OutputSection::Flows => print_json(&run.flow_summaries())?,
                OutputSection::Diagnostics => print_json(run.diagnostics())?,
            }
        }

        Commands::Detect { input } => {
            let records = load_records(&input, None)?;
            let detected: Vec<_> = records
                .iter()
                .enumerate()
                .map(|(index, r)| {
                    json!({
                        "index": index,
                        "category": detect_category(&r.data, r.origin.as_deref()),
                    })
                })
                .collect();
            print_json(&detected)?;
        }

        Commands::Next {
            source,
            topic,
            complete,
        } => {
            let pipeline = build_pipeline(source.config.as_deref())?;
            let records = load_records(&source.input, source.category)?;
            let mut run = pipeline.run(&records);
            for id in &complete {
                run.complete_action(id)?;
            }

            let (next, state) = match &topic {
                Some(topic) => match run.flows().next_in_flow(topic)? {
                    NextAction::Ready(action) => (Some(action), "ready"),
                    NextAction::Blocked => (None, "blocked"),
                    NextAction::AllComplete => (None, "all_complete"),
                },
                None => {
                    let next = run.next_action_any();
                    (next, if next.is_some() { "ready" } else { "none" })
                }
            };
            print_json(&json!({
                "topic": topic,
                "state": state,
                "next": next,
                "progress": run.progress(),
            }))?;
        }
    }

    Ok(())
}
