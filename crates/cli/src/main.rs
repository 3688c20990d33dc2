//! Binary entry point for the subtitle translator and validator.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use polysub_core::archive::{make_zip, Intake};
use polysub_core::cost;
use polysub_core::discover::{find_pairs, find_srt_files};
use polysub_core::pipeline::{translate_all, validate_all};
use polysub_core::report::Report;
use polysub_core::translate::openai::{OpenAiTranslator, DEFAULT_MODEL};
use polysub_core::translate::prompt::PromptContext;
use polysub_core::translate::{
    TranslateOptions, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES,
    DEFAULT_PARALLEL_FILES,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
#[command(version, about = "Translate SRT subtitles with an LLM and check their structure")]
struct Cli {
    /// Enable verbose debug and trace logs.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate tokens and cost for translating every SRT under a folder.
    Analyze {
        /// Folder or `.zip` archive of SRT files.
        #[arg(long)]
        source: PathBuf,
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
    /// Translate every SRT under a folder into each language, then validate.
    Translate {
        /// Folder or `.zip` archive of SRT files.
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Also pack the output folder into this `.zip` file.
        #[arg(long)]
        zip_output: Option<PathBuf>,
        #[arg(long, num_args = 1.., required = true)]
        langs: Vec<String>,
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        /// Falls back to the `OPENAI_API_KEY` environment variable.
        #[arg(long)]
        api_key: Option<String>,
        /// Number of subtitle blocks translated per request.
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Requests in flight per file.
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Files translated at the same time.
        #[arg(long, default_value_t = DEFAULT_PARALLEL_FILES)]
        parallel_files: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        /// Extra instructions appended to the system prompt.
        #[arg(long)]
        context: Option<String>,
        /// JSON array of `{"source": .., "target": ..}` terms.
        #[arg(long)]
        glossary: Option<PathBuf>,
    },
    /// Validate translations previously written by `translate`.
    Validate {
        /// Folder or `.zip` archive of SRT files.
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, num_args = 1.., required = true)]
        langs: Vec<String>,
    },
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::default()
            .add_directive("polysub=trace".parse()?)
            .add_directive("polysub_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("polysub=info".parse()?)
            .add_directive("polysub_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn source_files(intake: &Intake) -> Result<Vec<PathBuf>> {
    let source = intake.root();
    let files = find_srt_files(source)?;
    if files.is_empty() {
        bail!("no SRT files found in {}", source.display());
    }
    info!("found {} file(s)", files.len());
    Ok(files)
}

/// Print the report as JSON on stdout and map it to an exit code.
fn finish(report: &Report) -> Result<ExitCode> {
    let out = serde_json::json!({
        "success": report.is_success(),
        "summary": report.summary(),
        "results": report.results,
        "failures": report.failures,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Application entry point which parses CLI args and performs actions.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    match cli.command {
        Command::Analyze { source, model } => {
            let intake = Intake::open(&source)?;
            let estimate = cost::estimate(&source_files(&intake)?, &model)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Translate {
            source,
            output,
            zip_output,
            langs,
            model,
            api_key,
            batch_size,
            concurrency,
            parallel_files,
            max_retries,
            context,
            glossary,
        } => {
            let intake = Intake::open(&source)?;
            let files = source_files(&intake)?;
            let mut prompt_context = PromptContext::new(context.as_deref().unwrap_or_default());
            if let Some(path) = glossary {
                prompt_context.load_glossary(&path)?;
            }
            let translator = match api_key {
                Some(key) => OpenAiTranslator::new(key, model)?,
                None => OpenAiTranslator::from_env(model)?,
            }
            .with_context(prompt_context);
            let options = TranslateOptions {
                batch_size,
                concurrency,
                max_retries,
                parallel_files,
                ..TranslateOptions::default()
            };
            let report = translate_all(&files, &output, &langs, translator, &options).await;
            if let Some(zip_path) = zip_output {
                make_zip(&output, &zip_path)?;
            }
            finish(&report)
        }
        Command::Validate {
            source,
            output,
            langs,
        } => {
            let intake = Intake::open(&source)?;
            let files = source_files(&intake)?;
            let report: Report = langs
                .iter()
                .map(|lang| validate_all(&find_pairs(&files, &output, lang), lang))
                .collect();
            finish(&report)
        }
    }
}
