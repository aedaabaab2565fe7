//! Rowtag CLI - Label CSV rows with a local LLM
//!
//! # Main Commands
//!
//! ```bash
//! rowtag classify reviews.csv --column comment      # Sentiment labels
//! rowtag classify tickets.csv --column body \
//!     --mode categorize \
//!     --prompt "Classify the support ticket" \
//!     --categories "billing, bug, feature request"  # Custom categories
//! rowtag serve                                      # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! rowtag parse reviews.csv          # Just parse CSV to JSON
//! ```

use clap::{Parser, Subcommand};
use rowtag::{
    parse_table, process, processed_path, stringify_table, AnalysisMode, FsTextSink, FsTextSource,
    HttpChatEngine, ProcessOptions, TextSink, TextSource,
};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "rowtag")]
#[command(about = "Label CSV rows with a local LLM chat endpoint", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one column and append the labels as a new column
    Classify {
        /// Input CSV file
        input: PathBuf,

        /// Column whose cells are sent to the model
        #[arg(short, long)]
        column: String,

        /// Analysis mode: sentiment or categorize
        #[arg(short, long, default_value = "sentiment")]
        mode: String,

        /// Instruction prefix (categorize mode)
        #[arg(long)]
        prompt: Option<String>,

        /// Comma-separated category names (categorize mode)
        #[arg(long)]
        categories: Option<String>,

        /// Output file (default: processed_<name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Chat endpoint base URL (default: $ROWTAG_ENGINE_URL or localhost Ollama)
        #[arg(long)]
        engine_url: Option<String>,

        /// Model name (default: $ROWTAG_ENGINE_MODEL or llama3.2)
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long, default_value = "0.0")]
        temperature: f32,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify {
            input,
            column,
            mode,
            prompt,
            categories,
            output,
            engine_url,
            model,
            temperature,
        } => {
            cmd_classify(
                &input,
                &column,
                &mode,
                prompt,
                categories,
                output.as_deref(),
                engine_url,
                model,
                temperature,
            )
            .await
        }

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_classify(
    input: &Path,
    column: &str,
    mode_name: &str,
    prompt: Option<String>,
    categories: Option<String>,
    output: Option<&Path>,
    engine_url: Option<String>,
    model: Option<String>,
    temperature: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let decoded = FsTextSource::new(input).read_text()?;
    eprintln!("   Encoding: {}", decoded.encoding);

    let parsed = parse_table(&decoded.text).map_err(|_| "file is empty or invalid")?;
    for dropped in &parsed.dropped {
        eprintln!(
            "   ⚠️  Line {} dropped: expected {} fields, found {}",
            dropped.line, dropped.expected, dropped.found
        );
    }
    eprintln!("   Columns: {}", parsed.table.headers().join(", "));
    eprintln!("✅ Parsed {} rows", parsed.table.len());

    let mode = resolve_mode(mode_name, prompt, categories.as_deref())?;

    let mut engine = HttpChatEngine::from_env();
    if let Some(url) = engine_url {
        engine = engine.with_base_url(url);
    }
    if let Some(ref model) = model {
        engine = engine.with_model(model);
    }

    // Ctrl-C requests a stop; rows already labeled are still written out.
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    eprintln!(
        "🏷️  Labeling column '{}' into '{}'",
        column,
        mode.output_column()
    );

    let options = ProcessOptions {
        temperature,
        cancel: cancel.clone(),
    };
    let outcome = process(&parsed.table, column, &mode, &engine, options, |done, total| {
        eprintln!("   Row {}/{}", done, total);
    })
    .await?;

    if outcome.cancelled {
        eprintln!(
            "⚠️  Cancelled: {} of {} rows labeled",
            outcome.completed, outcome.total
        );
    } else if outcome.failed > 0 {
        eprintln!(
            "⚠️  Done: {} of {} rows failed and carry the sentinel label",
            outcome.failed, outcome.total
        );
    } else {
        eprintln!("✅ Labeled all {} rows", outcome.total);
    }
    if let Some(ref err) = outcome.last_error {
        eprintln!("   Last error: {}", err);
    }

    let csv = stringify_table(outcome.table.rows());
    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => processed_path(input),
    };
    let dir = out_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = out_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("processed_output.csv");
    FsTextSink::new(dir).write_text(name, &csv)?;
    eprintln!("💾 Output written to: {}", out_path.display());

    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let decoded = FsTextSource::new(input).read_text()?;
    eprintln!("   Encoding: {}", decoded.encoding);

    let parsed = parse_table(&decoded.text).map_err(|_| "file is empty or invalid")?;
    for dropped in &parsed.dropped {
        eprintln!(
            "   ⚠️  Line {} dropped: expected {} fields, found {}",
            dropped.line, dropped.expected, dropped.found
        );
    }
    eprintln!("   Columns: {}", parsed.table.headers().join(", "));
    eprintln!("✅ Parsed {} rows", parsed.table.len());

    let json = serde_json::to_string_pretty(parsed.table.rows())?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    rowtag::server::start_server(port).await?;
    Ok(())
}

/// Resolve the analysis mode from the CLI flags.
fn resolve_mode(
    name: &str,
    prompt: Option<String>,
    categories: Option<&str>,
) -> Result<AnalysisMode, Box<dyn std::error::Error>> {
    match name {
        "sentiment" => Ok(AnalysisMode::Sentiment),
        "categorize" => {
            let prompt = prompt.ok_or("categorize mode requires --prompt")?;
            let raw = categories.ok_or("categorize mode requires --categories")?;
            let mode = AnalysisMode::categorize(prompt, raw);
            if let AnalysisMode::Categorize { ref categories, .. } = mode {
                if categories.is_empty() {
                    return Err("categorize mode requires at least one category".into());
                }
            }
            Ok(mode)
        }
        other => Err(format!(
            "Unknown mode: {} (expected 'sentiment' or 'categorize')",
            other
        )
        .into()),
    }
}

/// Cancel the token on the first Ctrl-C so the run stops after the current row.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️  Interrupt received, finishing the current row...");
            cancel.cancel();
        }
    });
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
