//! CLI binary for contract-review.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! `ReviewConfig`, runs one review and prints or writes the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use contract_review::config::{default_knowledge_dir, default_prompts_dir, DEFAULT_MODEL};
use contract_review::report::DEFAULT_TITLE;
use contract_review::{
    analyze_contract, check_completeness, compare_contracts, extract_key_terms, generate_report,
    AnalysisResult, Backend, KnowledgeBase, KnowledgeConnector, OpenLawsConnector, Payload,
    ProgressCallback, ReportFormat, ReviewConfig, ReviewProgressCallback, Stage, Status,
    TokenUsage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner on stderr that follows the pipeline stages.
struct SpinnerCallback {
    bar: ProgressBar,
}

impl SpinnerCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ReviewProgressCallback for SpinnerCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_review_complete(&self, _success: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Risk analysis with California employment-law knowledge
  contract-review analyze offer.pdf -j US-CA -t employment -o analysis.md

  # Completeness check as JSON
  contract-review check signed.pdf -f json

  # Compare two drafts
  contract-review compare draft_v1.pdf draft_v2.pdf -o diff.md

  # Key terms
  contract-review extract lease.pdf -o terms.json

  # Turn an analysis into a Word report
  contract-review export analysis.md report.docx --title "Offer Letter Review"

  # Other providers (pages are rendered with pdfium)
  contract-review --backend vision --provider openai --model gpt-4.1 analyze nda.pdf

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY              Anthropic API key (default backend)
  OPENAI_API_KEY, GEMINI_API_KEY Provider keys for --backend vision
  OPENLAWS_API_KEY               OpenLaws key for `lookup`
  CONTRACT_REVIEW_MODEL          Default model
  CONTRACT_REVIEW_BACKEND        anthropic | vision
  CONTRACT_REVIEW_PROMPTS_DIR    Prompt template directory
  CONTRACT_REVIEW_KNOWLEDGE_DIR  Knowledge base directory
  PDFIUM_LIB_PATH                libpdfium location for --backend vision
"#;

/// Review PDF contracts with hosted LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "contract-review",
    version,
    about = "Review PDF contracts with hosted LLMs",
    long_about = "Send PDF contracts to a hosted language model for jurisdiction-aware risk \
analysis, completeness checks, comparisons and key-term extraction, and turn the results \
into Markdown or Word reports.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Model ID (e.g. claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "CONTRACT_REVIEW_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Inference backend.
    #[arg(
        long,
        global = true,
        env = "CONTRACT_REVIEW_BACKEND",
        value_enum,
        default_value = "anthropic",
        long_help = "anthropic: send the PDF itself to the Anthropic Messages API.\n\
          vision: render pages with pdfium and send them as images through any \
          edgequake-llm provider (openai, gemini, ollama, azure, …)."
    )]
    backend: BackendArg,

    /// edgequake-llm provider for --backend vision.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Directory of prompt templates.
    #[arg(long, global = true, env = "CONTRACT_REVIEW_PROMPTS_DIR")]
    prompts_dir: Option<PathBuf>,

    /// Knowledge base directory.
    #[arg(long, global = true, env = "CONTRACT_REVIEW_KNOWLEDGE_DIR")]
    knowledge_dir: Option<PathBuf>,

    /// API call timeout in seconds.
    #[arg(long, global = true, env = "CONTRACT_REVIEW_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Override the output-token budget of the command.
    #[arg(long, global = true, env = "CONTRACT_REVIEW_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "CONTRACT_REVIEW_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Risk analysis of a contract.
    Analyze {
        pdf: PathBuf,
        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: OutputFormat,
        /// Jurisdiction code for legal knowledge, e.g. US-CA, CN.
        #[arg(short, long)]
        jurisdiction: Option<String>,
        /// Contract type for legal knowledge, e.g. employment, nda.
        #[arg(short = 't', long)]
        contract_type: Option<String>,
    },
    /// Check signatures, seals, dates and numbering.
    Check {
        pdf: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },
    /// Compare two contracts.
    Compare {
        pdf_a: PathBuf,
        pdf_b: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract key terms as JSON.
    Extract {
        pdf: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write an analysis (Markdown or JSON result) as a report.
    Export {
        input: PathBuf,
        output: PathBuf,
        /// Report format; inferred from the output extension when omitted.
        #[arg(short, long, value_enum)]
        format: Option<ExportFormat>,
        #[arg(short, long, default_value = DEFAULT_TITLE)]
        title: String,
    },
    /// Show version, configuration and API key status.
    Info,
    /// List jurisdiction/contract-type pairs in the knowledge base.
    Jurisdictions,
    /// Look up a statute by citation through OpenLaws.
    Lookup { citation: String },
}

impl Command {
    fn calls_model(&self) -> bool {
        matches!(
            self,
            Command::Analyze { .. }
                | Command::Check { .. }
                | Command::Compare { .. }
                | Command::Extract { .. }
        )
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Anthropic,
    Vision,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Anthropic => Backend::Anthropic,
            BackendArg::Vision => Backend::Vision,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Markdown,
    Docx,
}

impl From<ExportFormat> for ReportFormat {
    fn from(v: ExportFormat) -> Self {
        match v {
            ExportFormat::Markdown => ReportFormat::Markdown,
            ExportFormat::Docx => ReportFormat::Docx,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback while a request is in flight, so
    // library INFO logs are suppressed unless --verbose.
    let show_progress = !g.quiet && !g.no_progress && cli.command.calls_model();
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(SpinnerCallback::new() as Arc<dyn ReviewProgressCallback>)
    } else {
        None
    };

    // Errors raised before the library takes over the callback (bad flags,
    // invalid config) must still clear the spinner before anyhow prints.
    let outcome = run(&cli, progress.clone()).await;
    if outcome.is_err() {
        if let Some(cb) = progress {
            cb.on_review_complete(false);
        }
    }
    outcome
}

/// Dispatch one subcommand.
async fn run(cli: &Cli, progress: Option<ProgressCallback>) -> Result<()> {
    let g = &cli.global;
    let start = Instant::now();
    match &cli.command {
        Command::Analyze {
            pdf,
            output,
            format,
            jurisdiction,
            contract_type,
        } => {
            let config = build_config(
                g,
                jurisdiction.as_deref(),
                contract_type.as_deref(),
                progress,
            )?;
            let result = analyze_contract(pdf, &config)
                .await
                .context("Contract analysis failed")?;
            emit(&result, *format, output.as_deref())?;
            summary(g, &result, start, output.as_deref());
        }

        Command::Check {
            pdf,
            output,
            format,
        } => {
            let config = build_config(g, None, None, progress)?;
            let mut result = check_completeness(pdf, &config)
                .await
                .context("Completeness check failed")?;
            if *format == OutputFormat::Json {
                result = result.into_structured();
            }
            emit(&result, *format, output.as_deref())?;
            summary(g, &result, start, output.as_deref());
        }

        Command::Compare {
            pdf_a,
            pdf_b,
            output,
        } => {
            let config = build_config(g, None, None, progress)?;
            let result = compare_contracts(pdf_a, pdf_b, &config)
                .await
                .context("Contract comparison failed")?;
            emit(&result, OutputFormat::Markdown, output.as_deref())?;
            summary(g, &result, start, output.as_deref());
        }

        Command::Extract { pdf, output } => {
            let config = build_config(g, None, None, progress)?;
            let result = extract_key_terms(pdf, &config)
                .await
                .context("Key-term extraction failed")?;
            emit(&result, OutputFormat::Markdown, output.as_deref())?;
            summary(g, &result, start, output.as_deref());
        }

        Command::Export {
            input,
            output,
            format,
            title,
        } => {
            let analysis = read_analysis(input)?;
            let format = format.map(ReportFormat::from).unwrap_or_else(|| infer_format(output));
            let outcome = generate_report(&analysis, output, format, title)
                .with_context(|| format!("Failed to export {}", input.display()))?;
            if !g.quiet {
                eprintln!(
                    "{} {} report  →  {}",
                    green("✔"),
                    outcome.format,
                    bold(&outcome.output_path.display().to_string())
                );
            }
        }

        Command::Info => print_info(g)?,

        Command::Jurisdictions => {
            let kb = KnowledgeBase::new(knowledge_dir(g));
            let pairs = kb.available().context("Failed to read knowledge base")?;
            if pairs.is_empty() {
                eprintln!("No knowledge files under {}", kb.root().display());
            }
            let mut current: Option<&str> = None;
            for (jurisdiction, contract_type) in &pairs {
                if current != Some(jurisdiction.as_str()) {
                    println!("{}", bold(jurisdiction));
                    current = Some(jurisdiction.as_str());
                }
                println!("  {contract_type}");
            }
        }

        Command::Lookup { citation } => {
            let connector = OpenLawsConnector::from_env()?;
            match connector
                .get_by_citation(citation)
                .await
                .with_context(|| format!("Lookup of '{citation}' failed"))?
            {
                Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
                None => anyhow::bail!("Citation not found: {citation}"),
            }
        }
    }

    Ok(())
}

/// Map global args plus per-command knowledge keys to `ReviewConfig`.
fn build_config(
    g: &GlobalArgs,
    jurisdiction: Option<&str>,
    contract_type: Option<&str>,
    progress: Option<ProgressCallback>,
) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .model(&g.model)
        .backend(g.backend.into())
        .api_timeout_secs(g.api_timeout)
        .prompts_dir(prompts_dir(g))
        .knowledge_dir(knowledge_dir(g));

    if let Some(ref provider) = g.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(n) = g.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(j) = jurisdiction {
        builder = builder.jurisdiction(j);
    }
    if let Some(t) = contract_type {
        builder = builder.contract_type(t);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn prompts_dir(g: &GlobalArgs) -> PathBuf {
    g.prompts_dir.clone().unwrap_or_else(default_prompts_dir)
}

fn knowledge_dir(g: &GlobalArgs) -> PathBuf {
    g.knowledge_dir.clone().unwrap_or_else(default_knowledge_dir)
}

/// Print or write a result.
///
/// Markdown format writes the payload as-is (JSON payloads pretty-printed);
/// JSON format writes the whole result including status, model and usage.
fn emit(result: &AnalysisResult, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let mut text = match format {
        OutputFormat::Markdown => result.payload.render(),
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("Failed to serialise result")?
        }
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            io::stdout()
                .lock()
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Status line and token usage on stderr.
fn summary(g: &GlobalArgs, result: &AnalysisResult, start: Instant, output: Option<&Path>) {
    if g.quiet {
        return;
    }
    let mark = match result.status {
        Status::Success => green("✔"),
        Status::ParseError => yellow("⚠ response was not valid JSON; raw text kept"),
    };
    let target = output
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{mark}  {}  {:.1}s{target}",
        result.model,
        start.elapsed().as_secs_f64()
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&result.usage.input_tokens.to_string()),
        dim(&result.usage.output_tokens.to_string()),
    );
}

/// Read an exported analysis: a JSON `AnalysisResult`, or any text file.
fn read_analysis(path: &Path) -> Result<AnalysisResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if let Ok(result) = serde_json::from_str::<AnalysisResult>(&text) {
        return Ok(result);
    }
    Ok(AnalysisResult {
        status: Status::Success,
        payload: Payload::Text(text),
        model: String::new(),
        usage: TokenUsage::default(),
    })
}

fn infer_format(output: &Path) -> ReportFormat {
    let docx = ReportFormat::Docx.extension();
    match output.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(docx) => ReportFormat::Docx,
        _ => ReportFormat::Markdown,
    }
}

fn print_info(g: &GlobalArgs) -> Result<()> {
    let key_status = |var: &str| {
        if std::env::var(var).is_ok_and(|v| !v.is_empty()) {
            green("set")
        } else {
            red("not set")
        }
    };
    let dir_status = |dir: &Path| {
        if dir.is_dir() {
            dir.display().to_string()
        } else {
            format!("{} {}", dir.display(), red("(missing)"))
        }
    };

    let prompts = prompts_dir(g);
    let knowledge = knowledge_dir(g);
    let pairs = KnowledgeBase::new(&knowledge)
        .available()
        .context("Failed to read knowledge base")?;

    println!("{} {}", bold("contract-review"), env!("CARGO_PKG_VERSION"));
    println!("Model:              {}", g.model);
    println!("Backend:            {}", Backend::from(g.backend));
    if let Some(ref p) = g.provider {
        println!("Provider:           {p}");
    }
    println!("API timeout:        {}s", g.api_timeout);
    println!("Prompts dir:        {}", dir_status(&prompts));
    println!("Knowledge dir:      {}", dir_status(&knowledge));
    println!("Knowledge records:  {}", pairs.len());
    println!("ANTHROPIC_API_KEY:  {}", key_status("ANTHROPIC_API_KEY"));
    println!("OPENAI_API_KEY:     {}", key_status("OPENAI_API_KEY"));
    println!("OPENLAWS_API_KEY:   {}", key_status("OPENLAWS_API_KEY"));
    Ok(())
}
