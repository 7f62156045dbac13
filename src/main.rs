// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use narrador::app_config::{self, Config, OutputMode, SynthesisProvider};
use narrador::app_controller::{Controller, ExitStatus};

/// CLI Wrapper for SynthesisProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSynthesisProvider {
    #[value(name = "openai")]
    OpenAI,
    Mock,
}

impl From<CliSynthesisProvider> for SynthesisProvider {
    fn from(cli_provider: CliSynthesisProvider) -> Self {
        match cli_provider {
            CliSynthesisProvider::OpenAI => SynthesisProvider::OpenAI,
            CliSynthesisProvider::Mock => SynthesisProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Options shared by every command that reads the configuration
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// Synthesis overrides for the configuration file
#[derive(Args, Debug, Clone, Default)]
struct SynthesisArgs {
    /// Voice id (e.g. 'pt-BR-FranciscaNeural', 'nova')
    #[arg(short, long)]
    voice: Option<String>,

    /// Synthesis provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliSynthesisProvider>,

    /// Model name to use for synthesis
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the provider
    #[arg(long, env = "NARRADOR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum characters per segment
    #[arg(long)]
    max_unit_size: Option<usize>,

    /// Concurrent synthesis calls
    #[arg(short, long)]
    workers: Option<usize>,

    /// Directory for the audio files (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Keep one audio file per segment instead of joining them
    #[arg(short, long)]
    separate: bool,

    /// Discard earlier progress and start over
    #[arg(short, long)]
    fresh: bool,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input document or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    #[command(flatten)]
    synthesis: SynthesisArgs,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum JobsAction {
    /// List stored jobs, most recent first
    List,
    /// Show one job (id or unique id prefix)
    Show {
        id: String,
        /// Print the full job as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a job and its segment audio
    Delete { id: String },
    /// Delete finished jobs not touched for a number of days
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert documents to narrated audio (default command)
    #[command(alias = "tts")]
    Convert(ConvertArgs),

    /// Write the speakable text of a document without synthesizing it
    Normalize {
        /// Input document
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        /// Directory for the text file (default: next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Inspect and maintain resumable jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for narrador
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// narrador - Portuguese documents to narrated audio
///
/// Normalizes Portuguese text into speakable form, splits it into segments and
/// synthesizes them with a speech provider. Interrupted conversions resume
/// where they stopped.
#[derive(Parser, Debug)]
#[command(name = "narrador")]
#[command(version)]
#[command(about = "Resumable Portuguese text-to-speech converter")]
#[command(long_about = "narrador turns Portuguese documents into narrated audio.

EXAMPLES:
    narrador livro.txt                          # Convert using default config
    narrador -v nova -p openai livro.txt        # Use a specific voice and provider
    narrador --fresh livro.txt                  # Discard earlier progress
    narrador -s livro.txt                       # One audio file per segment
    narrador /livros/                           # Convert every document in a directory
    narrador normalize livro.txt                # Write livro_speakable.txt only
    narrador jobs list                          # Show resumable jobs
    narrador completions bash > narrador.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

EXIT CODES:
    0   success
    1   fatal error, or no segment could be synthesized
    2   finished with missing segments
    130 interrupted; run the same command again to resume")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input document or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    #[command(flatten)]
    synthesis: SynthesisArgs,

    #[command(flatten)]
    common: CommonArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // the record filter is the global max level, adjusted after config load
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => "",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();

    match dispatch(cli).await {
        Ok(status) => ExitCode::from(status.code() as u8),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(ExitStatus::Failed.code() as u8)
        }
    }
}

async fn dispatch(cli: CommandLineOptions) -> Result<ExitStatus> {
    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "narrador", &mut std::io::stdout());
            Ok(ExitStatus::Success)
        }
        Some(Commands::Convert(args)) => run_convert(args).await,
        Some(Commands::Normalize { input_path, output_dir, common }) => {
            run_normalize(&input_path, output_dir, &common)
        }
        Some(Commands::Jobs { action, common }) => run_jobs(action, &common).await,
        None => {
            // Default behavior - top-level args convert
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

            run_convert(ConvertArgs { input_path, synthesis: cli.synthesis, common: cli.common }).await
        }
    }
}

/// Load the configuration file, creating a default one when it is missing
fn load_config(common: &CommonArgs) -> Result<Config> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &common.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let config_path = &common.config_path;
    let mut config = if config_path.exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {:?}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {:?}", config_path))?
    } else {
        warn!("Config file not found at {:?}, creating default config.", config_path);

        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {:?}", config_path))?;
        config
    };

    // Update log level in config if specified via command line
    if let Some(log_level) = &common.log_level {
        config.log_level = log_level.clone().into();
    } else {
        log::set_max_level(level_filter(&config.log_level));
    }

    Ok(config)
}

/// Apply command line overrides on top of the configuration file
fn apply_overrides(config: &mut Config, args: &SynthesisArgs) {
    if let Some(provider) = &args.provider {
        config.synthesis.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        config.synthesis.active_provider_config_mut().model = model.clone();
    }
    if let Some(api_key) = &args.api_key {
        config.synthesis.active_provider_config_mut().api_key = api_key.clone();
    }
    if let Some(workers) = args.workers {
        config.synthesis.active_provider_config_mut().concurrent_requests = workers;
    }
    if let Some(voice) = &args.voice {
        config.voice = voice.clone();
    }
    if let Some(max_unit_size) = args.max_unit_size {
        config.segmentation.max_unit_size = max_unit_size;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output.output_dir = Some(output_dir.clone());
    }
    if args.separate {
        config.output.mode = OutputMode::Separate;
    }
}

async fn run_convert(args: ConvertArgs) -> Result<ExitStatus> {
    let mut config = load_config(&args.common)?;
    apply_overrides(&mut config, &args.synthesis);

    // Validate the configuration after loading and overriding
    config.validate().context("Configuration validation failed")?;

    if !args.input_path.exists() {
        return Err(anyhow!("Input path does not exist: {:?}", args.input_path));
    }

    let controller = Controller::with_config(config)?;

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing running segments (press Ctrl+C again to quit now)");
            token.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(ExitStatus::Interrupted.code());
            }
        }
    });

    controller.run(&args.input_path, args.synthesis.fresh, &cancel).await
}

fn run_normalize(input_path: &Path, output_dir: Option<PathBuf>, common: &CommonArgs) -> Result<ExitStatus> {
    let mut config = load_config(common)?;
    if output_dir.is_some() {
        config.output.output_dir = output_dir;
    }
    if !input_path.is_file() {
        return Err(anyhow!("Input file does not exist: {:?}", input_path));
    }

    Controller::normalize_document(&config, input_path)?;
    Ok(ExitStatus::Success)
}

async fn run_jobs(action: JobsAction, common: &CommonArgs) -> Result<ExitStatus> {
    let config = load_config(common)?;
    let controller = Controller::with_config(config)?;

    match action {
        JobsAction::List => {
            let jobs = controller.list_jobs().await?;
            if jobs.is_empty() {
                println!("No jobs stored.");
            }
            for job in jobs {
                println!("{}  updated {}", job, job.updated_at.format("%Y-%m-%d %H:%M"));
            }
        }
        JobsAction::Show { id, json } => {
            let Some(job) = controller.show_job(&id).await? else {
                return Err(anyhow!("No job matches '{}'", id));
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&job).context("Failed to serialize job")?);
            } else {
                println!("{}", job);
                println!("  model: {}  max unit size: {}", job.model, job.max_unit_size);
                println!("  created: {}  updated: {}", job.created_at, job.updated_at);
                for segment in job.segments.iter().filter(|s| s.last_error.is_some()) {
                    println!(
                        "  segment {} [{}] after {} attempt(s): {}",
                        segment.index,
                        segment.status,
                        segment.attempts,
                        segment.last_error.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        JobsAction::Delete { id } => {
            if !controller.delete_job(&id).await? {
                return Err(anyhow!("No job matches '{}'", id));
            }
            info!("Deleted job {}", id);
        }
        JobsAction::Cleanup { days } => {
            let removed = controller.cleanup_jobs(days).await?;
            info!("Removed {} finished job(s) older than {} days", removed, days);
        }
    }

    Ok(ExitStatus::Success)
}
