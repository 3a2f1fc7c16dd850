//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use crmsync_core::pipeline::{ProgressReporter, SyncReport};
use crmsync_shared::{AppConfig, SyncConfig, init_config, load_config, validate_api_token};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// crmsync — fold web-form submissions into a CRM export.
#[derive(Parser)]
#[command(
    name = "crmsync",
    version,
    about = "Reconcile a CRM export with web-form submissions into a sorted CRM update.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch both sources, reconcile them and write the CSV outputs.
    Run {
        /// Base URL of the data API (overrides config).
        #[arg(long, env = "CRMSYNC_BASE_URL")]
        base_url: Option<String>,

        /// Output directory for the CSV files (overrides config).
        #[arg(short, long)]
        out: Option<String>,

        /// Prefix for synthesized contact ids (overrides config).
        #[arg(long)]
        id_prefix: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "crmsync=info,crmsync_core=info,crmsync_source=info,crmsync_extract=warn",
        1 => "crmsync=debug,crmsync_core=debug,crmsync_source=debug,crmsync_extract=info",
        _ => "crmsync=trace,crmsync_core=trace,crmsync_source=trace,crmsync_extract=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            base_url,
            out,
            id_prefix,
        } => cmd_run(base_url.as_deref(), out.as_deref(), id_prefix.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(base_url: Option<&str>, out: Option<&str>, id_prefix: Option<&str>) -> Result<()> {
    let mut config = load_config()?;
    apply_overrides(&mut config, base_url, out, id_prefix)?;

    // Fail on a missing token before touching the network
    let token = validate_api_token(&config)?;
    let sync_config = SyncConfig::from_app(&config, token)?;

    info!(
        base_url = %sync_config.base_url,
        out = %sync_config.output_dir.display(),
        "starting CRM sync"
    );

    let reporter = CliProgress::new()?;
    let report = crmsync_core::pipeline::run_sync(&sync_config, &reporter).await?;

    print_report(&report);
    Ok(())
}

/// Layer CLI flags over the file config.
fn apply_overrides(
    config: &mut AppConfig,
    base_url: Option<&str>,
    out: Option<&str>,
    id_prefix: Option<&str>,
) -> Result<()> {
    if let Some(url) = base_url {
        Url::parse(url).map_err(|e| eyre!("invalid base URL '{url}': {e}"))?;
        config.api.base_url = url.to_string();
    }
    if let Some(dir) = out {
        config.output.dir = dir.to_string();
    }
    if let Some(prefix) = id_prefix {
        config.merge.id_prefix = prefix.to_string();
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let merge = &report.merge;

    println!();
    println!("  CRM update written!");
    println!("  CRM records:      {}", report.crm_records);
    println!("  Form submissions: {}", report.form_submissions);
    println!(
        "  Matched:          {} by email, {} by phone, {} by name",
        merge.matched_by_email, merge.matched_by_phone, merge.matched_by_name
    );
    if merge.undated_skipped > 0 {
        println!("  Undated, skipped: {}", merge.undated_skipped);
    }
    println!(
        "  New contacts:     {} ({} repeat submissions folded in)",
        merge.new_contacts, merge.folded_into_new
    );
    for (priority, count) in &report.priorities {
        println!("  {:<24}{count}", format!("{priority}:"));
    }
    println!("  Output:           {}", report.update_path.display());
    println!("  Time:             {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _report: &SyncReport) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
