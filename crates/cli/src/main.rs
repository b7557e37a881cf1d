// m204 CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use m204_cli::commands::{self, Context};
use m204_cli::config::ConsoleConfig;
use m204_cli::exit_code::ExitCode;
use m204_cli::output::{self, OutputFormat};

#[derive(Parser)]
#[command(name = "m204", version, about = "M204 to COBOL migration console")]
struct Cli {
    /// Backend base URL (overrides config and M204_BACKEND_URL)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Force JSON output
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let mut config = ConsoleConfig::load();
    if let Some(base_url) = cli.base_url {
        config.backend_url = base_url;
    }
    init_tracing(&config, cli.verbose);

    let format = OutputFormat::detect(cli.json);
    let ctx = Context::new(config, format);
    match commands::run(cli.command, &ctx) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            ExitCode::from_error(&error).into()
        }
    }
}

fn init_tracing(config: &ConsoleConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(config.effective_log_filter(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.effective_log_filter(false)))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
