use mcpwire::logging::{init_logging_with_config, LogConfig};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let _guard = init_logging_with_config(&LogConfig::from_env())?;
    mcpwire::cli::run_cli()
}
