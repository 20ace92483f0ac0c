use std::process::ExitCode;

use clap::Parser;
use zypper_docker::cli::Cli;

/// Entry point for zypper-docker.
///
/// Logging is controlled by `RUST_LOG`; `--debug` lowers the default level to
/// `debug`. The exit code is `0` on success, the package manager's
/// informational code for listing commands and `1` on any failure.
///
/// # Examples
///
/// ```bash
/// zypper-docker list-patches opensuse/leap:15.6
/// zypper-docker patch opensuse/leap:15.6 opensuse/leap:15.6-patched
/// ```
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match zypper_docker::run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
