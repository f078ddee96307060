mod cli;
mod config;
mod exit_codes;
mod output;
mod run;
mod run_error;

use clap::Parser as _;
use mimalloc::MiMalloc;

use crate::run_error::RunError;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit_codes::ExitCode::Success.as_i32()
                }
                _ => exit_codes::ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match real_main(cli) {
        Ok(code) => code.as_i32(),
        Err(err) => {
            eprintln!("{err}");
            err.exit_code().as_i32()
        }
    };

    std::process::exit(code);
}

fn real_main(cli: cli::Cli) -> Result<exit_codes::ExitCode, RunError> {
    let mut config = config::Config::load(&cli.config).map_err(RunError::InvalidInput)?;
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(output) = cli.output {
        config.output = Some(output);
    }
    config.validate().map_err(RunError::InvalidInput)?;

    // The runtime is sized from the config, so it cannot be built by a
    // macro before the config is read.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.cpus)
        .enable_all()
        .build()
        .map_err(|err| RunError::Runtime(err.into()))?;

    runtime.block_on(run::run(config))
}
