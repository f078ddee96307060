use std::sync::Arc;

use hammr_core::{Requester, RunnerError, Schema};

use crate::config::Config;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(config: Config) -> Result<ExitCode, RunError> {
    let schema = Schema::compile(&config.proto, &config.import_paths)
        .map_err(|err| RunError::Schema(err.into()))?;
    let method = schema
        .method(&config.call)
        .map_err(|err| RunError::Schema(err.into()))?;

    let run_config = config.run_config().map_err(RunError::InvalidInput)?;
    let requester = Arc::new(
        Requester::new(method, run_config).map_err(|err| RunError::InvalidInput(err.into()))?,
    );

    tokio::spawn({
        let requester = requester.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping the run");
                requester.stop();
            }
        }
    });

    let report = requester.run().await.map_err(|err| match err {
        RunnerError::Transport(_) => RunError::Connect(err.into()),
        other => RunError::Runtime(other.into()),
    })?;

    output::write_report(&report, &config.format, config.output.as_deref())
        .map_err(RunError::Runtime)?;

    Ok(ExitCode::Success)
}
