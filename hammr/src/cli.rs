use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "hammr",
    author,
    version,
    about = "Schema-driven gRPC load generator",
    long_about = "hammr drives a configured workload against a single gRPC method and reports \
                  per-call latency statistics.\n\nThe run is described by a JSON configuration \
                  file: the .proto schema, the fully-qualified method, the target host, the \
                  payload (optionally templated per call), and the load shape (total calls, \
                  concurrency, rate limit, duration).",
    after_help = "Examples:\n  hammr run.json\n  hammr run.json --format pretty\n  hammr run.json --format html --output report.html"
)]
pub struct Cli {
    /// Path to the run configuration (JSON).
    pub config: PathBuf,

    /// Report format: "", csv, json, pretty, or html (overrides the config file).
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Report output path, stdout if omitted (overrides the config file).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_path_and_overrides() {
        let parsed = Cli::try_parse_from([
            "hammr",
            "run.json",
            "--format",
            "pretty",
            "--output",
            "out/report.json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        assert_eq!(cli.config, PathBuf::from("run.json"));
        assert_eq!(cli.format.as_deref(), Some("pretty"));
        assert_eq!(cli.output, Some(PathBuf::from("out/report.json")));
    }

    #[test]
    fn config_path_is_required() {
        assert!(Cli::try_parse_from(["hammr"]).is_err());
    }
}
