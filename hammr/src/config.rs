use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context as _};
use serde::{Deserialize, Serialize};

use hammr_core::{RunConfig, TlsMode};

const FORMATS: [&str; 5] = ["", "csv", "json", "pretty", "html"];

/// The JSON configuration file surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Path to the schema file (.proto).
    pub proto: PathBuf,
    /// Fully-qualified method, `pkg.Service/Method`.
    pub call: String,
    pub host: String,

    /// Total calls. 0 falls back to the default of 200.
    pub n: u64,
    /// Concurrency. 0 falls back to the default of 50.
    pub c: u64,
    /// Target global rate in calls per second. 0 means unthrottled.
    #[serde(alias = "qps")]
    pub q: u64,
    /// Maximum run duration, e.g. "10s".
    pub z: Option<String>,
    /// Per-call timeout in seconds. 0 falls back to the default of 20.
    #[serde(alias = "timeout")]
    pub t: u64,

    pub data: Option<serde_json::Value>,
    pub data_path: Option<PathBuf>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub metadata_path: Option<PathBuf>,

    /// CA certificate file; TLS uses system roots when unset.
    pub cert: Option<PathBuf>,
    /// Server name override for certificate verification.
    pub cname: Option<String>,
    /// Disable TLS entirely.
    pub insecure: bool,

    /// Worker-thread count for the runtime. 0 means all available cores.
    pub cpus: usize,
    pub import_paths: Vec<PathBuf>,

    /// Report format, one of "", csv, json, pretty, html.
    pub format: String,
    /// Report destination, stdout when unset.
    pub output: Option<PathBuf>,

    /// Connect timeout in seconds. 0 falls back to the default of 10.
    pub dial_timeout: u64,
    /// HTTP/2 keepalive interval in seconds. 0 disables keepalive.
    pub keepalive: u64,
}

impl Config {
    /// Reads, parses, defaults, validates, and resolves the data and
    /// metadata indirections.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config = Self::parse(&raw)?;
        config.resolve_data()?;
        config.resolve_metadata()?;
        Ok(config)
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut config: Config = serde_json::from_str(raw).context("parsing config json")?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.n == 0 {
            self.n = 200;
        }
        if self.c == 0 {
            self.c = 50;
        }
        if self.t == 0 {
            self.t = 20;
        }
        if self.dial_timeout == 0 {
            self.dial_timeout = 10;
        }
        if self.cpus == 0 {
            self.cpus = std::thread::available_parallelism()
                .map(|v| v.get())
                .unwrap_or(1);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.proto.as_os_str().is_empty() {
            bail!("proto: is required");
        }
        if self.proto.extension().and_then(|ext| ext.to_str()) != Some("proto") {
            bail!("proto: must have .proto extension");
        }
        if self.call.trim().is_empty() {
            bail!("call: is required");
        }
        if self.host.trim().is_empty() {
            bail!("host: is required");
        }
        if self.data.is_none() && self.data_path.is_none() {
            bail!("data: is required");
        }
        if let Some(z) = &self.z {
            humantime::parse_duration(z.trim())
                .with_context(|| format!("z: invalid duration '{z}'"))?;
        }
        if !FORMATS.contains(&self.format.as_str()) {
            bail!("format: must be one of csv, json, pretty, html");
        }
        Ok(())
    }

    fn resolve_data(&mut self) -> anyhow::Result<()> {
        if self.data.is_some() {
            return Ok(());
        }
        if let Some(path) = &self.data_path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading dataPath {}", path.display()))?;
            self.data = Some(serde_json::from_str(&raw).context("parsing dataPath json")?);
        }
        Ok(())
    }

    fn resolve_metadata(&mut self) -> anyhow::Result<()> {
        if self.metadata.as_ref().is_some_and(|md| !md.is_empty()) {
            return Ok(());
        }
        if let Some(path) = &self.metadata_path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading metadataPath {}", path.display()))?;
            self.metadata = Some(serde_json::from_str(&raw).context("parsing metadataPath json")?);
        }
        Ok(())
    }

    /// Maps the file surface onto the runner's options.
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let z = match &self.z {
            Some(z) => Some(
                humantime::parse_duration(z.trim())
                    .with_context(|| format!("z: invalid duration '{z}'"))?,
            ),
            None => None,
        };

        let tls = if self.insecure {
            TlsMode::Insecure
        } else if let Some(path) = &self.cert {
            TlsMode::FileCert {
                path: path.clone(),
                server_name: self
                    .cname
                    .clone()
                    .filter(|name| !name.trim().is_empty()),
            }
        } else {
            TlsMode::SystemRoots
        };

        let data = self
            .data
            .clone()
            .context("data: is required")?;

        Ok(RunConfig {
            host: self.host.clone(),
            n: self.n,
            c: self.c,
            qps: self.q,
            z,
            timeout: Some(Duration::from_secs(self.t)),
            dial_timeout: Some(Duration::from_secs(self.dial_timeout)),
            keepalive: (self.keepalive > 0).then(|| Duration::from_secs(self.keepalive)),
            data,
            metadata: self.metadata.clone().filter(|md| !md.is_empty()),
            tls,
        })
    }
}
