//! Configuration management for the hashcash command line tool
//!
//! Settings come from command line arguments (with environment variable
//! fallbacks) layered over an optional configuration file (YAML or JSON).
//! Command line values take precedence over the file, and the file over the
//! built-in defaults.

use crate::cancel::CancelToken;
use crate::challenge::{Challenge, SolveParams};
use crate::core::{CreatedAt, Hash, Nonce, RandomNonceParams, Resource, Ttl};
use crate::layout::TemplateLayout;
use crate::worker::WorkerType;
use crate::{Error, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Layout used when none is configured
pub const DEFAULT_LAYOUT: &str = "{leadingZeroBitCount}:{payload}:{nonce}";

/// Difficulty used when neither form is configured
pub const DEFAULT_LEADING_ZERO_BIT_COUNT: i64 = 20;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Pretty,
    Json,
}

/// Command line interface
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hashcash-pow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Solve and verify hashcash-style client puzzles"
)]
pub struct Cli {
    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE", global = true, env = "HASHCASH_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long, global = true, env = "HASHCASH_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, env = "HASHCASH_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build a challenge, solve it and print the solution as JSON
    Solve(SolveArgs),
    /// Read a solution as JSON and verify it
    Verify(VerifyArgs),
    /// Print supported hashes and layout placeholders
    Info,
}

/// Arguments of `solve`
#[derive(Debug, Clone, Default, Args)]
pub struct SolveArgs {
    /// Required number of leading zero bits
    #[arg(short = 'd', long, conflicts_with = "target_bit_index")]
    pub leading_zero_bit_count: Option<i64>,

    /// Required target bit index (digest bits minus leading zero bits)
    #[arg(long)]
    pub target_bit_index: Option<i64>,

    /// Payload bound into the pre-image
    #[arg(short = 'p', long)]
    pub payload: Option<String>,

    /// Resource URL bound into the challenge
    #[arg(short = 'r', long)]
    pub resource: Option<String>,

    /// Issuance time (RFC 3339); defaults to now when a TTL is set
    #[arg(long)]
    pub created_at: Option<String>,

    /// Challenge lifetime, e.g. "10m"
    #[arg(long)]
    pub ttl: Option<String>,

    /// Hash algorithm name
    #[arg(long, env = "HASHCASH_HASH")]
    pub hash: Option<String>,

    /// Pre-image template
    #[arg(long)]
    pub layout: Option<String>,

    /// Worker type
    #[arg(short = 'w', long)]
    pub worker: Option<WorkerType>,

    /// Number of search threads for the cpu worker (0 = one per CPU)
    #[arg(short = 'c', long)]
    pub thread_count: Option<usize>,

    /// Give up after this many attempts
    #[arg(short = 'm', long)]
    pub max_attempt_count: Option<u64>,

    /// Start from a random nonce
    #[arg(long)]
    pub random_nonce: bool,

    /// Inclusive lower bound of the random start nonce
    #[arg(long)]
    pub nonce_min: Option<String>,

    /// Exclusive upper bound of the random start nonce
    #[arg(long)]
    pub nonce_max: Option<String>,

    /// Give up after this long, e.g. "30s"
    #[arg(short = 't', long)]
    pub timeout: Option<String>,

    /// Write the solution to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments of `verify`
#[derive(Debug, Clone, Default, Args)]
pub struct VerifyArgs {
    /// Solution file; reads stdin when omitted
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Also reject challenges whose lifetime has passed
    #[arg(long)]
    pub check_alive: bool,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Plain,
            file: None,
        }
    }
}

/// Settings for building and solving a challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    pub leading_zero_bit_count: Option<i64>,
    pub target_bit_index: Option<i64>,
    pub payload: Option<String>,
    pub resource: Option<String>,
    pub created_at: Option<String>,
    pub ttl: Option<String>,
    pub hash: String,
    pub layout: String,
    pub worker: WorkerType,
    pub thread_count: usize,
    pub max_attempt_count: Option<u64>,
    pub random_nonce: bool,
    pub nonce_min: Option<String>,
    pub nonce_max: Option<String>,
    pub timeout: Option<String>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            leading_zero_bit_count: None,
            target_bit_index: None,
            payload: None,
            resource: None,
            created_at: None,
            ttl: None,
            hash: default_hash(),
            layout: DEFAULT_LAYOUT.to_string(),
            worker: WorkerType::Sequential,
            thread_count: 0,
            max_attempt_count: None,
            random_nonce: false,
            nonce_min: None,
            nonce_max: None,
            timeout: None,
        }
    }
}

fn default_hash() -> String {
    Hash::sha256().name().to_string()
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub solve: SolveConfig,
}

impl Config {
    /// Load the configuration file named by `cli`, if any, and apply the command line on top
    pub async fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config_file {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::default(),
        };
        config.merge_with_cli(cli);
        // Only `solve` reads the solve section
        if let Command::Solve(_) = cli.command {
            config.validate()?;
        }
        Ok(config)
    }

    /// Load configuration from file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge command line values into the file config (command line takes precedence)
    pub fn merge_with_cli(&mut self, cli: &Cli) {
        if let Some(level) = cli.log_level {
            self.logging.level = level;
        }
        if let Some(format) = cli.log_format {
            self.logging.format = format;
        }
        if cli.log_file.is_some() {
            self.logging.file = cli.log_file.clone();
        }

        let Command::Solve(args) = &cli.command else {
            return;
        };
        let solve = &mut self.solve;

        // Either difficulty form on the command line replaces both from the file
        if args.leading_zero_bit_count.is_some() || args.target_bit_index.is_some() {
            solve.leading_zero_bit_count = args.leading_zero_bit_count;
            solve.target_bit_index = args.target_bit_index;
        }

        override_with(&mut solve.payload, &args.payload);
        override_with(&mut solve.resource, &args.resource);
        override_with(&mut solve.created_at, &args.created_at);
        override_with(&mut solve.ttl, &args.ttl);
        override_with(&mut solve.max_attempt_count, &args.max_attempt_count);
        override_with(&mut solve.nonce_min, &args.nonce_min);
        override_with(&mut solve.nonce_max, &args.nonce_max);
        override_with(&mut solve.timeout, &args.timeout);

        if let Some(hash) = &args.hash {
            solve.hash = hash.clone();
        }
        if let Some(layout) = &args.layout {
            solve.layout = layout.clone();
        }
        if let Some(worker) = args.worker {
            solve.worker = worker;
        }
        if let Some(thread_count) = args.thread_count {
            solve.thread_count = thread_count;
        }
        if args.random_nonce {
            solve.random_nonce = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let solve = &self.solve;

        Hash::from_name(&solve.hash)
            .map_err(|e| Error::config(format!("Invalid hash: {}", e)))?;

        TemplateLayout::new(solve.layout.as_str())
            .map_err(|e| Error::config(format!("Invalid layout: {}", e)))?;

        if solve.leading_zero_bit_count.is_some() && solve.target_bit_index.is_some() {
            return Err(Error::config(
                "Only one of leading_zero_bit_count and target_bit_index may be set",
            ));
        }

        if let Some(created_at) = &solve.created_at {
            created_at
                .parse::<CreatedAt>()
                .map_err(|e| Error::config(e.to_string()))?;
        }
        if let Some(ttl) = &solve.ttl {
            ttl.parse::<Ttl>().map_err(|e| Error::config(e.to_string()))?;
        }
        if let Some(resource) = &solve.resource {
            resource
                .parse::<Resource>()
                .map_err(|e| Error::config(e.to_string()))?;
        }
        if solve.created_at.is_some() && solve.ttl.is_none() {
            return Err(Error::config("created_at requires a ttl"));
        }

        solve.timeout()?;

        let (min, max) = solve.nonce_range()?;
        if solve.random_nonce && max <= min {
            return Err(Error::config(format!(
                "Random nonce range [{}, {}) is empty",
                min, max
            )));
        }

        Ok(())
    }
}

fn override_with<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *target = value.clone();
    }
}

impl SolveConfig {
    /// Build the configured challenge
    ///
    /// A TTL without an explicit issuance time is anchored at the current time.
    pub fn challenge(&self) -> Result<Challenge> {
        let mut builder = Challenge::builder()
            .hash(Hash::from_name(&self.hash)?)
            .layout(TemplateLayout::new(self.layout.as_str())?);

        match (self.leading_zero_bit_count, self.target_bit_index) {
            (None, None) => {
                info!(
                    leading_zero_bit_count = DEFAULT_LEADING_ZERO_BIT_COUNT,
                    "No difficulty configured, using the default"
                );
                builder = builder.leading_zero_bit_count(DEFAULT_LEADING_ZERO_BIT_COUNT);
            }
            (count, index) => {
                if let Some(count) = count {
                    builder = builder.leading_zero_bit_count(count);
                }
                if let Some(index) = index {
                    builder = builder.target_bit_index(index);
                }
            }
        }

        if let Some(payload) = &self.payload {
            builder = builder.payload(payload.as_str());
        }
        if let Some(resource) = &self.resource {
            builder = builder.resource(resource.parse::<Resource>()?);
        }
        if let Some(ttl) = &self.ttl {
            let created_at = match &self.created_at {
                Some(created_at) => created_at.parse::<CreatedAt>()?,
                None => {
                    let now = CreatedAt::now();
                    info!(created_at = %now, "TTL set without created_at, anchoring at the current time");
                    now
                }
            };
            builder = builder.ttl(ttl.parse::<Ttl>()?).created_at(created_at);
        } else if let Some(created_at) = &self.created_at {
            builder = builder.created_at(created_at.parse::<CreatedAt>()?);
        }

        builder.build()
    }

    /// Solve parameters for the configured budget and start nonce
    pub fn solve_params(&self) -> Result<SolveParams> {
        let mut params = SolveParams::new();
        if let Some(max_attempt_count) = self.max_attempt_count {
            params = params.with_max_attempt_count(max_attempt_count);
        }
        if self.random_nonce {
            let (min, max) = self.nonce_range()?;
            params = params.with_random_initial_nonce(RandomNonceParams::system(min, max));
        }
        Ok(params)
    }

    /// Cancellation token honouring the configured timeout
    pub fn cancel_token(&self) -> Result<CancelToken> {
        Ok(match self.timeout()? {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        })
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|timeout| {
                humantime::parse_duration(timeout)
                    .map_err(|e| Error::config(format!("Invalid timeout: {}", e)))
            })
            .transpose()
    }

    /// Random start range, `[0, 2^64)` unless configured
    fn nonce_range(&self) -> Result<(BigUint, BigUint)> {
        let parse = |value: &Option<String>, default: BigUint| -> Result<BigUint> {
            match value {
                Some(value) => value
                    .parse::<Nonce>()
                    .map(|nonce| nonce.value().clone())
                    .map_err(|e| Error::config(e.to_string())),
                None => Ok(default),
            }
        };
        let min = parse(&self.nonce_min, BigUint::default())?;
        let max = parse(&self.nonce_max, BigUint::from(u64::MAX) + 1u32)?;
        Ok((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationIssue;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&["hashcash-pow", "solve", "-p", "dummy"]);
        let mut config = Config::default();
        config.merge_with_cli(&cli);

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Plain);
        assert_eq!(config.solve.hash, "SHA-256");
        assert_eq!(config.solve.layout, DEFAULT_LAYOUT);
        assert_eq!(config.solve.worker, WorkerType::Sequential);
        assert_eq!(config.solve.payload.as_deref(), Some("dummy"));
        config.validate().unwrap();
    }

    #[test]
    fn test_cli_rejects_both_difficulty_forms() {
        let result = Cli::try_parse_from([
            "hashcash-pow",
            "solve",
            "-d",
            "5",
            "--target-bit-index",
            "251",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_from_yaml() {
        let yaml_content = r#"
logging:
  level: debug
  format: json
solve:
  leading_zero_bit_count: 8
  hash: BLAKE2b-512
  worker: cpu
  thread_count: 4
  ttl: 10m
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.solve.leading_zero_bit_count, Some(8));
        assert_eq!(config.solve.hash, "BLAKE2b-512");
        assert_eq!(config.solve.worker, WorkerType::Cpu);
        assert_eq!(config.solve.thread_count, 4);
        assert_eq!(config.solve.layout, DEFAULT_LAYOUT);
    }

    #[tokio::test]
    async fn test_config_from_json() {
        let mut temp_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            temp_file,
            r#"{{"solve": {{"target_bit_index": 240, "payload": "from file"}}}}"#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.solve.target_bit_index, Some(240));
        assert_eq!(config.solve.payload.as_deref(), Some("from file"));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[tokio::test]
    async fn test_cli_overrides_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            "solve:\n  leading_zero_bit_count: 8\n  payload: file\n  hash: SHA-512\n"
        )
        .unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let cli = parse(&[
            "hashcash-pow",
            "--config-file",
            &path,
            "solve",
            "--target-bit-index",
            "250",
            "-p",
            "cli",
        ]);
        let config = Config::load(&cli).await.unwrap();

        assert_eq!(config.solve.leading_zero_bit_count, None);
        assert_eq!(config.solve.target_bit_index, Some(250));
        assert_eq!(config.solve.payload.as_deref(), Some("cli"));
        assert_eq!(config.solve.hash, "SHA-512");
        assert_eq!(config.solve.challenge().unwrap().leading_zero_bit_count().get(), 262);
    }

    #[tokio::test]
    async fn test_bad_solve_section_only_fails_solve() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            "solve:\n  hash: MD5\n  created_at: 2000-01-01T00:00:00Z\n"
        )
        .unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        for command in ["verify", "info"] {
            let cli = parse(&["hashcash-pow", "--config-file", &path, command]);
            let config = Config::load(&cli).await.unwrap();
            assert_eq!(config.solve.hash, "MD5");
        }

        let cli = parse(&["hashcash-pow", "--config-file", &path, "solve", "-p", "dummy"]);
        assert_matches!(Config::load(&cli).await, Err(Error::Config { .. }));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults_are_logged() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let config = SolveConfig {
            payload: Some("dummy".to_string()),
            ttl: Some("5m".to_string()),
            ..SolveConfig::default()
        };
        tracing::subscriber::with_default(subscriber, || config.challenge().unwrap());

        let logs = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert!(logs.contains("No difficulty configured, using the default"));
        assert!(logs.contains("anchoring at the current time"));

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .finish();
        let config = SolveConfig {
            payload: Some("dummy".to_string()),
            leading_zero_bit_count: Some(3),
            ..SolveConfig::default()
        };
        tracing::subscriber::with_default(subscriber, || config.challenge().unwrap());
        assert!(buffer.0.lock().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.solve.hash = "MD5".to_string();
        assert_matches!(config.validate(), Err(Error::Config { .. }));

        let mut config = Config::default();
        config.solve.layout = "{oops".to_string();
        assert_matches!(config.validate(), Err(Error::Config { .. }));

        let mut config = Config::default();
        config.solve.timeout = Some("soon".to_string());
        assert_matches!(config.validate(), Err(Error::Config { .. }));

        let mut config = Config::default();
        config.solve.random_nonce = true;
        config.solve.nonce_min = Some("10".to_string());
        config.solve.nonce_max = Some("10".to_string());
        assert_matches!(config.validate(), Err(Error::Config { .. }));
    }

    #[test]
    fn test_challenge_from_config() {
        let config = SolveConfig {
            payload: Some("dummy".to_string()),
            leading_zero_bit_count: Some(5),
            ..SolveConfig::default()
        };
        let challenge = config.challenge().unwrap();
        assert_eq!(challenge.leading_zero_bit_count().get(), 5);
        assert_eq!(challenge.payload().as_bytes(), b"dummy");

        let config = SolveConfig {
            payload: Some("dummy".to_string()),
            ttl: Some("5m".to_string()),
            ..SolveConfig::default()
        };
        let challenge = config.challenge().unwrap();
        assert_eq!(
            challenge.leading_zero_bit_count().get(),
            DEFAULT_LEADING_ZERO_BIT_COUNT as u32
        );
        assert!(challenge.created_at().is_some());
        assert!(challenge.is_alive());
    }

    #[test]
    fn test_challenge_requires_payload() {
        let err = SolveConfig::default().challenge().unwrap_err();
        assert_eq!(err.validation_issues(), &[ValidationIssue::MissingField("payload")]);
    }

    #[test]
    fn test_solve_params_and_timeout() {
        let config = SolveConfig {
            max_attempt_count: Some(50),
            random_nonce: true,
            nonce_min: Some("100".to_string()),
            nonce_max: Some("200".to_string()),
            timeout: Some("1h".to_string()),
            ..SolveConfig::default()
        };
        let params = config.solve_params().unwrap();
        assert_eq!(params.max_attempt_count, Some(50));
        let random = params.random_initial_nonce.as_ref().unwrap();
        assert_eq!(random.min(), &BigUint::from(100u32));
        assert_eq!(random.max(), &BigUint::from(200u32));
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(3600)));
        assert!(!config.cancel_token().unwrap().is_cancelled());
    }
}
