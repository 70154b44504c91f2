use clap::{ArgAction, Parser};
use pvc_plumber_backends::{KopiaConfig, S3Config};
use pvc_plumber_core::{BackendKind, Error, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "pvc-plumber",
    version,
    about = "Answers whether a backup exists for a namespace/PVC pair",
    long_about = "pvc-plumber serves /exists/{namespace}/{pvc}, backed by an S3 bucket listing or a kopia filesystem repository"
)]
pub struct Cli {
    #[arg(long = "backend", env = "BACKEND_TYPE", default_value = "s3", help = "Backend to query (s3 or kopia-fs)")]
    pub backend: String,

    #[arg(long, env = "HTTP_TIMEOUT", default_value = "3s", value_parser = parse_duration, help = "Timeout for each backend call")]
    pub http_timeout: Duration,

    #[arg(long, env = "PORT", default_value_t = 8080, help = "HTTP listen port")]
    pub port: u16,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", help = "Log level (debug, info, warn, error)")]
    pub log_level: String,

    #[arg(long, env = "S3_ENDPOINT", help = "S3 endpoint, host:port or URL")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "S3_BUCKET", help = "S3 bucket holding backups")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true, help = "S3 access key")]
    pub s3_access_key: Option<String>,

    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true, help = "S3 secret key")]
    pub s3_secret_key: Option<String>,

    #[arg(
        long,
        env = "S3_SECURE",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = parse_bool,
        help = "Use https when the endpoint has no scheme"
    )]
    pub s3_secure: bool,

    #[arg(long, env = "KOPIA_REPOSITORY_PATH", default_value = "/repository", help = "Kopia filesystem repository path")]
    pub kopia_repository_path: PathBuf,

    #[arg(long, env = "KOPIA_PASSWORD", hide_env_values = true, help = "Kopia repository password")]
    pub kopia_password: Option<String>,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    S3(S3Config),
    KopiaFs(KopiaConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::S3(_) => BackendKind::S3,
            BackendConfig::KopiaFs(_) => BackendKind::KopiaFs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub http_timeout: Duration,
    pub log_level: String,
    pub backend: BackendConfig,
}

impl Config {
    /// Validates parsed arguments. Only the selected backend's settings are checked.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.http_timeout.is_zero() {
            return Err(Error::Config(
                "invalid HTTP_TIMEOUT: must be greater than zero".to_string(),
            ));
        }

        let kind: BackendKind = cli
            .backend
            .parse()
            .map_err(|e| Error::Config(format!("invalid BACKEND_TYPE: {}", e)))?;

        let backend = match kind {
            BackendKind::S3 => BackendConfig::S3(S3Config {
                endpoint: required(cli.s3_endpoint, "S3_ENDPOINT")?,
                bucket: required(cli.s3_bucket, "S3_BUCKET")?,
                access_key: required(cli.s3_access_key, "S3_ACCESS_KEY")?,
                secret_key: required(cli.s3_secret_key, "S3_SECRET_KEY")?,
                secure: cli.s3_secure,
                timeout: cli.http_timeout,
            }),
            BackendKind::KopiaFs => {
                if !cli.kopia_repository_path.exists() {
                    return Err(Error::Config(format!(
                        "KOPIA_REPOSITORY_PATH {} does not exist",
                        cli.kopia_repository_path.display()
                    )));
                }
                BackendConfig::KopiaFs(KopiaConfig {
                    repository_path: cli.kopia_repository_path,
                    password: required(cli.kopia_password, "KOPIA_PASSWORD")
                        .map_err(|_| Error::Config("KOPIA_PASSWORD is required for kopia-fs backend".to_string()))?,
                    timeout: cli.http_timeout,
                })
            }
        };

        Ok(Self {
            port: cli.port,
            http_timeout: cli.http_timeout,
            log_level: cli.log_level,
            backend,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{} is required", name)))
}

/// Accepts `1`, `t`, `true` and `0`, `f`, `false` in lower, upper or title case.
pub fn parse_bool(input: &str) -> std::result::Result<bool, String> {
    match input {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(format!("invalid boolean {:?}", other)),
    }
}

/// Parses durations such as `3s`, `500ms`, `1.5s` or `1m30s`.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut nanos = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", input))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {:?}", input)),
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        nanos += value * scale;
        rest = &rest[unit_end..];
    }

    Ok(Duration::from_nanos(nanos as u64))
}
