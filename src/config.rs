//! Environment-driven configuration.
//!
//! All settings come from process environment variables (a `.env` file in
//! the working directory is loaded first by the binary). Validation collects
//! every problem before failing so an operator sees the whole list at once:
//!
//! ```text
//! Invalid configuration:
//! DATABASE_URL: required
//! S3_ENDPOINT: invalid url (relative URL without a base)
//! ```
//!
//! # Variables
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `APP_ENV` | no | `development` |
//! | `BIND_ADDR` | no | `127.0.0.1:3000` |
//! | `DATABASE_URL` | yes | |
//! | `REDIS_URL` | no | |
//! | `S3_ENDPOINT` | yes | |
//! | `S3_ACCESS_KEY_ID` | yes | |
//! | `S3_SECRET_ACCESS_KEY` | yes | |
//! | `S3_BUCKET` | yes | |
//! | `S3_REGION` | no | `us-east-1` |
//! | `S3_FORCE_PATH_STYLE` | no | `true` |
//! | `LANGFUSE_HOST`, `LANGFUSE_PUBLIC_KEY`, `LANGFUSE_SECRET_KEY` | no | |
//! | `OPENAI_API_BASE`, `OPENAI_API_KEY` | no | |
//!
//! Empty values are treated as unset.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Deployment environment name, reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Test => "test",
            AppEnv::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: AppEnv,
    pub server: ServerConfig,
    pub db: DbConfig,
    pub redis_url: Option<String>,
    pub s3: S3Config,
    pub langfuse: LangfuseConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    /// Address buckets as `{endpoint}/{bucket}` instead of `{bucket}.{endpoint}`.
    pub force_path_style: bool,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LangfuseConfig {
    pub host: Option<String>,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OpenAiConfig {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
}

/// Every configuration problem found in one pass.
#[derive(Debug, Error)]
#[error("Invalid configuration:\n{}", .issues.join("\n"))]
pub struct ConfigError {
    pub issues: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut reader = VarReader::new(vars);

        let env = match reader.optional("APP_ENV").as_deref() {
            None | Some("development") => AppEnv::Development,
            Some("test") => AppEnv::Test,
            Some("production") => AppEnv::Production,
            Some(other) => {
                reader.issue(
                    "APP_ENV",
                    format!("expected development, test or production, got '{}'", other),
                );
                AppEnv::Development
            }
        };

        let bind = reader.optional("BIND_ADDR").unwrap_or_else(default_bind);
        if bind.parse::<SocketAddr>().is_err() {
            reader.issue("BIND_ADDR", format!("not a socket address: '{}'", bind));
        }

        let db = DbConfig {
            url: reader.required_url("DATABASE_URL"),
        };
        let redis_url = reader.optional_url("REDIS_URL");

        let s3 = S3Config {
            endpoint: reader.required_url("S3_ENDPOINT"),
            access_key_id: reader.required("S3_ACCESS_KEY_ID"),
            secret_access_key: reader.required("S3_SECRET_ACCESS_KEY"),
            bucket: reader.required("S3_BUCKET"),
            region: reader.optional("S3_REGION").unwrap_or_else(default_region),
            force_path_style: reader.flag("S3_FORCE_PATH_STYLE", true),
        };

        let langfuse = LangfuseConfig {
            host: reader.optional_url("LANGFUSE_HOST"),
            public_key: reader.optional("LANGFUSE_PUBLIC_KEY"),
            secret_key: reader.optional("LANGFUSE_SECRET_KEY"),
        };

        let openai = OpenAiConfig {
            api_base: reader.optional_url("OPENAI_API_BASE"),
            api_key: reader.optional("OPENAI_API_KEY"),
        };

        reader.finish()?;

        Ok(Config {
            env,
            server: ServerConfig { bind },
            db,
            redis_url,
            s3,
            langfuse,
            openai,
        })
    }

    pub fn has_db(&self) -> bool {
        !self.db.url.is_empty()
    }

    pub fn has_redis(&self) -> bool {
        self.redis_url.is_some()
    }

    pub fn has_s3(&self) -> bool {
        !self.s3.endpoint.is_empty() && !self.s3.bucket.is_empty()
    }
}

/// Reads variables and accumulates validation issues.
struct VarReader {
    vars: HashMap<String, String>,
    issues: Vec<String>,
}

impl VarReader {
    fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            issues: Vec::new(),
        }
    }

    fn issue(&mut self, key: &str, message: impl Into<String>) {
        self.issues.push(format!("{}: {}", key, message.into()));
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn required(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(v) => v,
            None => {
                self.issue(key, "required");
                String::new()
            }
        }
    }

    fn required_url(&mut self, key: &str) -> String {
        let value = self.required(key);
        if !value.is_empty() {
            self.check_url(key, &value);
        }
        value
    }

    fn optional_url(&mut self, key: &str) -> Option<String> {
        let value = self.optional(key);
        if let Some(ref v) = value {
            self.check_url(key, v);
        }
        value
    }

    fn check_url(&mut self, key: &str, value: &str) {
        if let Err(e) = Url::parse(value) {
            self.issue(key, format!("invalid url ({})", e));
        }
    }

    fn flag(&mut self, key: &str, default: bool) -> bool {
        let Some(raw) = self.optional(key) else {
            return default;
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                self.issue(key, format!("expected a boolean, got '{}'", raw));
                default
            }
        }
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError {
                issues: self.issues,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "sqlite://data/datasets.sqlite"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("S3_ACCESS_KEY_ID", "minio"),
            ("S3_SECRET_ACCESS_KEY", "minio123"),
            ("S3_BUCKET", "datasets"),
        ]
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let cfg = Config::from_vars(base_vars()).unwrap();
        assert_eq!(cfg.env, AppEnv::Development);
        assert_eq!(cfg.server.bind, "127.0.0.1:3000");
        assert_eq!(cfg.s3.region, "us-east-1");
        assert!(cfg.s3.force_path_style);
        assert!(cfg.has_db());
        assert!(cfg.has_s3());
        assert!(!cfg.has_redis());
    }

    #[test]
    fn missing_values_are_reported_together() {
        let err = Config::from_vars(vec![("S3_ENDPOINT", "not a url")]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid configuration:"));
        assert!(msg.contains("DATABASE_URL: required"));
        assert!(msg.contains("S3_ENDPOINT: invalid url"));
        assert!(msg.contains("S3_ACCESS_KEY_ID: required"));
        assert!(msg.contains("S3_SECRET_ACCESS_KEY: required"));
        assert!(msg.contains("S3_BUCKET: required"));
        assert_eq!(err.issues.len(), 5);
    }

    #[test]
    fn empty_optional_values_count_as_unset() {
        let mut vars = base_vars();
        vars.push(("REDIS_URL", ""));
        vars.push(("OPENAI_API_BASE", "  "));
        let cfg = Config::from_vars(vars).unwrap();
        assert!(cfg.redis_url.is_none());
        assert!(cfg.openai.api_base.is_none());
    }

    #[test]
    fn malformed_optional_url_is_rejected() {
        let mut vars = base_vars();
        vars.push(("LANGFUSE_HOST", "langfuse"));
        let err = Config::from_vars(vars).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0].starts_with("LANGFUSE_HOST"));
    }

    #[test]
    fn env_and_flags_are_parsed() {
        let mut vars = base_vars();
        vars.push(("APP_ENV", "production"));
        vars.push(("S3_FORCE_PATH_STYLE", "false"));
        vars.push(("REDIS_URL", "redis://localhost:6379"));
        let cfg = Config::from_vars(vars).unwrap();
        assert_eq!(cfg.env, AppEnv::Production);
        assert!(!cfg.s3.force_path_style);
        assert!(cfg.has_redis());
    }

    #[test]
    fn unknown_env_and_bad_bind_are_rejected() {
        let mut vars = base_vars();
        vars.push(("APP_ENV", "staging"));
        vars.push(("BIND_ADDR", "localhost"));
        let err = Config::from_vars(vars).unwrap_err();
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn debug_output_hides_secret() {
        let cfg = Config::from_vars(base_vars()).unwrap();
        let dbg = format!("{:?}", cfg.s3);
        assert!(!dbg.contains("minio123"));
        assert!(dbg.contains("<redacted>"));
    }
}
