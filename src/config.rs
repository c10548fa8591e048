//! Environment-driven settings for the Oracle, Salesforce and ABR connections.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file (`.env` for the default profile, `.env.<profile>` otherwise). Variables
//! already present in the environment take precedence over the file.

use crate::error::{MigrationError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_API_VERSION: &str = "59.0";

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub sid: String,
}

impl OracleSettings {
    /// Easy Connect string understood by the Oracle client.
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.sid)
    }
}

#[derive(Debug, Clone)]
pub struct SalesforceSettings {
    pub username: String,
    pub password: String,
    pub security_token: String,
    /// `login` for production, `test` for sandboxes such as SIT.
    pub domain: String,
    pub api_version: String,
}

impl SalesforceSettings {
    pub fn login_url(&self) -> String {
        format!(
            "https://{}.salesforce.com/services/Soap/u/{}",
            self.domain, self.api_version
        )
    }
}

#[derive(Debug, Clone)]
pub struct AbrSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub trust_cert: bool,
}

/// Run artifact directories.
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
}

impl OutputDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn test_output(&self) -> PathBuf {
        self.root.join("test_output")
    }

    pub fn mappings(&self) -> PathBuf {
        self.root.join("mappings")
    }

    pub fn errors(&self) -> PathBuf {
        self.root.join("error")
    }

    /// Create all artifact directories.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.test_output(), self.mappings(), self.errors()] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: Option<String>,
    pub oracle: Option<OracleSettings>,
    pub salesforce: Option<SalesforceSettings>,
    pub abr: Option<AbrSettings>,
    pub output: OutputDirs,
}

impl Settings {
    /// Load the env file for `profile` (if present) and read settings from the environment.
    pub fn load(profile: Option<&str>) -> Result<Self> {
        let file = env_file_name(profile);
        match dotenv::from_filename(&file) {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No env file {} ({}), using process environment", file, e),
        }

        let mut settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        settings.profile = profile.map(str::to_string);
        Ok(settings)
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| MigrationError::Config(format!("{} is not set", key)))
        };

        let oracle = match get("ORACLE_USER") {
            Some(user) => Some(OracleSettings {
                user,
                password: require("ORACLE_PASSWORD")?,
                host: require("ORACLE_HOST")?,
                port: parse_port(get("ORACLE_PORT"), 1521, "ORACLE_PORT")?,
                sid: require("ORACLE_SID")?,
            }),
            None => None,
        };

        let salesforce = match get("SF_USERNAME") {
            Some(username) => Some(SalesforceSettings {
                username,
                password: require("SF_PASSWORD")?,
                // An org with trusted IP ranges may not need a token.
                security_token: get("SF_SECURITY_TOKEN").unwrap_or_default(),
                domain: get("SF_DOMAIN").unwrap_or_else(|| "test".to_string()),
                api_version: get("SF_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            }),
            None => None,
        };

        let abr = match get("ABR_HOST") {
            Some(host) => Some(AbrSettings {
                host,
                port: parse_port(get("ABR_PORT"), 1433, "ABR_PORT")?,
                database: require("ABR_DATABASE")?,
                user: require("ABR_USER")?,
                password: require("ABR_PASSWORD")?,
                trust_cert: get("ABR_TRUST_CERT")
                    .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                    .unwrap_or(true),
            }),
            None => None,
        };

        let output = OutputDirs::new(get("MIGRATION_OUTPUT_DIR").unwrap_or_else(|| ".".to_string()));

        Ok(Self {
            profile: None,
            oracle,
            salesforce,
            abr,
            output,
        })
    }

    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.output = OutputDirs::new(dir);
        self
    }

    pub fn oracle(&self) -> Result<&OracleSettings> {
        self.oracle
            .as_ref()
            .ok_or_else(|| MigrationError::Config("ORACLE_USER is not set".to_string()))
    }

    pub fn salesforce(&self) -> Result<&SalesforceSettings> {
        self.salesforce
            .as_ref()
            .ok_or_else(|| MigrationError::Config("SF_USERNAME is not set".to_string()))
    }

    pub fn abr(&self) -> Result<&AbrSettings> {
        self.abr
            .as_ref()
            .ok_or_else(|| MigrationError::Config("ABR_HOST is not set".to_string()))
    }
}

/// `.env` for the default profile, `.env.<profile>` otherwise.
pub fn env_file_name(profile: Option<&str>) -> String {
    match profile {
        Some(p) if !p.is_empty() => format!(".env.{}", p),
        _ => ".env".to_string(),
    }
}

fn parse_port(value: Option<String>, default: u16, key: &str) -> Result<u16> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| MigrationError::Config(format!("{} is not a valid port: {}", key, v))),
        None => Ok(default),
    }
}
