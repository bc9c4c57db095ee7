//! Configuration loading and validation.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a configuration file (TOML, YAML or JSON, picked by extension), either
//!    given explicitly or `promptdrop.toml` in the user's config directory,
//! 3. `PROMPTDROP_` environment variables (`__` separates nested keys, e.g.
//!    `PROMPTDROP_HTTP__API_URL`),
//! 4. command-line [`Overrides`].

pub mod error;

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use promptdrop_backend::{GenerationParams, HttpSettings, QueueSettings};
use promptdrop_prompts::{BatchSize, DEFAULT_EXTENSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "PROMPTDROP_";
const CONFIG_FILE_NAME: &str = "promptdrop.toml";
const DEFAULT_PROMPTS_DIR: &str = "prompts";
const DEFAULT_RESCAN_INTERVAL_SECS: u64 = 10;

/// Which generation backend prompts are submitted to.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Only list prompts.
    #[default]
    #[display("dry-run")]
    DryRun,
    /// The generation application's web API.
    #[display("http")]
    Http,
    /// The in-process task queue of an embedding application.
    #[display("queue")]
    Queue,
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for prompt files.
    pub prompts_dir: PathBuf,
    /// Extension of prompt files, without the dot.
    pub extension: String,
    /// Requested batch size; clamped to `1..=32` on validation.
    pub batch_size: usize,
    /// Remove a prompt file once every batch from it has succeeded.
    pub delete_after_success: bool,
    /// Keep rescanning the prompts directory instead of exiting.
    pub continuous: bool,
    /// Wait between scans in continuous mode.
    pub rescan_interval_secs: u64,
    pub backend: BackendKind,
    pub http: HttpSettings,
    pub queue: QueueSettings,
    pub generation: GenerationParams,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            prompts_dir: PathBuf::from(DEFAULT_PROMPTS_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            batch_size: BatchSize::MAX,
            delete_after_success: true,
            continuous: false,
            rescan_interval_secs: DEFAULT_RESCAN_INTERVAL_SECS,
            backend: BackendKind::default(),
            http: HttpSettings::default(),
            queue: QueueSettings::default(),
            generation: GenerationParams::default(),
        }
    }
}

/// Values given on the command line. Anything left as `None` falls through
/// to the lower layers.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_after_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    #[serde(skip_serializing_if = "HttpOverrides::is_empty")]
    pub http: HttpOverrides,
    #[serde(skip_serializing_if = "QueueOverrides::is_empty")]
    pub queue: QueueOverrides,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct HttpOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}
impl HttpOverrides {
    fn is_empty(&self) -> bool {
        self.api_url.is_none()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct QueueOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}
impl QueueOverrides {
    fn is_empty(&self) -> bool {
        self.output_dir.is_none()
    }
}

/// Location of the configuration file used when none is given explicitly.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "promptdrop").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

impl Config {
    /// Load, merge and validate configuration.
    ///
    /// An explicit `file` must exist; the default file is optional.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let file = match file {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.exists()),
        };
        if let Some(path) = &file {
            tracing::debug!(path = %path.display(), "Loading configuration file");
        }
        Self::figment(file.as_deref(), overrides)?.extract::<Self>().or_raise(|| ErrorKind::Load)?.validate()
    }

    /// Layered configuration sources, without extraction or validation.
    pub fn figment(file: Option<&Path>, overrides: &Overrides) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")).merge(Serialized::defaults(overrides)))
    }

    /// Check values that deserialize fine but can't be used as-is.
    ///
    /// The batch size is clamped (with a warning) rather than rejected.
    pub fn validate(mut self) -> Result<Self> {
        if BatchSize::is_clamped(self.batch_size) {
            let clamped = BatchSize::new(self.batch_size).get();
            tracing::warn!(requested = self.batch_size, using = clamped, "Batch size out of range; clamping");
            self.batch_size = clamped;
        }
        self.extension = self.extension.trim().trim_start_matches('.').to_string();
        if self.extension.is_empty() {
            exn::bail!(ErrorKind::Invalid("prompt file extension must not be empty".to_string()));
        }
        if self.prompts_dir.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("prompts directory must not be empty".to_string()));
        }
        if self.rescan_interval_secs == 0 {
            exn::bail!(ErrorKind::Invalid("rescan interval must be at least one second".to_string()));
        }
        if self.queue.poll_interval_ms == 0 {
            exn::bail!(ErrorKind::Invalid("queue poll interval must be at least one millisecond".to_string()));
        }
        if self.http.liveness_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("liveness timeout must be at least one second".to_string()));
        }
        // `None` means no limit; zero would time out before any work is done.
        if self.http.request_timeout_secs == Some(0) {
            exn::bail!(ErrorKind::Invalid("request timeout must be at least one second".to_string()));
        }
        if self.queue.completion_timeout_secs == Some(0) {
            exn::bail!(ErrorKind::Invalid("completion timeout must be at least one second".to_string()));
        }
        Ok(self)
    }

    pub fn batch_size(&self) -> BatchSize {
        BatchSize::new(self.batch_size)
    }
}
