//! Run configuration
//!
//! Secrets come from the process environment (optionally seeded from `.env`);
//! tunables come from an optional TOML file and fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::editron::card::OverflowPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

const DEFAULT_HF_MODEL_ID: &str = "meta-llama/Meta-Llama-3-8B-Instruct";

/// Credentials for every external service the run talks to
#[derive(Debug)]
pub struct Secrets {
    pub instagram_access_token: SecretString,
    pub instagram_business_id: String,
    pub huggingface_token: SecretString,
    pub hf_model_id: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: SecretString,
    pub telegram_bot_token: SecretString,
    pub telegram_chat_id: String,
}

impl Secrets {
    /// Read secrets from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read secrets through `lookup`, reporting every missing variable at once
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &str| match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let instagram_access_token = required("INSTAGRAM_ACCESS_TOKEN");
        let instagram_business_id = required("INSTAGRAM_BUSINESS_ID");
        let huggingface_token = required("HUGGINGFACE_TOKEN");
        let cloudinary_cloud_name = required("CLOUDINARY_CLOUD_NAME");
        let cloudinary_api_key = required("CLOUDINARY_API_KEY");
        let cloudinary_api_secret = required("CLOUDINARY_API_SECRET");
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN");
        let telegram_chat_id = required("TELEGRAM_CHAT_ID");

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }

        let hf_model_id = lookup("HF_MODEL_ID")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HF_MODEL_ID.to_string());

        Ok(Self {
            instagram_access_token: SecretString::from(instagram_access_token),
            instagram_business_id,
            huggingface_token: SecretString::from(huggingface_token),
            hf_model_id,
            cloudinary_cloud_name,
            cloudinary_api_key,
            cloudinary_api_secret: SecretString::from(cloudinary_api_secret),
            telegram_bot_token: SecretString::from(telegram_bot_token),
            telegram_chat_id,
        })
    }
}

/// Tunables loaded from `fluent.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_schedule_path")]
    pub schedule_path: PathBuf,

    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Keep rendered media on disk after a successful upload
    #[serde(default)]
    pub keep_local_media: bool,

    #[serde(default)]
    pub media: MediaSettings,

    #[serde(default)]
    pub speech: SpeechSettings,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub platform: PlatformSettings,

    #[serde(default)]
    pub posting: PostingSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

fn default_schedule_path() -> PathBuf {
    PathBuf::from("english_schedule.csv")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("media")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schedule_path: default_schedule_path(),
            work_dir: default_work_dir(),
            keep_local_media: false,
            media: MediaSettings::default(),
            speech: SpeechSettings::default(),
            generation: GenerationSettings::default(),
            platform: PlatformSettings::default(),
            posting: PostingSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,

    #[serde(default)]
    pub card_overflow: OverflowPolicy,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_font_path() -> PathBuf {
    PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf")
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            font_path: default_font_path(),
            card_overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_tts_command")]
    pub command: String,

    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_tts_command() -> String {
    "edge-tts".to_string()
}

fn default_voice() -> String {
    "en-US-AriaNeural".to_string()
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            command: default_tts_command(),
            voice: default_voice(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Generated text shorter than this (in characters) is replaced by the fallback
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

fn default_inference_endpoint() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_max_new_tokens() -> u32 {
    220
}

fn default_temperature() -> f32 {
    0.9
}

fn default_top_p() -> f32 {
    0.95
}

fn default_repetition_penalty() -> f32 {
    1.05
}

fn default_min_chars() -> usize {
    60
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            min_chars: default_min_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v20.0".to_string()
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            graph_api_base: default_graph_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingSettings {
    /// Minimum spacing between two consecutive publish calls
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
}

fn default_min_interval_secs() -> u64 {
    120
}

impl Default for PostingSettings {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
        }
    }
}

impl PostingSettings {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_http_secs")]
    pub http_secs: u64,

    #[serde(default = "default_subprocess_secs")]
    pub subprocess_secs: u64,
}

fn default_http_secs() -> u64 {
    120
}

fn default_subprocess_secs() -> u64 {
    600
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            http_secs: default_http_secs(),
            subprocess_secs: default_subprocess_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }

    pub fn subprocess(&self) -> Duration {
        Duration::from_secs(self.subprocess_secs)
    }
}

impl Settings {
    /// Load settings from `path`, or return defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
