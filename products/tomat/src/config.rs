use {
    inference::OllamaConfig,
    std::{fmt, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid {
                variable,
                value,
                reason,
            } => write!(f, "invalid {variable}={value:?}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Server settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub detector_model: PathBuf,
    pub detector_labels: Vec<String>,
    /// Detections below this confidence are not drawn.
    pub confidence_floor: f32,
    pub nms_threshold: f32,
    pub jpeg_quality: u8,
    /// Yield after every video frame so chat sessions get a turn.
    pub fairness_pause: Duration,
    pub llm: OllamaConfig,
    /// Log to date-named files here instead of stdout.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            detector_model: PathBuf::from("models/best.safetensors"),
            detector_labels: vec!["ripe".to_string(), "unripe".to_string()],
            confidence_floor: 0.85,
            nms_threshold: 0.45,
            jpeg_quality: image::DEFAULT_JPEG_QUALITY,
            fairness_pause: Duration::from_millis(10),
            llm: OllamaConfig::default(),
            log_dir: None,
        }
    }
}

fn invalid(variable: &'static str, value: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        variable,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(variable: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| invalid(variable, value, e))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty or whitespace-only
    /// values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Config::default();

        if let Some(value) = get("TOMAT_BIND") {
            config.bind = parse("TOMAT_BIND", &value)?;
        }
        if let Some(value) = get("TOMAT_ALLOWED_ORIGINS") {
            config.allowed_origins = split_list(&value);
        }
        if let Some(value) = get("TOMAT_DETECTOR_MODEL") {
            config.detector_model = PathBuf::from(value);
        }
        if let Some(value) = get("TOMAT_DETECTOR_LABELS") {
            let labels = split_list(&value);
            if labels.is_empty() {
                return Err(invalid("TOMAT_DETECTOR_LABELS", &value, "no labels"));
            }
            config.detector_labels = labels;
        }
        if let Some(value) = get("TOMAT_CONFIDENCE_FLOOR") {
            let floor: f32 = parse("TOMAT_CONFIDENCE_FLOOR", &value)?;
            if !(0.0..=1.0).contains(&floor) {
                return Err(invalid("TOMAT_CONFIDENCE_FLOOR", &value, "must be within 0..=1"));
            }
            config.confidence_floor = floor;
        }
        if let Some(value) = get("TOMAT_NMS_THRESHOLD") {
            let threshold: f32 = parse("TOMAT_NMS_THRESHOLD", &value)?;
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(invalid("TOMAT_NMS_THRESHOLD", &value, "must be within (0, 1]"));
            }
            config.nms_threshold = threshold;
        }
        if let Some(value) = get("TOMAT_JPEG_QUALITY") {
            let quality: u8 = parse("TOMAT_JPEG_QUALITY", &value)?;
            if !(1..=100).contains(&quality) {
                return Err(invalid("TOMAT_JPEG_QUALITY", &value, "must be within 1..=100"));
            }
            config.jpeg_quality = quality;
        }
        if let Some(value) = get("TOMAT_FAIRNESS_PAUSE_MS") {
            config.fairness_pause = Duration::from_millis(parse("TOMAT_FAIRNESS_PAUSE_MS", &value)?);
        }
        if let Some(value) = get("TOMAT_LLM_HOST") {
            config.llm.host = value;
        }
        if let Some(value) = get("TOMAT_LLM_MODEL") {
            config.llm.model = value;
        }
        config.llm.api_key = get("TOMAT_LLM_API_KEY");
        config.llm.region = get("TOMAT_LLM_REGION");
        if let Some(value) = get("TOMAT_LLM_TIMEOUT_SECS") {
            let secs: u64 = parse("TOMAT_LLM_TIMEOUT_SECS", &value)?;
            if secs == 0 {
                return Err(invalid("TOMAT_LLM_TIMEOUT_SECS", &value, "must be positive"));
            }
            config.llm.timeout = Duration::from_secs(secs);
        }
        config.log_dir = get("TOMAT_LOG_DIR").map(PathBuf::from);

        Ok(config)
    }
}
