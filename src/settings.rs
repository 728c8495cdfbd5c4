use std::time::Duration;

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::dns::hetzner::DEFAULT_BASE_URL;
use crate::domain_filter::{DomainFilter, FilterError};
use crate::provider::{ProviderConfig, DEFAULT_BATCH_SIZE, DEFAULT_TTL};

const CONFIG_PATHS: &[&str] = &["config", "/etc/hetzner-dns-webhook/config"];

// Unprefixed variables shared with the DNS engine's other webhooks. Every
// field can also be set as `HETZNER_<FIELD>`.
const ENGINE_VARS: &[&str] = &[
    "DRY_RUN",
    "BATCH_SIZE",
    "DEFAULT_TTL",
    "MAX_FAIL_COUNT",
    "DOMAIN_FILTER",
    "EXCLUDE_DOMAIN_FILTER",
    "REGEXP_DOMAIN_FILTER",
    "REGEXP_DOMAIN_FILTER_EXCLUSION",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    /// Read the API key from this file instead; `~` and `$VARS` expand.
    pub api_key_file: Option<String>,
    pub base_url: String,

    pub dry_run: bool,
    pub debug: bool,
    pub batch_size: u32,
    pub default_ttl: i64,
    pub max_fail_count: i32,

    #[serde(deserialize_with = "string_list")]
    pub domain_filter: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    pub exclude_domain_filter: Vec<String>,
    pub regexp_domain_filter: String,
    pub regexp_domain_filter_exclusion: String,

    pub poll_interval: String,
    /// Requests per second sent to the API, zero for no limit.
    pub rate_limit: u64,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_key_file: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            dry_run: false,
            debug: false,
            batch_size: DEFAULT_BATCH_SIZE,
            default_ttl: DEFAULT_TTL,
            max_fail_count: -1,
            domain_filter: Vec::new(),
            exclude_domain_filter: Vec::new(),
            regexp_domain_filter: String::new(),
            regexp_domain_filter_exclusion: String::new(),
            poll_interval: "1m".to_owned(),
            rate_limit: 10,
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, SettingsError> {
        let builder = match path {
            Some(path) => Config::builder().add_source(File::with_name(&shellexpand::full(path)?)),
            None => CONFIG_PATHS.iter().fold(Config::builder(), |builder, path| {
                builder.add_source(File::with_name(path).required(false))
            }),
        };

        let settings = Self::layered(builder, std::env::vars().collect())?;
        settings.validate()?;
        Ok(settings)
    }

    fn layered(
        builder: ConfigBuilder<DefaultState>,
        env: config::Map<String, String>,
    ) -> Result<Self, SettingsError> {
        let engine_env = env
            .iter()
            .filter(|(name, _)| ENGINE_VARS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut settings: Settings = builder
            .add_source(Environment::default().source(Some(engine_env)))
            .add_source(Environment::with_prefix("HETZNER").source(Some(env)))
            .build()?
            .try_deserialize()?;

        settings.resolve_api_key()?;
        Ok(settings)
    }

    fn resolve_api_key(&mut self) -> Result<(), SettingsError> {
        if !self.api_key.is_empty() {
            return Ok(());
        }
        if let Some(file) = &self.api_key_file {
            let path = shellexpand::full(file)?;
            let key = std::fs::read_to_string(&*path).map_err(|source| SettingsError::Io {
                path: path.to_string(),
                source,
            })?;
            self.api_key = key.trim().to_owned();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_key.trim().is_empty() {
            return Err(SettingsError::MissingApiKey);
        }
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid("batch_size must be positive"));
        }
        if self.default_ttl <= 0 {
            return Err(SettingsError::Invalid("default_ttl must be positive"));
        }
        self.poll_interval()?;
        self.domain_filter()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Result<Duration, SettingsError> {
        Ok(humantime::parse_duration(&self.poll_interval)?)
    }

    pub fn domain_filter(&self) -> Result<DomainFilter, FilterError> {
        if self.regexp_domain_filter.is_empty() && self.regexp_domain_filter_exclusion.is_empty() {
            Ok(DomainFilter::new(
                &self.domain_filter,
                &self.exclude_domain_filter,
            ))
        } else {
            DomainFilter::with_regex(
                &self.regexp_domain_filter,
                &self.regexp_domain_filter_exclusion,
            )
        }
    }

    pub fn provider_config(&self) -> Result<ProviderConfig, SettingsError> {
        Ok(ProviderConfig {
            dry_run: self.dry_run,
            batch_size: self.batch_size,
            default_ttl: self.default_ttl,
            max_fail_count: self.max_fail_count,
            domain_filter: self.domain_filter()?,
        })
    }
}

// Lists come as arrays from files and comma separated from the environment.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum List {
        Joined(String),
        Items(Vec<String>),
    }

    let items = match List::deserialize(deserializer)? {
        List::Joined(joined) => joined.split(',').map(ToOwned::to_owned).collect(),
        List::Items(items) => items,
    };
    Ok(items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect())
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),
    #[error(transparent)]
    ExpandError(#[from] shellexpand::LookupError<std::env::VarError>),
    #[error("an api key is required")]
    MissingApiKey,
    #[error("invalid settings: {0}")]
    Invalid(&'static str),
    #[error("invalid poll interval: {0}")]
    IntervalError(#[from] humantime::DurationError),
    #[error(transparent)]
    FilterError(#[from] FilterError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load(toml: &str, vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        let env = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::layered(builder, env)
    }

    #[test]
    fn defaults_from_empty_file() {
        let settings = load("", &[]).unwrap();
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.default_ttl, 7200);
        assert_eq!(settings.max_fail_count, -1);
        assert_eq!(settings.rate_limit, 10);
        assert_eq!(settings.poll_interval().unwrap(), Duration::from_secs(60));
        assert!(matches!(settings.validate(), Err(SettingsError::MissingApiKey)));
    }

    #[test]
    fn parses_toml() {
        let settings = load(
            r#"
            api_key = "secret"
            dry_run = true
            batch_size = 50
            domain_filter = ["alpha.com", "beta.com"]
            exclude_domain_filter = ["internal.alpha.com"]
            poll_interval = "30s"
            log_format = "json"
            "#,
            &[],
        )
        .unwrap();

        settings.validate().unwrap();
        assert!(settings.dry_run);
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.poll_interval().unwrap(), Duration::from_secs(30));

        let filter = settings.domain_filter().unwrap();
        assert!(filter.matches("www.beta.com"));
        assert!(!filter.matches("internal.alpha.com"));
    }

    #[test]
    fn environment_overrides_file() {
        let settings = load(
            "api_key = \"from-file\"\nbatch_size = 50",
            &[
                ("HETZNER_API_KEY", "from-env"),
                ("DRY_RUN", "1"),
                ("BATCH_SIZE", "20"),
                ("MAX_FAIL_COUNT", "3"),
                ("DOMAIN_FILTER", "alpha.com, beta.com,"),
                ("HETZNER_DEBUG", "true"),
            ],
        )
        .unwrap();

        assert_eq!(settings.api_key, "from-env");
        assert!(settings.dry_run);
        assert!(settings.debug);
        assert_eq!(settings.batch_size, 20);
        assert_eq!(settings.max_fail_count, 3);
        assert_eq!(settings.domain_filter, ["alpha.com", "beta.com"]);
    }

    #[test]
    fn prefixed_variables_win_over_engine_ones() {
        let settings = load("", &[("BATCH_SIZE", "20"), ("HETZNER_BATCH_SIZE", "30")]).unwrap();
        assert_eq!(settings.batch_size, 30);
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let settings = load("", &[("DEBUG", "lots"), ("RATE_LIMIT", "fast")]).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.rate_limit, 10);
    }

    #[test]
    fn bad_environment_value_is_reported() {
        let err = load("", &[("DEFAULT_TTL", "soon")]).unwrap_err();
        assert!(matches!(err, SettingsError::ConfigError(_)));
    }

    #[test]
    fn api_key_is_read_from_file() {
        let path = std::env::temp_dir().join("hetzner-dns-webhook-settings-key");
        std::fs::write(&path, "from-key-file\n").unwrap();

        let settings = load(&format!("api_key_file = {:?}", path.to_str().unwrap()), &[]).unwrap();
        assert_eq!(settings.api_key, "from-key-file");

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn regex_filter_takes_precedence() {
        let settings = Settings {
            domain_filter: vec!["beta.com".to_owned()],
            regexp_domain_filter: r"^alpha\.".to_owned(),
            ..Default::default()
        };
        let filter = settings.domain_filter().unwrap();
        assert!(filter.matches("alpha.com"));
        assert!(!filter.matches("beta.com"));
    }

    #[test]
    fn rejects_invalid_values() {
        let settings = Settings {
            api_key: "secret".to_owned(),
            poll_interval: "often".to_owned(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::IntervalError(_))));

        let settings = Settings {
            api_key: "secret".to_owned(),
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn provider_config_carries_values() {
        let settings = Settings {
            api_key: "secret".to_owned(),
            dry_run: true,
            default_ttl: 300,
            max_fail_count: 5,
            ..Default::default()
        };
        let config = settings.provider_config().unwrap();
        assert!(config.dry_run);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.max_fail_count, 5);
        assert!(!config.domain_filter.is_configured());
    }
}
