//! Agent configuration, read from JSON files.
use crate::error::{AgentError, AgentResult};
use crate::http_client::Credentials;
use crate::polling::{
    backoff, chain, conditional_delay, once, timeout, Chain, DEFAULT_BACKOFF_FACTOR,
    DEFAULT_BACKOFF_INITIAL, DEFAULT_INITIAL_DELAY, DEFAULT_POLL_TIMEOUT,
};
use ic_agent_types::time::MAX_INGRESS_TTL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// DER-encoded public key of the Internet Computer's root subnet.
pub const IC_ROOT_PUBLIC_KEY_HEX: &str = "308182301d060d2b0601040182dc7c0503010201060c2b0601040182dc7c05030201036100814c0e6ec71fab583b08bd81373c255c3c371b2e84863c98a4f1e08b74235d14fb5d9c0cd546d9685f913a0c0b2cc5341583bf4b4392e467db96d65b9bb4cb717112f8472e0d5a4d14505ffd7484b01291091c5f87b98883463f98091a0baaae";

pub const DEFAULT_URL: &str = "https://ic0.app";

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the replica, without any `/api/v2/...` path. Mainnet
    /// when absent.
    pub url: Option<Url>,
    #[serde(with = "humantime_serde")]
    pub ingress_expiry: Duration,
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    /// Hex-encoded DER root key. The mainnet key is used when absent.
    pub root_key: Option<String>,
    pub credentials: Option<Credentials>,
    pub polling: PollingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: None,
            ingress_expiry: MAX_INGRESS_TTL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            root_key: None,
            credentials: None,
            polling: PollingConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Reads a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn load(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            AgentError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.polling.validate()?;
        Ok(config)
    }

    pub fn url(&self) -> AgentResult<Url> {
        match &self.url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(DEFAULT_URL)
                .map_err(|e| AgentError::Config(format!("invalid default URL: {}", e))),
        }
    }

    /// The configured root key, decoded from hex.
    pub fn root_key_der(&self) -> AgentResult<Vec<u8>> {
        let key = self.root_key.as_deref().unwrap_or(IC_ROOT_PUBLIC_KEY_HEX);
        hex::decode(key).map_err(|e| AgentError::Config(format!("invalid root key: {}", e)))
    }
}

/// Parameters of the strategy used to poll for the outcome of update calls.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay before the first status request.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub backoff_initial: Duration,
    pub backoff_factor: f64,
    /// Overall time after which polling fails with a timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollingConfig {
    /// Fails unless the backoff factor is a finite number of at least one.
    pub fn validate(&self) -> AgentResult<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(AgentError::Config(format!(
                "backoff_factor must be finite and at least 1, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// A fresh strategy. The timeout's deadline starts counting now.
    pub fn strategy(&self) -> Chain {
        chain(vec![
            Box::new(conditional_delay(once(), self.initial_delay)),
            Box::new(backoff(self.backoff_initial, self.backoff_factor)),
            Box::new(timeout(self.timeout)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_target_mainnet() {
        let config = AgentConfig::default();
        assert_eq!(config.url().unwrap().as_str(), "https://ic0.app/");
        assert_eq!(config.ingress_expiry, Duration::from_secs(300));
        assert_eq!(config.query_timeout, Duration::from_secs(30));
        assert_eq!(config.polling.backoff_factor, 1.2);

        let root_key = config.root_key_der().unwrap();
        assert_eq!(root_key.len(), 133);
    }

    #[test]
    fn durations_are_humantime() {
        let config: AgentConfig = serde_json::from_str(
            r#"{
                "url": "http://localhost:4943",
                "ingress_expiry": "2m",
                "polling": { "initial_delay": "500ms", "timeout": "1m 30s" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.url().unwrap().as_str(), "http://localhost:4943/");
        assert_eq!(config.ingress_expiry, Duration::from_secs(120));
        assert_eq!(config.query_timeout, DEFAULT_QUERY_TIMEOUT);
        assert_eq!(config.polling.initial_delay, Duration::from_millis(500));
        assert_eq!(config.polling.backoff_initial, DEFAULT_BACKOFF_INITIAL);
        assert_eq!(config.polling.timeout, Duration::from_secs(90));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "root_key": "00ff", "credentials": {{ "name": "alice", "password": "secret" }} }}"#
        )
        .unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.root_key_der().unwrap(), vec![0x00, 0xff]);
        assert_eq!(
            config.credentials,
            Some(Credentials {
                name: "alice".to_string(),
                password: "secret".to_string()
            })
        );
    }

    #[test]
    fn load_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AgentConfig::load(dir.path().join("missing.json")),
            Err(AgentError::Config(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "ingress_expiry": "soon" }}"#).unwrap();
        assert!(matches!(
            AgentConfig::load(file.path()),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn load_rejects_shrinking_or_unbounded_backoff() {
        for factor in ["-1.0", "0.5", "1e309"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, r#"{{ "polling": {{ "backoff_factor": {} }} }}"#, factor).unwrap();
            assert!(matches!(
                AgentConfig::load(file.path()),
                Err(AgentError::Config(_))
            ));
        }

        let polling = PollingConfig {
            backoff_factor: f64::NAN,
            ..PollingConfig::default()
        };
        assert!(matches!(polling.validate(), Err(AgentError::Config(_))));
        assert!(PollingConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_root_key_is_a_config_error() {
        let config = AgentConfig {
            root_key: Some("not hex".to_string()),
            ..AgentConfig::default()
        };
        assert!(matches!(config.root_key_der(), Err(AgentError::Config(_))));
    }
}
