use std::fs;
use std::path::Path;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;
use crate::error::ConfigError;

/// A named backoff policy as written in a policy file.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PolicySpec {
    pub name: String,
    pub iterations: u32,
    #[serde(default)]
    pub coefficient_ms: Option<i64>,
    #[serde(default)]
    pub jitter: f64,
    #[serde(default)]
    pub start_wait_ms: Option<i64>,
    #[serde(default)]
    pub init_wait_ms: Option<i64>,
    /// When present, overrides `coefficient_ms` via [`Backoff::with_total_delay`].
    #[serde(default)]
    pub total_delay_ms: Option<i64>,
}

impl PolicySpec {
    /// Build and validate the policy this entry describes.
    pub fn to_backoff(&self) -> Result<Backoff, ConfigError> {
        let policy = Backoff::new(
            self.iterations,
            millis(self.coefficient_ms),
            self.jitter,
        )
        .with_start_wait(millis(self.start_wait_ms))
        .with_initial_wait(millis(self.init_wait_ms));

        let policy = match self.total_delay_ms {
            Some(total) => policy.with_total_delay(TimeDelta::milliseconds(total)),
            None => policy.validate().map(|()| policy),
        };

        policy.map_err(|err| ConfigError::invalid_policy(&self.name, err))
    }
}

/// Policy file structure.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PolicyMapConfig {
    pub policies: Vec<PolicySpec>,
}

/// Load a [`PolicyMapConfig`] from JSON or YAML.
pub fn load_policy_map_config(path: &Path) -> Result<PolicyMapConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    PolicyFormat::detect(path, &content).parse(&content)
}

/// Encoding of a policy file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyFormat {
    Json,
    Yaml,
}

impl PolicyFormat {
    /// A `.json`, `.yaml` or `.yml` extension decides; anything else is JSON
    /// only when the document opens with an object or array.
    fn detect(path: &Path, content: &str) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => return Self::Json,
            Some("yaml" | "yml") => return Self::Yaml,
            _ => {}
        }

        match content.trim_start().as_bytes().first() {
            Some(b'{' | b'[') => Self::Json,
            _ => Self::Yaml,
        }
    }

    fn parse(self, content: &str) -> Result<PolicyMapConfig, ConfigError> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yaml_bw::from_str(content)?,
        })
    }
}

fn millis(value: Option<i64>) -> TimeDelta {
    value.map_or(TimeDelta::zero(), TimeDelta::milliseconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackoffError;

    #[test]
    fn parses_json() {
        let config = PolicyFormat::Json
            .parse(r#"{"policies":[{"name":"api","iterations":5,"coefficient_ms":1000,"jitter":10.0}]}"#)
            .unwrap();

        assert_eq!(config.policies.len(), 1);
        let policy = config.policies[0].to_backoff().unwrap();
        assert_eq!(policy.iterations, 5);
        assert_eq!(policy.coefficient, TimeDelta::seconds(1));
        assert_eq!(policy.jitter, 10.0);
    }

    #[test]
    fn parses_yaml() {
        let config = PolicyFormat::Yaml
            .parse(
                r#"
policies:
  - name: budgeted
    iterations: 4
    start_wait_ms: 500
    init_wait_ms: 500
    total_delay_ms: 7000
        "#,
            )
            .unwrap();

        let policy = config.policies[0].to_backoff().unwrap();
        assert_eq!(policy.start_wait, TimeDelta::milliseconds(500));
        assert_eq!(policy.init_wait, TimeDelta::milliseconds(500));
        assert_eq!(policy.coefficient, TimeDelta::seconds(2));
    }

    #[test]
    fn format_follows_the_extension_then_the_first_character() {
        let cases = [
            ("policies.json", "policies: []", PolicyFormat::Json),
            ("policies.yml", "{\"policies\": []}", PolicyFormat::Yaml),
            ("policies.yaml", "[]", PolicyFormat::Yaml),
            ("policies", "  {\"policies\": []}", PolicyFormat::Json),
            ("policies.conf", "\n[]", PolicyFormat::Json),
            ("policies", "policies: []", PolicyFormat::Yaml),
            ("policies", "", PolicyFormat::Yaml),
        ];

        for (path, content, expected) in cases {
            assert_eq!(PolicyFormat::detect(Path::new(path), content), expected, "{path}");
        }
    }

    #[test]
    fn wrong_format_surfaces_the_parser_error() {
        match PolicyFormat::Json.parse("policies: []") {
            Err(ConfigError::Json(_)) => {}
            other => panic!("expected json error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_entries_name_the_policy() {
        let spec = PolicySpec {
            name: "broken".into(),
            iterations: 3,
            coefficient_ms: Some(-5),
            jitter: 0.0,
            start_wait_ms: None,
            init_wait_ms: None,
            total_delay_ms: None,
        };

        match spec.to_backoff() {
            Err(ConfigError::InvalidPolicy { name, source }) => {
                assert_eq!(name, "broken");
                assert_eq!(source, BackoffError::NegativeDelay);
            }
            other => panic!("expected invalid policy, got {other:?}"),
        }
    }
}
