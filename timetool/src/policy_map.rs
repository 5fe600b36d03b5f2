use indexmap::IndexMap;

use crate::backoff::Backoff;
use crate::config::PolicyMapConfig;
use crate::error::ConfigError;

/// Name to [`Backoff`] lookup.
#[derive(Clone, Debug, Default)]
pub struct PolicyMap {
    policies: IndexMap<String, Backoff>,
}

impl PolicyMap {
    /// Build a [`PolicyMap`] from a configuration file, validating every entry.
    pub fn from_config(config: &PolicyMapConfig) -> Result<Self, ConfigError> {
        let mut policies = IndexMap::with_capacity(config.policies.len());
        for spec in &config.policies {
            if policies.contains_key(&spec.name) {
                return Err(ConfigError::DuplicatePolicy(spec.name.clone()));
            }
            policies.insert(spec.name.clone(), spec.to_backoff()?);
        }

        Ok(PolicyMap { policies })
    }

    /// Retrieve a policy by name.
    pub fn get(&self, name: &str) -> Result<&Backoff, ConfigError> {
        self.policies
            .get(name)
            .ok_or_else(|| ConfigError::policy_not_found(name))
    }

    /// Iterate over policies in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Backoff)> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
