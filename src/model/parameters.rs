use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Key holding the optional model label in a [`ParameterSet`].
pub const NAME_KEY: &str = "name";

/// A single entry of a [`ParameterSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Text(String),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Number(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

/// String-keyed model parameters, as written in scenario files.
///
/// The typed structs ([`crate::TwoCompartment`], [`crate::ThreeCompartment`])
/// are built from a parameter set and report any required key that is absent.
///
/// ```rust
/// use pkmodel::ParameterSet;
///
/// let params = ParameterSet::new()
///     .with_name("model2")
///     .with("Q_p1", 2.0)
///     .with("V_c", 1.0)
///     .with("V_p1", 1.0)
///     .with("CL", 1.0)
///     .with("X", 1.0);
/// assert_eq!(params.number("Q_p1").unwrap(), Some(2.0));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParameterValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object such as `{"name": "model1", "Q_p1": 1.0}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds (or replaces) a numeric parameter.
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets the model label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.insert(NAME_KEY, name.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The numeric value stored under `key`, if any.
    ///
    /// Text stored under a numeric key is an error rather than a missing value.
    pub fn number(&self, key: &str) -> Result<Option<f64>, ConfigurationError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParameterValue::Number(value)) => Ok(Some(*value)),
            Some(ParameterValue::Text(text)) => Err(ConfigurationError::invalid(
                key,
                format!("{text:?}"),
                "expected a number",
            )),
        }
    }

    /// The model label, if one was supplied.
    pub fn name(&self) -> Result<Option<&str>, ConfigurationError> {
        match self.0.get(NAME_KEY) {
            None => Ok(None),
            Some(ParameterValue::Text(name)) => Ok(Some(name.as_str())),
            Some(ParameterValue::Number(value)) => Err(ConfigurationError::invalid(
                NAME_KEY,
                value,
                "expected a string",
            )),
        }
    }

    pub(crate) fn require(&self, key: &str, model: &str) -> Result<f64, ConfigurationError> {
        self.number(key)?
            .ok_or_else(|| ConfigurationError::missing(key, model))
    }

    pub(crate) fn optional(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        Ok(self.number(key)?.unwrap_or(default))
    }
}

impl<K, const N: usize> From<[(K, f64); N]> for ParameterSet
where
    K: Into<String>,
{
    fn from(entries: [(K, f64); N]) -> Self {
        let mut set = ParameterSet::new();
        for (key, value) in entries {
            set.insert(key, value);
        }
        set
    }
}

/// Checks a physiological parameter: finite and non-negative, or strictly
/// positive when `positive` is set.
pub(crate) fn check(key: &str, value: f64, positive: bool) -> Result<(), ConfigurationError> {
    if !value.is_finite() {
        return Err(ConfigurationError::invalid(key, value, "must be finite"));
    }
    if positive && value <= 0.0 {
        return Err(ConfigurationError::invalid(key, value, "must be strictly positive"));
    }
    if value < 0.0 {
        return Err(ConfigurationError::invalid(key, value, "must be non-negative"));
    }
    Ok(())
}
