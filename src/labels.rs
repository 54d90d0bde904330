//! Label sets, per-metric label schemas, and regex-derived resource labels

use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("label '{name}' is declared twice for '{metric}'")]
    DuplicateLabel { metric: &'static str, name: String },

    #[error("label '{name}' is not part of the '{metric}' schema")]
    UnknownLabel { metric: &'static str, name: String },

    #[error("required label '{name}' is missing for '{metric}'")]
    MissingLabel { metric: &'static str, name: String },
}

/// Ordered label name -> value mapping for one series
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn extend<'a>(&mut self, labels: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (name, value) in labels {
            self.insert(name.as_str(), value.as_str());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Fixed label-name list of one metric family.
///
/// Built once from configuration before any series is written. Required
/// labels must be present in every [`LabelSet`]; optional ones resolve to the
/// empty value, which the exposition format treats as an absent label.
#[derive(Debug, Clone)]
pub struct LabelSchema {
    metric: &'static str,
    names: Vec<String>,
    required: usize,
}

impl LabelSchema {
    pub fn new<R, O>(metric: &'static str, required: R, optional: O) -> Result<Self, SchemaError>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let mut names: Vec<String> = required.into_iter().map(Into::into).collect();
        let required = names.len();
        names.extend(optional.into_iter().map(Into::into));

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(SchemaError::DuplicateLabel {
                    metric,
                    name: name.clone(),
                });
            }
        }

        Ok(Self {
            metric,
            names,
            required,
        })
    }

    pub fn metric(&self) -> &'static str {
        self.metric
    }

    pub fn names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// Label values in schema order
    pub fn resolve<'a>(&self, labels: &'a LabelSet) -> Result<Vec<&'a str>, SchemaError> {
        if let Some((name, _)) = labels
            .iter()
            .find(|(name, _)| !self.names.iter().any(|n| n.as_str() == *name))
        {
            return Err(SchemaError::UnknownLabel {
                metric: self.metric,
                name: name.to_string(),
            });
        }

        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| match labels.get(name) {
                Some(value) => Ok(value),
                None if i >= self.required => Ok(""),
                None => Err(SchemaError::MissingLabel {
                    metric: self.metric,
                    name: name.clone(),
                }),
            })
            .collect()
    }
}

/// Extracts labels from resource names with configured regex patterns
#[derive(Debug, Clone, Default)]
pub struct LabelDeriver {
    patterns: Vec<(String, Option<Regex>)>,
}

impl LabelDeriver {
    /// Compile every pattern. One that does not compile is reported once and
    /// then never yields a label; the others are unaffected.
    pub fn new(patterns: &BTreeMap<String, String>) -> Self {
        let patterns = patterns
            .iter()
            .map(|(name, pattern)| match Regex::new(pattern) {
                Ok(regex) => (name.clone(), Some(regex)),
                Err(e) => {
                    warn!(label = %name, pattern = %pattern, error = %e, "Ignoring invalid resource pattern");
                    (name.clone(), None)
                }
            })
            .collect();

        Self { patterns }
    }

    /// Every label this deriver can emit, matched or not
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(name, _)| name.as_str())
    }

    /// Labels for one resource name; non-matching patterns are omitted.
    ///
    /// The performance family still declares every pattern label, so an
    /// omitted one is rendered as `name=""` in the exposition, which scrapers
    /// treat as an absent label.
    pub fn derive(&self, resource_name: &str) -> LabelSet {
        let mut labels = LabelSet::new();

        for (name, regex) in &self.patterns {
            let Some(regex) = regex else { continue };

            match regex.captures(resource_name).and_then(|c| c.get(1)) {
                Some(capture) => labels.insert(name.as_str(), capture.as_str()),
                None => debug!(label = %name, resource_name, "Pattern did not match"),
            }
        }

        labels
    }
}
