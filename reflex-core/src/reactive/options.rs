//! Configuration for observed objects and computations.
//!
//! Both option types deserialize from JSON with every field optional, so a
//! configuration file only has to name what it changes.

use serde::{Deserialize, Serialize};

use super::subscriber::ComputationId;
use crate::error::Result;

/// Options controlling which properties of an observed object are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserveOptions {
    /// Allow-list of tracked properties. `None` tracks every property.
    #[serde(alias = "props")]
    pub watched_properties: Option<Vec<String>>,

    /// Deny-list of properties that are never tracked.
    #[serde(alias = "ignore")]
    pub ignored_properties: Option<Vec<String>>,

    /// Wrap nested records and sequences recursively.
    pub deep: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            watched_properties: None,
            ignored_properties: None,
            deep: true,
        }
    }
}

impl ObserveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Restrict tracking to the given properties.
    pub fn watch<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched_properties = Some(props.into_iter().map(Into::into).collect());
        self
    }

    /// Never track the given properties.
    pub fn ignore<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_properties = Some(props.into_iter().map(Into::into).collect());
        self
    }

    /// Leave nested aggregates unwrapped.
    pub fn shallow(mut self) -> Self {
        self.deep = false;
        self
    }

    /// Whether reads and writes of `prop` participate in tracking.
    pub fn is_watched(&self, prop: &str) -> bool {
        let allowed = self
            .watched_properties
            .as_ref()
            .map_or(true, |props| props.iter().any(|p| p == prop));
        let ignored = self
            .ignored_properties
            .as_ref()
            .is_some_and(|props| props.iter().any(|p| p == prop));
        allowed && !ignored
    }
}

/// Options for creating a computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedOptions {
    /// Credit reads to this computation instead of the one being created.
    ///
    /// Writes to those reads re-run the attributed computation.
    pub attribution: Option<ComputationId>,

    /// Run once immediately on creation.
    pub auto_run: bool,
}

impl Default for ComputedOptions {
    fn default() -> Self {
        Self {
            attribution: None,
            auto_run: true,
        }
    }
}

impl ComputedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Do not run on creation.
    pub fn lazy(mut self) -> Self {
        self.auto_run = false;
        self
    }

    /// Credit reads to `identity`.
    pub fn attributed_to(mut self, identity: ComputationId) -> Self {
        self.attribution = Some(identity);
        self
    }
}
