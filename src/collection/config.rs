//! Collection configuration
//!
//! Options resolve once per call: built-in defaults, then the collection's
//! config, then per-call overrides.

use serde::{Deserialize, Serialize};

/// How `add` treats a record whose key already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Deep-merge incoming fields into the existing record
    #[default]
    Merge,
    /// Drop fields the incoming record lacks, then copy its fields
    Replace,
}

/// Collection-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Primary key field (default: "id")
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,

    /// Generate UUID keys for records without one (default: false)
    #[serde(default)]
    pub auto_pk: bool,

    /// Conflict policy (default: merge)
    #[serde(default)]
    pub on_conflict: OnConflict,
}

fn default_id_attribute() -> String {
    "id".to_string()
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            id_attribute: default_id_attribute(),
            auto_pk: false,
            on_conflict: OnConflict::default(),
        }
    }
}

impl CollectionConfig {
    /// Sets the primary key field
    pub fn with_id_attribute(mut self, field: impl Into<String>) -> Self {
        self.id_attribute = field.into();
        self
    }

    /// Enables surrogate key generation
    pub fn with_auto_pk(mut self, auto_pk: bool) -> Self {
        self.auto_pk = auto_pk;
        self
    }

    /// Sets the default conflict policy
    pub fn with_on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }
}

/// Per-call overrides for `add`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOptions {
    #[serde(default)]
    pub auto_pk: Option<bool>,
    #[serde(default)]
    pub on_conflict: Option<OnConflict>,
}

impl AddOptions {
    pub fn auto_pk(mut self, auto_pk: bool) -> Self {
        self.auto_pk = Some(auto_pk);
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }

    /// Resolves these overrides against a collection config
    pub(crate) fn resolve(&self, config: &CollectionConfig) -> ResolvedAdd {
        ResolvedAdd {
            auto_pk: self.auto_pk.unwrap_or(config.auto_pk),
            on_conflict: self.on_conflict.unwrap_or(config.on_conflict),
        }
    }
}

/// Effective options for one `add` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedAdd {
    pub(crate) auto_pk: bool,
    pub(crate) on_conflict: OnConflict,
}
