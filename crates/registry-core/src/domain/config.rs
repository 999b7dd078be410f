use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::{Prefix, id::DEFAULT_DIGITS};

/// Configuration for registry review.
///
/// Controls how requirement ids are formatted and, optionally, which
/// attributes imported rows must or may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Versions", into = "Versions")]
pub struct Config {
    /// Prefix of requirement ids, e.g. `REQ`.
    prefix: Prefix,

    /// The number of digits requirement numbers are padded to.
    digits: usize,

    /// Attributes every imported row must carry.
    required_attributes: Vec<String>,

    /// Declared attribute names, in declaration order.
    ///
    /// If this is empty, no attribute is declared.
    known_attributes: Vec<String>,

    /// Optional descriptions of declared attributes.
    attribute_metadata: HashMap<String, AttributeMetadata>,

    /// Whether rows and updates may use attributes that are not declared.
    ///
    /// Has no effect while `known_attributes` is empty.
    pub allow_unknown_attributes: bool,

    /// Whether attribute updates that change nothing are dropped instead of
    /// being written and audited.
    pub skip_noop_updates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: Prefix::default(),
            digits: DEFAULT_DIGITS,
            required_attributes: Vec::new(),
            known_attributes: Vec::new(),
            attribute_metadata: HashMap::new(),
            allow_unknown_attributes: true,
            skip_noop_updates: true,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the requirement id prefix.
    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// Returns the number of digits for padding requirement numbers.
    #[must_use]
    pub const fn digits(&self) -> usize {
        self.digits
    }

    /// Returns the attributes every imported row must carry.
    #[must_use]
    pub fn required_attributes(&self) -> &[String] {
        &self.required_attributes
    }

    /// Returns the declared attributes.
    #[must_use]
    pub fn known_attributes(&self) -> &[String] {
        &self.known_attributes
    }

    /// Returns metadata for a declared attribute, if present.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn metadata_for_attribute(&self, name: &str) -> Option<&AttributeMetadata> {
        self.attribute_metadata.get(name)
    }

    /// Checks whether an attribute name may be used.
    ///
    /// Every name is allowed while no attributes are declared or
    /// `allow_unknown_attributes` is set.
    #[must_use]
    pub fn is_attribute_allowed(&self, name: &str) -> bool {
        self.allow_unknown_attributes
            || self.known_attributes.is_empty()
            || self.known_attributes.iter().any(|k| k == name)
    }

    /// Adds an attribute to the required list.
    ///
    /// Returns `true` if the attribute was added, `false` if it was already
    /// required.
    pub fn require_attribute(&mut self, name: &str) -> bool {
        if self.required_attributes.iter().any(|a| a == name) {
            false
        } else {
            self.required_attributes.push(name.to_string());
            true
        }
    }

    /// Declares an attribute.
    ///
    /// Returns `true` if the attribute was added, `false` if it already
    /// existed.
    pub fn declare_attribute(&mut self, name: &str) -> bool {
        if self.known_attributes.iter().any(|a| a == name) {
            false
        } else {
            self.known_attributes.push(name.to_string());
            true
        }
    }

    /// Sets or clears a description for a declared attribute.
    ///
    /// An empty or `None` description removes existing metadata.
    pub fn set_attribute_description(&mut self, name: &str, description: Option<String>) {
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        match description {
            Some(description) => {
                self.attribute_metadata.insert(
                    name.to_string(),
                    AttributeMetadata {
                        description: Some(description),
                    },
                );
            }
            None => {
                self.attribute_metadata.remove(name);
            }
        }
    }
}

fn default_prefix() -> String {
    "REQ".to_string()
}

const fn default_digits() -> usize {
    DEFAULT_DIGITS
}

const fn default_true() -> bool {
    true
}

/// Metadata describing a declared attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeMetadata {
    /// Human-readable description of the attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_prefix")]
        prefix: String,

        #[serde(default = "default_digits")]
        digits: usize,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required_attributes: Vec<String>,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        known_attributes: Vec<AttributeEntry>,

        #[serde(default = "default_true")]
        allow_unknown_attributes: bool,

        #[serde(default = "default_true")]
        skip_noop_updates: bool,
    },
}

impl TryFrom<Versions> for Config {
    type Error = String;

    fn try_from(versions: Versions) -> Result<Self, Self::Error> {
        match versions {
            Versions::V1 {
                prefix,
                digits,
                required_attributes,
                known_attributes,
                allow_unknown_attributes,
                skip_noop_updates,
            } => Ok(Self {
                prefix: Prefix::new(prefix).map_err(|e| e.to_string())?,
                digits,
                required_attributes,
                known_attributes: known_attributes
                    .iter()
                    .map(AttributeEntry::name)
                    .map(ToString::to_string)
                    .collect(),
                attribute_metadata: known_attributes
                    .into_iter()
                    .filter_map(AttributeEntry::into_metadata)
                    .collect(),
                allow_unknown_attributes,
                skip_noop_updates,
            }),
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        let Config {
            prefix,
            digits,
            required_attributes,
            known_attributes,
            mut attribute_metadata,
            allow_unknown_attributes,
            skip_noop_updates,
        } = config;

        let known_attributes = known_attributes
            .into_iter()
            .map(|name| match attribute_metadata.remove(&name) {
                Some(AttributeMetadata {
                    description: Some(description),
                }) => AttributeEntry::Detailed {
                    name,
                    description: Some(description),
                },
                _ => AttributeEntry::Simple(name),
            })
            .collect();

        Self::V1 {
            prefix: prefix.to_string(),
            digits,
            required_attributes,
            known_attributes,
            allow_unknown_attributes,
            skip_noop_updates,
        }
    }
}

/// Serialization helper for declared attributes that supports either bare
/// strings or inline tables with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum AttributeEntry {
    /// A bare attribute name, e.g. "Country".
    Simple(String),
    /// An attribute name with optional metadata fields.
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl AttributeEntry {
    fn name(&self) -> &str {
        match self {
            Self::Simple(name) | Self::Detailed { name, .. } => name,
        }
    }

    fn into_metadata(self) -> Option<(String, AttributeMetadata)> {
        match self {
            Self::Simple(_) => None,
            Self::Detailed { name, description } => {
                Some((name, AttributeMetadata { description }))
            }
        }
    }
}
