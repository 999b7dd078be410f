use std::{fmt, num::NonZeroUsize, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use uuid::Uuid;

/// Default zero-padding width for requirement numbers.
pub const DEFAULT_DIGITS: usize = 3;

/// A validated string containing only uppercase alphabetic characters ([A-Z]+).
///
/// Used as the prefix of requirement ids (e.g. `REQ`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(NonEmptyString);

impl Prefix {
    /// Creates a new `Prefix` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefixError` if the string is empty or contains
    /// characters other than uppercase letters (A-Z).
    pub fn new(s: String) -> Result<Self, InvalidPrefixError> {
        let non_empty =
            NonEmptyString::new(s.clone()).map_err(|_| InvalidPrefixError(s.clone()))?;

        if !s.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(InvalidPrefixError(s));
        }

        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self::new("REQ".to_string()).expect("'REQ' is a valid prefix")
    }
}

impl TryFrom<&str> for Prefix {
    type Error = InvalidPrefixError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl Deref for Prefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string doesn't match the required pattern [A-Z]+.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid prefix '{0}': must be non-empty and contain only uppercase letters (A-Z)")]
pub struct InvalidPrefixError(String);

/// Identifier of a requirement, unique within its registry.
///
/// Format: `{PREFIX}-{NUMBER}`, e.g. `REQ-001`. The number is a positive
/// integer; leading zeros are presentation only, so `REQ-1` and `REQ-001`
/// name the same requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequirementId {
    prefix: Prefix,
    number: NonZeroUsize,
}

impl RequirementId {
    /// Create a requirement id from pre-validated parts.
    #[must_use]
    pub const fn new(prefix: Prefix, number: NonZeroUsize) -> Self {
        Self { prefix, number }
    }

    /// Returns the prefix component.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    /// Returns the numeric component.
    #[must_use]
    pub const fn number(&self) -> NonZeroUsize {
        self.number
    }

    /// Returns a displayable representation with the specified digit width.
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_core::RequirementId;
    ///
    /// let id: RequirementId = "REQ-42".parse().unwrap();
    ///
    /// assert_eq!(id.display(3).to_string(), "REQ-042");
    /// assert_eq!(id.display(4).to_string(), "REQ-0042");
    /// assert_eq!(id.display(1).to_string(), "REQ-42");
    /// ```
    #[must_use]
    pub const fn display(&self, digits: usize) -> FormattedRequirementId<'_> {
        FormattedRequirementId { id: self, digits }
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.display(DEFAULT_DIGITS).fmt(f)
    }
}

/// A wrapper type that formats a [`RequirementId`] with a specified digit
/// width.
#[derive(Debug, Clone, Copy)]
pub struct FormattedRequirementId<'a> {
    id: &'a RequirementId,
    digits: usize,
}

impl fmt::Display for FormattedRequirementId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.id.prefix,
            self.id.number,
            width = self.digits
        )
    }
}

/// Errors that can occur while parsing a requirement id.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseIdError {
    /// Malformed structure.
    #[error("Invalid requirement id format: {0}")]
    Syntax(String),

    /// Non-numeric or zero number.
    #[error("Invalid number in requirement id '{0}': expected a non-zero integer, got {1}")]
    Number(String, String),

    /// Invalid prefix.
    #[error(transparent)]
    Prefix(#[from] InvalidPrefixError),
}

impl FromStr for RequirementId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((prefix, number)) = s.split_once('-') else {
            return Err(ParseIdError::Syntax(s.to_string()));
        };
        if prefix.is_empty() || number.is_empty() || number.contains('-') {
            return Err(ParseIdError::Syntax(s.to_string()));
        }

        let number = number
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ParseIdError::Number(s.to_string(), number.to_string()))?;
        let prefix = Prefix::new(prefix.to_string())?;

        Ok(Self::new(prefix, number))
    }
}

impl TryFrom<&str> for RequirementId {
    type Error = ParseIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Globally unique, stable identifier of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(Uuid);

impl RegistryId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for RegistryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RegistryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
