use std::fmt;

use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use uuid::Uuid;

use crate::domain::{RegistryId, RequirementId};

/// Granularity of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentLevel {
    /// About the registry as a whole.
    Document,
    /// About one requirement.
    Row,
    /// About one attribute of one requirement.
    Cell,
}

impl CommentLevel {
    /// Stable name used in persisted documents and tables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Row => "Row",
            Self::Cell => "Cell",
        }
    }
}

impl fmt::Display for CommentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a comment is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommentTarget {
    /// A whole registry.
    Document {
        /// The registry.
        registry: RegistryId,
    },
    /// A requirement.
    Row {
        /// The owning registry.
        registry: RegistryId,
        /// The requirement.
        requirement: RequirementId,
    },
    /// One attribute of a requirement.
    Cell {
        /// The owning registry.
        registry: RegistryId,
        /// The requirement.
        requirement: RequirementId,
        /// Name of the attribute.
        attribute: String,
    },
}

impl CommentTarget {
    /// Builds a target from loosely-typed presentation input.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the parts do not fit the level: a
    /// row or cell comment without a requirement, a cell comment without an
    /// attribute, or an attribute on a document or row comment.
    pub fn from_parts(
        level: CommentLevel,
        registry: RegistryId,
        requirement: Option<RequirementId>,
        attribute: Option<String>,
    ) -> Result<Self, ValidationError> {
        let attribute = attribute.filter(|a| !a.trim().is_empty());
        match (level, requirement, attribute) {
            (CommentLevel::Document, None, None) => Ok(Self::Document { registry }),
            (CommentLevel::Document, Some(_), _) => Err(ValidationError::UnexpectedRequirement),
            (CommentLevel::Row, Some(requirement), None) => Ok(Self::Row {
                registry,
                requirement,
            }),
            (CommentLevel::Cell, Some(requirement), Some(attribute)) => Ok(Self::Cell {
                registry,
                requirement,
                attribute,
            }),
            (CommentLevel::Cell, Some(_), None) => Err(ValidationError::MissingAttribute),
            (CommentLevel::Row | CommentLevel::Cell, None, _) => {
                Err(ValidationError::MissingRequirement(level))
            }
            (CommentLevel::Document | CommentLevel::Row, _, Some(_)) => {
                Err(ValidationError::UnexpectedAttribute(level))
            }
        }
    }

    /// The comment level implied by the target.
    #[must_use]
    pub const fn level(&self) -> CommentLevel {
        match self {
            Self::Document { .. } => CommentLevel::Document,
            Self::Row { .. } => CommentLevel::Row,
            Self::Cell { .. } => CommentLevel::Cell,
        }
    }

    /// The registry the target lives in.
    #[must_use]
    pub const fn registry(&self) -> RegistryId {
        match self {
            Self::Document { registry }
            | Self::Row { registry, .. }
            | Self::Cell { registry, .. } => *registry,
        }
    }

    /// The requirement, for row and cell targets.
    #[must_use]
    pub const fn requirement(&self) -> Option<&RequirementId> {
        match self {
            Self::Document { .. } => None,
            Self::Row { requirement, .. } | Self::Cell { requirement, .. } => Some(requirement),
        }
    }

    /// The attribute name, for cell targets.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Cell { attribute, .. } => Some(attribute),
            _ => None,
        }
    }
}

/// An immutable, timestamped note.
///
/// Comments have no setters. Correcting a comment means adding a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub(crate) id: Uuid,
    pub(crate) target: CommentTarget,
    pub(crate) author: NonEmptyString,
    pub(crate) text: NonEmptyString,
    pub(crate) created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) fn new(
        target: CommentTarget,
        author: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let author = NonEmptyString::new(author.trim().to_string())
            .map_err(|_| ValidationError::EmptyAuthor)?;
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        let text = NonEmptyString::new(text.to_string()).map_err(|_| ValidationError::EmptyText)?;

        Ok(Self {
            id: Uuid::new_v4(),
            target,
            author,
            text,
            created_at,
        })
    }

    /// Unique id of the comment.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// What the comment is about.
    #[must_use]
    pub const fn target(&self) -> &CommentTarget {
        &self.target
    }

    /// Shorthand for `self.target().level()`.
    #[must_use]
    pub const fn level(&self) -> CommentLevel {
        self.target.level()
    }

    /// Who wrote it.
    #[must_use]
    pub fn author(&self) -> &str {
        self.author.as_str()
    }

    /// The comment body.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Server-assigned creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Rejected comment or attribute input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Comment text was empty or whitespace.
    #[error("comment text must not be empty")]
    EmptyText,

    /// Author was empty or whitespace.
    #[error("comment author must not be empty")]
    EmptyAuthor,

    /// A cell comment without an attribute name.
    #[error("cell comments must name an attribute")]
    MissingAttribute,

    /// Row or cell comment without a requirement.
    #[error("{0} comments must name a requirement")]
    MissingRequirement(CommentLevel),

    /// A requirement was given for a document comment.
    #[error("document comments cannot name a requirement")]
    UnexpectedRequirement,

    /// An attribute was given for a document or row comment.
    #[error("{0} comments cannot name an attribute")]
    UnexpectedAttribute(CommentLevel),

    /// The cell comment names an attribute the requirement does not have.
    #[error("requirement {requirement} has no attribute '{attribute}'")]
    UnknownAttribute {
        /// The requirement.
        requirement: RequirementId,
        /// The missing attribute.
        attribute: String,
    },

    /// The registry a comment targets does not exist.
    #[error("unknown registry {0}")]
    UnknownRegistry(RegistryId),

    /// The requirement a comment targets does not exist.
    #[error("unknown requirement {0}")]
    UnknownRequirement(RequirementId),

    /// A QA reviewer id was empty or whitespace.
    #[error("QA reviewer must not be empty")]
    EmptyReviewer,

    /// A registry name was empty or whitespace.
    #[error("registry name must not be empty")]
    EmptyName,

    /// An attribute key is not declared in the configuration.
    #[error("attribute '{0}' is not a known attribute")]
    UndeclaredAttribute(String),
}
