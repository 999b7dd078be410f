// On-disk representation of a registry.
//
// Domain types do not derive serde. Everything that is written to disk goes
// through the versioned document types here, which keep ids and statuses as
// plain strings and validate them on the way back in.

use std::{collections::HashSet, str::FromStr};

use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Attributes, Comment, CommentTarget, Decision, Event, HistoryEntry, Outcome, Registry,
    RegistryId, RegistryStatus, Requirement, RequirementId, RequirementStatus,
};

/// The serialized versions of a registry document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
pub enum RegistryDocument {
    #[serde(rename = "1")]
    V1(RegistryV1),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryV1 {
    id: Uuid,
    name: String,
    owner: String,
    status: String,
    submitted: bool,
    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    comments: Vec<CommentV1>,
    requirements: Vec<RequirementV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<HistoryV1>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequirementV1 {
    uuid: Uuid,
    id: String,
    owner: String,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qa_user: Option<String>,
    attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decision: Option<DecisionV1>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    comments: Vec<CommentV1>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DecisionV1 {
    outcome: String,
    decided_at: DateTime<Utc>,
    fingerprint: String,
}

/// A comment without its owner; the target is implied by where the comment is
/// stored, plus the attribute name for cell comments.
#[derive(Debug, Serialize, Deserialize)]
struct CommentV1 {
    id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute: Option<String>,
    author: String,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryV1 {
    at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requirement: Option<String>,
    event: EventV1,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EventV1 {
    Imported { rows: usize },
    ClonedFrom { source: Uuid },
    RequirementCloned { source: String },
    Renamed { from: String },
    Submitted,
    ReviewerAssigned { user: String },
    Decided { outcome: String },
    ApprovalRequested,
    RegistryDecided { outcome: String },
    Reopened { from: String },
    RegistryReopened { from: String },
    AttributesUpdated { keys: Vec<String> },
}

impl From<&Registry> for RegistryDocument {
    fn from(registry: &Registry) -> Self {
        Self::V1(RegistryV1 {
            id: registry.id.as_uuid(),
            name: registry.name.clone(),
            owner: registry.owner.clone(),
            status: registry.status.as_str().to_string(),
            submitted: registry.submitted,
            created: registry.created,
            comments: registry.comments.iter().map(CommentV1::from).collect(),
            requirements: registry
                .requirements
                .iter()
                .map(RequirementV1::from)
                .collect(),
            history: registry.history.iter().map(HistoryV1::from).collect(),
        })
    }
}

impl From<&Requirement> for RequirementV1 {
    fn from(requirement: &Requirement) -> Self {
        Self {
            uuid: requirement.uuid,
            id: requirement.id.to_string(),
            owner: requirement.owner.clone(),
            status: requirement.status.as_str().to_string(),
            qa_user: requirement.qa_user.clone(),
            attributes: requirement.attributes.clone(),
            decision: requirement.decision.as_ref().map(|d| DecisionV1 {
                outcome: d.outcome.to_string(),
                decided_at: d.decided_at,
                fingerprint: d.fingerprint.clone(),
            }),
            comments: requirement.comments.iter().map(CommentV1::from).collect(),
        }
    }
}

impl From<&Comment> for CommentV1 {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            attribute: comment.target.attribute().map(ToString::to_string),
            author: comment.author.to_string(),
            text: comment.text.to_string(),
            created_at: comment.created_at,
        }
    }
}

impl From<&HistoryEntry> for HistoryV1 {
    fn from(entry: &HistoryEntry) -> Self {
        let event = match &entry.event {
            Event::Imported { rows } => EventV1::Imported { rows: *rows },
            Event::ClonedFrom { source } => EventV1::ClonedFrom {
                source: source.as_uuid(),
            },
            Event::RequirementCloned { source } => EventV1::RequirementCloned {
                source: source.to_string(),
            },
            Event::Renamed { from } => EventV1::Renamed { from: from.clone() },
            Event::Submitted => EventV1::Submitted,
            Event::ReviewerAssigned { user } => EventV1::ReviewerAssigned { user: user.clone() },
            Event::Decided { outcome } => EventV1::Decided {
                outcome: outcome.to_string(),
            },
            Event::ApprovalRequested => EventV1::ApprovalRequested,
            Event::RegistryDecided { outcome } => EventV1::RegistryDecided {
                outcome: outcome.to_string(),
            },
            Event::Reopened { from } => EventV1::Reopened {
                from: from.as_str().to_string(),
            },
            Event::RegistryReopened { from } => EventV1::RegistryReopened {
                from: from.as_str().to_string(),
            },
            Event::AttributesUpdated { keys } => EventV1::AttributesUpdated { keys: keys.clone() },
        };
        Self {
            at: entry.at,
            requirement: entry.requirement.as_ref().map(ToString::to_string),
            event,
        }
    }
}

impl TryFrom<RegistryDocument> for Registry {
    type Error = String;

    fn try_from(document: RegistryDocument) -> Result<Self, Self::Error> {
        let RegistryDocument::V1(RegistryV1 {
            id,
            name,
            owner,
            status,
            submitted,
            created,
            comments,
            requirements,
            history,
        }) = document;
        let id = RegistryId::from(id);

        let status = registry_status(&status)?;
        if !submitted && status != RegistryStatus::NotPublished {
            return Err(format!(
                "registry is not submitted but has status {status}"
            ));
        }

        let comments = comments
            .into_iter()
            .map(|c| {
                if c.attribute.is_some() {
                    return Err("document comment names an attribute".to_string());
                }
                c.into_comment(CommentTarget::Document { registry: id })
            })
            .collect::<Result<_, _>>()?;

        let requirements = requirements
            .into_iter()
            .map(|r| r.into_requirement(id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        if let Some(duplicate) = requirements.iter().find(|r| !seen.insert(&r.id)) {
            return Err(format!("duplicate requirement id {}", duplicate.id));
        }

        let history = history
            .into_iter()
            .map(HistoryV1::into_entry)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            id,
            name,
            owner,
            status,
            submitted,
            created,
            requirements,
            comments,
            history,
        })
    }
}

impl RequirementV1 {
    fn into_requirement(self, registry: RegistryId) -> Result<Requirement, String> {
        let Self {
            uuid,
            id,
            owner,
            status,
            qa_user,
            attributes,
            decision,
            comments,
        } = self;
        let id = requirement_id(&id)?;

        let comments = comments
            .into_iter()
            .map(|c| {
                let target = match c.attribute.clone() {
                    Some(attribute) => CommentTarget::Cell {
                        registry,
                        requirement: id.clone(),
                        attribute,
                    },
                    None => CommentTarget::Row {
                        registry,
                        requirement: id.clone(),
                    },
                };
                c.into_comment(target)
            })
            .collect::<Result<_, _>>()?;

        let decision = decision
            .map(|d| {
                Ok::<_, String>(Decision {
                    outcome: Outcome::from_str(&d.outcome)?,
                    decided_at: d.decided_at,
                    fingerprint: d.fingerprint,
                })
            })
            .transpose()?;

        Ok(Requirement {
            uuid,
            status: requirement_status(&status)?,
            id,
            attributes,
            owner,
            qa_user,
            comments,
            decision,
        })
    }
}

impl CommentV1 {
    fn into_comment(self, target: CommentTarget) -> Result<Comment, String> {
        let Self {
            id,
            author,
            text,
            created_at,
            ..
        } = self;
        Ok(Comment {
            id,
            target,
            author: NonEmptyString::new(author)
                .map_err(|_| format!("comment {id} has an empty author"))?,
            text: NonEmptyString::new(text).map_err(|_| format!("comment {id} has empty text"))?,
            created_at,
        })
    }
}

impl HistoryV1 {
    fn into_entry(self) -> Result<HistoryEntry, String> {
        let event = match self.event {
            EventV1::Imported { rows } => Event::Imported { rows },
            EventV1::ClonedFrom { source } => Event::ClonedFrom {
                source: source.into(),
            },
            EventV1::RequirementCloned { source } => Event::RequirementCloned {
                source: requirement_id(&source)?,
            },
            EventV1::Renamed { from } => Event::Renamed { from },
            EventV1::Submitted => Event::Submitted,
            EventV1::ReviewerAssigned { user } => Event::ReviewerAssigned { user },
            EventV1::Decided { outcome } => Event::Decided {
                outcome: outcome.parse()?,
            },
            EventV1::ApprovalRequested => Event::ApprovalRequested,
            EventV1::RegistryDecided { outcome } => Event::RegistryDecided {
                outcome: outcome.parse()?,
            },
            EventV1::Reopened { from } => Event::Reopened {
                from: requirement_status(&from)?,
            },
            EventV1::RegistryReopened { from } => Event::RegistryReopened {
                from: registry_status(&from)?,
            },
            EventV1::AttributesUpdated { keys } => Event::AttributesUpdated { keys },
        };
        Ok(HistoryEntry {
            at: self.at,
            requirement: self.requirement.as_deref().map(requirement_id).transpose()?,
            event,
        })
    }
}

fn requirement_id(s: &str) -> Result<RequirementId, String> {
    s.parse()
        .map_err(|e| format!("invalid requirement id '{s}': {e}"))
}

fn requirement_status(s: &str) -> Result<RequirementStatus, String> {
    RequirementStatus::from_name(s).ok_or_else(|| format!("unknown requirement status '{s}'"))
}

fn registry_status(s: &str) -> Result<RegistryStatus, String> {
    RegistryStatus::from_name(s).ok_or_else(|| format!("unknown registry status '{s}'"))
}
