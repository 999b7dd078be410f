use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use nonempty::NonEmpty;

use crate::{
    Error,
    domain::{
        Attributes, Comment, CommentTarget, Prefix, RegistryId, Requirement, RequirementId,
        ValidationError,
        history::{Event, HistoryEntry},
        status::{Action, InvalidTransitionError, Outcome, RegistryStatus, RequirementStatus},
    },
    error::NotFoundError,
};

/// A named collection of requirements undergoing review.
///
/// All mutation goes through `pub(crate)` methods driven by
/// [`Workflow`](crate::Workflow), which keeps the status invariants in one
/// place: an unsubmitted registry is always `NotPublished`, and requirement
/// ids are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub(crate) id: RegistryId,
    pub(crate) name: String,
    pub(crate) owner: String,
    pub(crate) status: RegistryStatus,
    pub(crate) submitted: bool,
    pub(crate) created: DateTime<Utc>,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) comments: Vec<Comment>,
    pub(crate) history: Vec<HistoryEntry>,
}

/// A compact description of a registry, used for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySummary {
    /// Registry id.
    pub id: RegistryId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: String,
    /// Current status.
    pub status: RegistryStatus,
    /// Whether the registry has left draft state.
    pub submitted: bool,
    /// Number of requirements.
    pub requirement_count: usize,
    /// Number of comments at all levels.
    pub comment_count: usize,
}

impl Registry {
    /// Builds a registry from imported rows, numbering requirements from 1.
    pub(crate) fn import(
        name: String,
        owner: String,
        rows: NonEmpty<Attributes>,
        prefix: &Prefix,
        at: DateTime<Utc>,
    ) -> Self {
        let requirements: Vec<_> = rows
            .into_iter()
            .zip(1..)
            .map(|(attributes, n)| {
                let number = NonZeroUsize::new(n).expect("numbering starts at one");
                Requirement::new(
                    RequirementId::new(prefix.clone(), number),
                    owner.clone(),
                    attributes,
                )
            })
            .collect();

        let mut registry = Self {
            id: RegistryId::new_v4(),
            name,
            owner,
            status: RegistryStatus::NotPublished,
            submitted: false,
            created: at,
            requirements,
            comments: Vec::new(),
            history: Vec::new(),
        };
        let rows = registry.requirements.len();
        registry.record(at, None, Event::Imported { rows });
        registry
    }

    /// Registry id.
    #[must_use]
    pub const fn id(&self) -> RegistryId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creator of the registry.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> RegistryStatus {
        self.status
    }

    /// Whether the registry has left draft state.
    #[must_use]
    pub const fn submitted(&self) -> bool {
        self.submitted
    }

    /// Creation time.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Requirements in registry order.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Looks up a requirement by id.
    #[must_use]
    pub fn requirement(&self, id: &RequirementId) -> Option<&Requirement> {
        self.requirements.iter().find(|r| &r.id == id)
    }

    /// Document-level comments in creation order.
    #[must_use]
    pub fn document_comments(&self) -> &[Comment] {
        &self.comments
    }

    /// The most recent document-level comment text.
    #[must_use]
    pub fn document_comment(&self) -> Option<&str> {
        self.comments.last().map(Comment::text)
    }

    /// Every comment in the registry: document level first, then each
    /// requirement's log in registry order.
    pub fn all_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments
            .iter()
            .chain(self.requirements.iter().flat_map(|r| r.comments.iter()))
    }

    /// Audit trail in the order commands were applied.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Builds the listing summary.
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner.clone(),
            status: self.status,
            submitted: self.submitted,
            requirement_count: self.requirements.len(),
            comment_count: self.all_comments().count(),
        }
    }

    fn record(&mut self, at: DateTime<Utc>, requirement: Option<RequirementId>, event: Event) {
        self.history.push(HistoryEntry {
            at,
            requirement,
            event,
        });
    }

    fn requirement_mut(&mut self, id: &RequirementId) -> Result<&mut Requirement, NotFoundError> {
        let registry = self.id;
        self.requirements
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| NotFoundError::Requirement {
                registry,
                requirement: id.clone(),
            })
    }

    fn next_requirement_id(&self, prefix: &Prefix) -> RequirementId {
        let next = self
            .requirements
            .iter()
            .map(|r| r.id.number().get())
            .max()
            .unwrap_or(0)
            + 1;
        RequirementId::new(
            prefix.clone(),
            NonZeroUsize::new(next).expect("next id is always positive"),
        )
    }

    pub(crate) fn rename(&mut self, name: String, at: DateTime<Utc>) {
        let from = std::mem::replace(&mut self.name, name);
        self.record(at, None, Event::Renamed { from });
    }

    pub(crate) fn submit(&mut self, at: DateTime<Utc>) -> Result<(), InvalidTransitionError> {
        if self.submitted {
            return Err(InvalidTransitionError::Registry {
                from: self.status,
                action: Action::Submit,
            });
        }
        self.status = self.status.submit()?;
        self.submitted = true;
        self.record(at, None, Event::Submitted);
        Ok(())
    }

    pub(crate) fn request_approval(
        &mut self,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransitionError> {
        let status = self.status.request_approval()?;
        let pending = self
            .requirements
            .iter()
            .filter(|r| !r.status.is_terminal())
            .count();
        if pending > 0 {
            return Err(InvalidTransitionError::PendingRequirements { pending });
        }
        self.status = status;
        self.record(at, None, Event::ApprovalRequested);
        Ok(())
    }

    pub(crate) fn decide(
        &mut self,
        outcome: Outcome,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransitionError> {
        self.status = self.status.decide(outcome)?;
        self.record(at, None, Event::RegistryDecided { outcome });
        Ok(())
    }

    /// Returns the status before reopening, or `None` if the registry was
    /// never submitted.
    pub(crate) fn reopen(&mut self, at: DateTime<Utc>) -> Option<RegistryStatus> {
        if !self.submitted {
            return None;
        }
        let from = self.status;
        self.status = RegistryStatus::NotPublished;
        self.submitted = false;
        self.record(at, None, Event::RegistryReopened { from });
        Some(from)
    }

    pub(crate) fn submit_requirement(
        &mut self,
        id: &RequirementId,
        at: DateTime<Utc>,
    ) -> Result<&Requirement, Error> {
        self.requirement_mut(id)?.submit()?;
        self.record(at, Some(id.clone()), Event::Submitted);
        Ok(self.requirement_ref(id))
    }

    pub(crate) fn assign_reviewer(
        &mut self,
        id: &RequirementId,
        user: String,
        at: DateTime<Utc>,
    ) -> Result<&Requirement, Error> {
        self.requirement_mut(id)?.assign_reviewer(user.clone())?;
        self.record(at, Some(id.clone()), Event::ReviewerAssigned { user });
        Ok(self.requirement_ref(id))
    }

    pub(crate) fn decide_requirement(
        &mut self,
        id: &RequirementId,
        outcome: Outcome,
        at: DateTime<Utc>,
    ) -> Result<&Requirement, Error> {
        self.requirement_mut(id)?.decide(outcome, at)?;
        self.record(at, Some(id.clone()), Event::Decided { outcome });
        Ok(self.requirement_ref(id))
    }

    /// Sends a requirement back to draft. A registry past QA drops back to
    /// `InQaQc` because it now holds an undecided requirement.
    pub(crate) fn reopen_requirement(
        &mut self,
        id: &RequirementId,
        at: DateTime<Utc>,
    ) -> Result<(&Requirement, RequirementStatus), Error> {
        let requirement = self.requirement_mut(id)?;
        let from = requirement.status;
        requirement.reopen();
        if matches!(
            self.status,
            RegistryStatus::WaitingForApproval | RegistryStatus::Approved | RegistryStatus::Rejected
        ) {
            self.status = RegistryStatus::InQaQc;
        }
        self.record(at, Some(id.clone()), Event::Reopened { from });
        Ok((self.requirement_ref(id), from))
    }

    pub(crate) fn clone_requirement(
        &mut self,
        id: &RequirementId,
        prefix: &Prefix,
        at: DateTime<Utc>,
    ) -> Result<&Requirement, Error> {
        let new_id = self.next_requirement_id(prefix);
        let copy = self
            .requirement(id)
            .ok_or_else(|| NotFoundError::Requirement {
                registry: self.id,
                requirement: id.clone(),
            })?
            .duplicate(new_id.clone());
        self.requirements.push(copy);
        self.record(
            at,
            Some(new_id.clone()),
            Event::RequirementCloned { source: id.clone() },
        );
        Ok(self.requirement_ref(&new_id))
    }

    /// Deep copy with a fresh identity and no review state, comments or
    /// history. Copied requirements are numbered after the source's last
    /// requirement, in source order, so no id is shared with the source.
    pub(crate) fn duplicate(&self, prefix: &Prefix, at: DateTime<Utc>) -> Self {
        let first = self.next_requirement_id(prefix).number();
        let mut copy = Self {
            id: RegistryId::new_v4(),
            name: format!("{} (Clone)", self.name),
            owner: self.owner.clone(),
            status: RegistryStatus::NotPublished,
            submitted: false,
            created: at,
            requirements: self
                .requirements
                .iter()
                .zip(0..)
                .map(|(r, offset)| {
                    r.duplicate(RequirementId::new(
                        prefix.clone(),
                        first.saturating_add(offset),
                    ))
                })
                .collect(),
            comments: Vec::new(),
            history: Vec::new(),
        };
        copy.record(at, None, Event::ClonedFrom { source: self.id });
        copy
    }

    /// Returns the audited keys. With `skip_noop` only keys whose value
    /// changed are audited, so an empty result means nothing happened.
    pub(crate) fn update_attributes(
        &mut self,
        id: &RequirementId,
        changes: Attributes,
        skip_noop: bool,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>, Error> {
        let all_keys: Vec<_> = changes.keys().cloned().collect();
        let changed = self.requirement_mut(id)?.merge_attributes(changes);
        let keys = if skip_noop { changed } else { all_keys };
        if !keys.is_empty() {
            self.record(
                at,
                Some(id.clone()),
                Event::AttributesUpdated { keys: keys.clone() },
            );
        }
        Ok(keys)
    }

    /// Appends a comment to the log its target belongs to.
    pub(crate) fn add_comment(&mut self, comment: Comment) -> Result<(), ValidationError> {
        match comment.target.clone() {
            CommentTarget::Document { .. } => self.comments.push(comment),
            CommentTarget::Row { requirement, .. } => {
                let target = self
                    .requirement_mut(&requirement)
                    .map_err(|_| ValidationError::UnknownRequirement(requirement))?;
                target.comments.push(comment);
            }
            CommentTarget::Cell {
                requirement,
                attribute,
                ..
            } => {
                let target = self
                    .requirement_mut(&requirement)
                    .map_err(|_| ValidationError::UnknownRequirement(requirement.clone()))?;
                if !target.attributes.contains_key(&attribute) {
                    return Err(ValidationError::UnknownAttribute {
                        requirement,
                        attribute,
                    });
                }
                target.comments.push(comment);
            }
        }
        Ok(())
    }

    fn requirement_ref(&self, id: &RequirementId) -> &Requirement {
        self.requirement(id)
            .expect("requirement was looked up earlier in the same command")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(countries: &[&str]) -> NonEmpty<Attributes> {
        let rows: Vec<Attributes> = countries
            .iter()
            .map(|c| [("Country".to_string(), (*c).to_string())].into())
            .collect();
        NonEmpty::from_vec(rows).unwrap()
    }

    fn registry(countries: &[&str]) -> Registry {
        Registry::import(
            "Reg A".to_string(),
            "alice".to_string(),
            rows(countries),
            &Prefix::default(),
            Utc::now(),
        )
    }

    fn id(s: &str) -> RequirementId {
        s.parse().unwrap()
    }

    fn assert_invariants(registry: &Registry) {
        if !registry.submitted() {
            assert_eq!(registry.status(), RegistryStatus::NotPublished);
        }
        let mut ids: Vec<_> = registry.requirements().iter().map(Requirement::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), registry.requirements().len());
    }

    #[test]
    fn import_numbers_requirements_sequentially() {
        let registry = registry(&["US", "DE"]);
        let ids: Vec<_> = registry
            .requirements()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, ["REQ-001", "REQ-002"]);
        assert_eq!(registry.status(), RegistryStatus::NotPublished);
        assert!(!registry.submitted());
        assert_eq!(registry.history().len(), 1);
        assert_invariants(&registry);
    }

    #[test]
    fn submit_twice_fails_without_side_effects() {
        let mut registry = registry(&["US"]);
        registry.submit(Utc::now()).unwrap();
        let before = registry.clone();

        assert!(registry.submit(Utc::now()).is_err());
        assert_eq!(registry, before);
    }

    #[test]
    fn request_approval_needs_every_requirement_decided() {
        let mut registry = registry(&["US", "DE"]);
        registry.submit(Utc::now()).unwrap();
        let req = id("REQ-001");
        registry.submit_requirement(&req, Utc::now()).unwrap();
        registry
            .assign_reviewer(&req, "qa".to_string(), Utc::now())
            .unwrap();
        registry
            .decide_requirement(&req, Outcome::Approve, Utc::now())
            .unwrap();

        let error = registry.request_approval(Utc::now()).unwrap_err();
        assert_eq!(
            error,
            InvalidTransitionError::PendingRequirements { pending: 1 }
        );
        assert_eq!(registry.status(), RegistryStatus::InQaQc);
    }

    #[test]
    fn reopening_a_requirement_pulls_registry_back_into_qa() {
        let mut registry = registry(&["US"]);
        let req = id("REQ-001");
        registry.submit(Utc::now()).unwrap();
        registry.submit_requirement(&req, Utc::now()).unwrap();
        registry
            .assign_reviewer(&req, "qa".to_string(), Utc::now())
            .unwrap();
        registry
            .decide_requirement(&req, Outcome::Approve, Utc::now())
            .unwrap();
        registry.request_approval(Utc::now()).unwrap();
        registry.decide(Outcome::Approve, Utc::now()).unwrap();

        let (requirement, from) = registry.reopen_requirement(&req, Utc::now()).unwrap();
        assert_eq!(from, RequirementStatus::Approved);
        assert_eq!(requirement.status(), RequirementStatus::Draft);
        assert_eq!(registry.status(), RegistryStatus::InQaQc);
        assert!(registry.submitted());
        assert_invariants(&registry);
    }

    #[test]
    fn reopen_registry_restores_draft_state() {
        let mut registry = registry(&["US"]);
        assert_eq!(registry.reopen(Utc::now()), None);

        registry.submit(Utc::now()).unwrap();
        assert_eq!(registry.reopen(Utc::now()), Some(RegistryStatus::InQaQc));
        assert!(!registry.submitted());
        assert_invariants(&registry);
    }

    #[test]
    fn clone_requirement_takes_next_free_number() {
        let mut registry = registry(&["US", "DE"]);
        let clone = registry
            .clone_requirement(&id("REQ-001"), &Prefix::default(), Utc::now())
            .unwrap();
        assert_eq!(clone.id().to_string(), "REQ-003");
        assert_eq!(clone.attribute("Country"), Some("US"));
        assert_eq!(clone.status(), RequirementStatus::Draft);
        assert_eq!(registry.requirements().len(), 3);
        assert_invariants(&registry);
    }

    #[test]
    fn duplicate_drops_comments_and_review_state() {
        let mut registry = registry(&["US", "DE"]);
        let req = id("REQ-001");
        registry.submit(Utc::now()).unwrap();
        registry.submit_requirement(&req, Utc::now()).unwrap();
        let comment = Comment::new(
            CommentTarget::Row {
                registry: registry.id(),
                requirement: req.clone(),
            },
            "bob",
            "check",
            Utc::now(),
        )
        .unwrap();
        registry.add_comment(comment).unwrap();

        let copy = registry.duplicate(&Prefix::default(), Utc::now());

        assert_ne!(copy.id(), registry.id());
        assert_eq!(copy.name(), "Reg A (Clone)");
        assert!(!copy.submitted());
        assert_eq!(copy.all_comments().count(), 0);
        assert_eq!(copy.requirements().len(), 2);
        for (original, cloned) in registry.requirements().iter().zip(copy.requirements()) {
            assert_ne!(original.uuid(), cloned.uuid());
            assert_ne!(original.id(), cloned.id());
            assert_eq!(original.attributes(), cloned.attributes());
            assert_eq!(cloned.status(), RequirementStatus::Draft);
        }
        assert_invariants(&copy);
    }

    #[test]
    fn cell_comment_on_missing_attribute_is_rejected() {
        let mut registry = registry(&["US"]);
        let comment = Comment::new(
            CommentTarget::Cell {
                registry: registry.id(),
                requirement: id("REQ-001"),
                attribute: "Jurisdiction".to_string(),
            },
            "bob",
            "check value",
            Utc::now(),
        )
        .unwrap();

        let error = registry.add_comment(comment).unwrap_err();
        assert!(matches!(error, ValidationError::UnknownAttribute { .. }));
        assert_eq!(registry.all_comments().count(), 0);
    }

    #[test]
    fn document_comment_is_latest_document_level_text() {
        let mut registry = registry(&["US"]);
        assert_eq!(registry.document_comment(), None);
        for text in ["first", "second"] {
            let comment = Comment::new(
                CommentTarget::Document {
                    registry: registry.id(),
                },
                "bob",
                text,
                Utc::now(),
            )
            .unwrap();
            registry.add_comment(comment).unwrap();
        }
        assert_eq!(registry.document_comment(), Some("second"));
        assert_eq!(registry.summary().comment_count, 2);
    }
}
