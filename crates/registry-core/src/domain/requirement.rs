use std::collections::BTreeMap;

use borsh::BorshSerialize;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{
    Comment, RequirementId,
    status::{InvalidTransitionError, Outcome, RequirementStatus},
};

/// Free-form, string-valued fields of a requirement, keyed by attribute name.
///
/// There is no fixed schema; any key set is legal unless the configuration
/// says otherwise.
pub type Attributes = BTreeMap<String, String>;

/// A single reviewable record inside a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub(crate) uuid: Uuid,
    pub(crate) id: RequirementId,
    pub(crate) attributes: Attributes,
    pub(crate) status: RequirementStatus,
    pub(crate) owner: String,
    pub(crate) qa_user: Option<String>,
    pub(crate) comments: Vec<Comment>,
    pub(crate) decision: Option<Decision>,
}

/// The last approve/reject decision taken on a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Approve or reject.
    pub outcome: Outcome,
    /// When the decision was taken.
    pub decided_at: DateTime<Utc>,
    /// Attribute fingerprint at decision time.
    pub fingerprint: String,
}

impl Requirement {
    pub(crate) fn new(id: RequirementId, owner: String, attributes: Attributes) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id,
            attributes,
            status: RequirementStatus::Draft,
            owner,
            qa_user: None,
            comments: Vec::new(),
            decision: None,
        }
    }

    /// Fresh copy for cloning: same attributes and owner, new identity, back
    /// to draft, no comments or review state.
    pub(crate) fn duplicate(&self, id: RequirementId) -> Self {
        Self::new(id, self.owner.clone(), self.attributes.clone())
    }

    /// Globally unique identity.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Identifier within the owning registry.
    #[must_use]
    pub const fn id(&self) -> &RequirementId {
        &self.id
    }

    /// The attribute mapping.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Value of a single attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Value of an attribute, matching the key case-insensitively.
    #[must_use]
    pub fn attribute_ignore_case(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Current review status.
    #[must_use]
    pub const fn status(&self) -> RequirementStatus {
        self.status
    }

    /// Responsible user.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Assigned QA reviewer, if any.
    #[must_use]
    pub fn qa_user(&self) -> Option<&str> {
        self.qa_user.as_deref()
    }

    /// Row- and cell-level comments in creation order.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// The last decision, cleared by reopening.
    #[must_use]
    pub const fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    /// Returns a value generated by hashing the attributes.
    ///
    /// Any change to an attribute changes the fingerprint. Status, reviewer
    /// and comments do not contribute.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.attributes)
    }

    /// Whether the attributes changed after the last decision.
    #[must_use]
    pub fn is_decision_stale(&self) -> bool {
        self.decision
            .as_ref()
            .is_some_and(|decision| decision.fingerprint != self.fingerprint())
    }

    pub(crate) fn submit(&mut self) -> Result<(), InvalidTransitionError> {
        self.status = self.status.submit()?;
        Ok(())
    }

    pub(crate) fn assign_reviewer(&mut self, user: String) -> Result<(), InvalidTransitionError> {
        self.status = self.status.assign_reviewer()?;
        self.qa_user = Some(user);
        Ok(())
    }

    pub(crate) fn decide(
        &mut self,
        outcome: Outcome,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransitionError> {
        self.status = self.status.decide(outcome)?;
        self.decision = Some(Decision {
            outcome,
            decided_at: at,
            fingerprint: self.fingerprint(),
        });
        Ok(())
    }

    pub(crate) fn reopen(&mut self) {
        self.status = self.status.reopen();
        self.qa_user = None;
        self.decision = None;
    }

    /// Merges `changes` into the attributes and returns the keys whose value
    /// actually changed.
    pub(crate) fn merge_attributes(&mut self, changes: Attributes) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in changes {
            if self.attributes.get(&key) != Some(&value) {
                changed.push(key.clone());
                self.attributes.insert(key, value);
            }
        }
        changed
    }
}

fn fingerprint(attributes: &Attributes) -> String {
    #[derive(BorshSerialize)]
    struct FingerprintData<'a> {
        attributes: &'a Attributes,
    }

    // encode using [borsh](https://borsh.io/)
    let encoded = borsh::to_vec(&FingerprintData { attributes }).expect("this should never fail");

    let hash = Sha256::digest(encoded);

    format!("{hash:x}")
}
