//! The command layer.
//!
//! [`Workflow`] is the only way to change a registry. Each command loads an
//! owned copy from the store, applies the change to the copy, and saves it
//! only if every check passed, so a failed command leaves the store exactly
//! as it was.

use chrono::{DateTime, TimeDelta, Utc};
use nonempty::NonEmpty;
use tracing::instrument;

use crate::{
    Error,
    domain::{
        Attributes, Comment, CommentLevel, CommentTarget, Config, FlatRow, Outcome, Registry,
        RegistryFilter, RegistryId, RegistrySummary, Requirement, RequirementId, ValidationError,
        filter,
    },
    error::{ImportError, NotFoundError},
    storage::RegistryStore,
};

/// Narrowing criteria for [`Workflow::list_comments`].
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentQuery {
    /// Only comments of this level.
    pub level: Option<CommentLevel>,
    /// Only comments in this registry.
    pub registry: Option<RegistryId>,
    /// Only comments on this requirement.
    pub requirement: Option<RequirementId>,
}

/// A requirement whose attributes changed after it was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleDecision {
    /// The owning registry.
    pub registry: RegistryId,
    /// Name of the owning registry.
    pub registry_name: String,
    /// The requirement.
    pub requirement: RequirementId,
}

/// Registry review commands and queries over a [`RegistryStore`].
#[derive(Debug)]
pub struct Workflow<S> {
    store: S,
    config: Config,
    last_timestamp: Option<DateTime<Utc>>,
}

impl<S: RegistryStore> Workflow<S> {
    /// Creates a workflow over `store`.
    #[must_use]
    pub const fn new(store: S, config: Config) -> Self {
        Self {
            store,
            config,
            last_timestamp: None,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the workflow and returns its store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// The current time, strictly later than any time handed out before, so
    /// comments and history entries have a total creation order.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::nanoseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(at);
        at
    }

    fn load(&self, id: RegistryId) -> Result<Registry, Error> {
        self.store
            .get(id)?
            .ok_or_else(|| NotFoundError::Registry(id).into())
    }

    /// Runs `command` against a copy of the registry and saves the copy if the
    /// command succeeded.
    fn apply<T>(
        &mut self,
        id: RegistryId,
        command: impl FnOnce(&mut Registry, DateTime<Utc>) -> Result<T, Error>,
    ) -> Result<(Registry, T), Error> {
        let mut registry = self.load(id)?;
        let at = self.tick();
        let output = command(&mut registry, at)?;
        self.store.save(&registry)?;
        Ok((registry, output))
    }

    /// Creates a registry from imported rows.
    ///
    /// Every row becomes a `Draft` requirement, numbered from 1 in row order.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError`] if the name is blank, `rows` is empty, a row
    /// is empty, or a row breaks the configured attribute schema.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub fn import_registry(
        &mut self,
        name: &str,
        owner: &str,
        rows: Vec<Attributes>,
    ) -> Result<Registry, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ImportError::EmptyName.into());
        }
        let rows = NonEmpty::from_vec(rows).ok_or(ImportError::NoRows)?;
        for (row, attributes) in rows.iter().enumerate().map(|(i, a)| (i + 1, a)) {
            self.check_row(row, attributes)?;
        }

        let at = self.tick();
        let registry = Registry::import(
            name.to_string(),
            owner.to_string(),
            rows,
            self.config.prefix(),
            at,
        );
        self.store.save(&registry)?;
        tracing::info!(
            "Imported registry '{}' ({}) with {} requirements",
            registry.name(),
            registry.id(),
            registry.requirements().len()
        );
        Ok(registry)
    }

    fn check_row(&self, row: usize, attributes: &Attributes) -> Result<(), ImportError> {
        if attributes.is_empty() {
            return Err(ImportError::EmptyRow { row });
        }
        if let Some(attribute) = self
            .config
            .required_attributes()
            .iter()
            .find(|required| !attributes.contains_key(*required))
        {
            return Err(ImportError::MissingAttribute {
                row,
                attribute: attribute.clone(),
            });
        }
        if let Some(attribute) = attributes
            .keys()
            .find(|key| !self.config.is_attribute_allowed(key))
        {
            return Err(ImportError::UndeclaredAttribute {
                row,
                attribute: attribute.clone(),
            });
        }
        Ok(())
    }

    /// Loads a registry.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown id.
    pub fn get_registry(&self, id: RegistryId) -> Result<Registry, Error> {
        self.load(id)
    }

    /// Loads a single requirement.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the registry or requirement is unknown.
    pub fn get_requirement(
        &self,
        registry: RegistryId,
        requirement: &RequirementId,
    ) -> Result<Requirement, Error> {
        self.load(registry)?
            .requirement(requirement)
            .cloned()
            .ok_or_else(|| {
                NotFoundError::Requirement {
                    registry,
                    requirement: requirement.clone(),
                }
                .into()
            })
    }

    /// Registries passing `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn find_registries(&self, filter: &RegistryFilter) -> Result<Vec<Registry>, Error> {
        let matcher = filter.matcher();
        let mut registries = self.store.list()?;
        registries.retain(|registry| matcher.matches(registry));
        Ok(registries)
    }

    /// Summaries of the registries passing `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip(self))]
    pub fn list_registries(&self, filter: &RegistryFilter) -> Result<Vec<RegistrySummary>, Error> {
        let summaries: Vec<_> = self
            .find_registries(filter)?
            .iter()
            .map(Registry::summary)
            .collect();
        tracing::debug!("{} registries match", summaries.len());
        Ok(summaries)
    }

    /// One row per requirement across `registries`.
    #[must_use]
    pub fn flatten_requirements(registries: &[Registry]) -> Vec<FlatRow> {
        filter::flatten(registries)
    }

    /// Submits a draft registry into QA.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidTransitionError`](crate::domain::InvalidTransitionError)
    /// if the registry was already submitted.
    #[instrument(skip(self))]
    pub fn submit_registry(&mut self, id: RegistryId) -> Result<Registry, Error> {
        let (registry, ()) = self.apply(id, |registry, at| Ok(registry.submit(at)?))?;
        tracing::info!("Submitted registry {id}");
        Ok(registry)
    }

    /// Moves a requirement from `Draft` to `Submitted`.
    ///
    /// # Errors
    ///
    /// Returns an error if either id is unknown or the requirement is not a
    /// draft.
    #[instrument(skip(self))]
    pub fn submit_requirement(
        &mut self,
        registry: RegistryId,
        requirement: &RequirementId,
    ) -> Result<Requirement, Error> {
        let (_, updated) = self.apply(registry, |r, at| {
            r.submit_requirement(requirement, at).cloned()
        })?;
        tracing::info!("Submitted {requirement} in registry {registry}");
        Ok(updated)
    }

    /// Assigns a QA reviewer. A `Submitted` requirement enters `InQaQc`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank reviewer, or an error if
    /// either id is unknown or the requirement was already decided.
    #[instrument(skip(self))]
    pub fn assign_qa_reviewer(
        &mut self,
        registry: RegistryId,
        requirement: &RequirementId,
        user: &str,
    ) -> Result<Requirement, Error> {
        let user = user.trim();
        if user.is_empty() {
            return Err(ValidationError::EmptyReviewer.into());
        }
        let (_, updated) = self.apply(registry, |r, at| {
            r.assign_reviewer(requirement, user.to_string(), at)
                .cloned()
        })?;
        tracing::info!(
            "Assigned {user} to {requirement}, now {}",
            updated.status()
        );
        Ok(updated)
    }

    /// Approves or rejects a requirement in QA.
    ///
    /// # Errors
    ///
    /// Returns an error if either id is unknown or the requirement is not in
    /// `InQaQc`.
    #[instrument(skip(self))]
    pub fn decide(
        &mut self,
        registry: RegistryId,
        requirement: &RequirementId,
        outcome: Outcome,
    ) -> Result<Requirement, Error> {
        let (_, updated) = self.apply(registry, |r, at| {
            r.decide_requirement(requirement, outcome, at).cloned()
        })?;
        tracing::info!("{requirement} decided: {outcome}");
        Ok(updated)
    }

    /// Sends a requirement back to `Draft` from any status.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if either id is unknown.
    #[instrument(skip(self))]
    pub fn reopen(
        &mut self,
        registry: RegistryId,
        requirement: &RequirementId,
    ) -> Result<Requirement, Error> {
        let (_, (updated, from)) = self.apply(registry, |r, at| {
            r.reopen_requirement(requirement, at)
                .map(|(req, from)| (req.clone(), from))
        })?;
        tracing::warn!("Reopened {requirement} in registry {registry} (was {from})");
        Ok(updated)
    }

    /// Moves a registry whose requirements are all decided to
    /// `WaitingForApproval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not in `InQaQc` or still holds
    /// undecided requirements.
    #[instrument(skip(self))]
    pub fn request_approval(&mut self, id: RegistryId) -> Result<Registry, Error> {
        let (registry, ()) = self.apply(id, |registry, at| Ok(registry.request_approval(at)?))?;
        tracing::info!("Registry {id} is waiting for approval");
        Ok(registry)
    }

    /// Takes the document-level decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not `WaitingForApproval`.
    #[instrument(skip(self))]
    pub fn decide_registry(&mut self, id: RegistryId, outcome: Outcome) -> Result<Registry, Error> {
        let (registry, ()) = self.apply(id, |registry, at| Ok(registry.decide(outcome, at)?))?;
        tracing::info!("Registry {id} decided: {outcome}");
        Ok(registry)
    }

    /// Returns a submitted registry to `NotPublished`. Requirement statuses
    /// are left alone. Reopening a registry that was never submitted changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown id.
    #[instrument(skip(self))]
    pub fn reopen_registry(&mut self, id: RegistryId) -> Result<Registry, Error> {
        let mut registry = self.load(id)?;
        let at = self.tick();
        match registry.reopen(at) {
            Some(from) => {
                self.store.save(&registry)?;
                tracing::warn!("Reopened registry {id} (was {from})");
            }
            None => tracing::debug!("Registry {id} is not submitted, nothing to reopen"),
        }
        Ok(registry)
    }

    /// Copies a registry into a new, unsubmitted one.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown id.
    #[instrument(skip(self))]
    pub fn clone_registry(&mut self, id: RegistryId) -> Result<Registry, Error> {
        let source = self.load(id)?;
        let at = self.tick();
        let copy = source.duplicate(self.config.prefix(), at);
        self.store.save(&copy)?;
        tracing::info!("Cloned registry {id} into {}", copy.id());
        Ok(copy)
    }

    /// Appends a draft copy of a requirement to the same registry.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if either id is unknown.
    #[instrument(skip(self))]
    pub fn clone_requirement(
        &mut self,
        registry: RegistryId,
        requirement: &RequirementId,
    ) -> Result<Requirement, Error> {
        let prefix = self.config.prefix().clone();
        let (_, copy) = self.apply(registry, |r, at| {
            r.clone_requirement(requirement, &prefix, at).cloned()
        })?;
        tracing::info!("Cloned {requirement} into {}", copy.id());
        Ok(copy)
    }

    /// Renames a registry.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank name or
    /// [`NotFoundError`] for an unknown id.
    #[instrument(skip(self))]
    pub fn rename_registry(&mut self, id: RegistryId, name: &str) -> Result<Registry, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let (registry, ()) = self.apply(id, |registry, at| {
            registry.rename(name.to_string(), at);
            Ok(())
        })?;
        tracing::info!("Renamed registry {id} to '{name}'");
        Ok(registry)
    }

    /// Deletes a registry with its requirements and comments.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] for an unknown id.
    #[instrument(skip(self))]
    pub fn delete_registry(&mut self, id: RegistryId) -> Result<(), Error> {
        if !self.store.delete(id)? {
            return Err(NotFoundError::Registry(id).into());
        }
        tracing::info!("Deleted registry {id}");
        Ok(())
    }

    /// Adds a comment.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for blank text or author, an unknown
    /// registry or requirement, or a cell attribute the requirement lacks.
    #[instrument(skip(self, text))]
    pub fn add_comment(
        &mut self,
        target: CommentTarget,
        author: &str,
        text: &str,
    ) -> Result<Comment, Error> {
        let id = target.registry();
        let mut registry = self
            .store
            .get(id)?
            .ok_or(ValidationError::UnknownRegistry(id))?;
        let at = self.tick();
        let comment = Comment::new(target, author, text, at)?;
        registry.add_comment(comment.clone())?;
        self.store.save(&registry)?;
        tracing::info!("{} comment added to registry {id}", comment.level());
        Ok(comment)
    }

    /// Comments matching `query`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_comments(&self, query: &CommentQuery) -> Result<Vec<Comment>, Error> {
        let registries = match query.registry {
            Some(id) => self.store.get(id)?.into_iter().collect(),
            None => self.store.list()?,
        };
        let mut comments: Vec<_> = registries
            .iter()
            .flat_map(Registry::all_comments)
            .filter(|c| query.level.is_none_or(|level| c.level() == level))
            .filter(|c| {
                query
                    .requirement
                    .as_ref()
                    .is_none_or(|requirement| c.target().requirement() == Some(requirement))
            })
            .cloned()
            .collect();
        comments.sort_by_key(Comment::created_at);
        Ok(comments)
    }

    /// Merges `changes` into a requirement's attributes.
    ///
    /// Status and comments are untouched. Unless `skip_noop_updates` is
    /// switched off, an update that changes no value is not written.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if either id is unknown, or a
    /// [`ValidationError`] if a key is not declared in the configuration.
    #[instrument(skip(self, changes))]
    pub fn update_requirement_attributes(
        &mut self,
        registry: RegistryId,
        requirement: &RequirementId,
        changes: Attributes,
    ) -> Result<Requirement, Error> {
        if let Some(key) = changes
            .keys()
            .find(|key| !self.config.is_attribute_allowed(key))
        {
            return Err(ValidationError::UndeclaredAttribute(key.clone()).into());
        }

        let mut target = self.load(registry)?;
        let at = self.tick();
        let keys = target.update_attributes(
            requirement,
            changes,
            self.config.skip_noop_updates,
            at,
        )?;

        if keys.is_empty() {
            tracing::debug!("No attribute of {requirement} changed, skipping write");
        } else {
            self.store.save(&target)?;
            tracing::info!("Updated {} on {requirement}", keys.join(", "));
        }

        target.requirement(requirement).cloned().ok_or_else(|| {
            NotFoundError::Requirement {
                registry,
                requirement: requirement.clone(),
            }
            .into()
        })
    }

    /// Requirements whose attributes changed after their last decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn stale_decisions(&self) -> Result<Vec<StaleDecision>, Error> {
        Ok(self
            .store
            .list()?
            .iter()
            .flat_map(|registry| {
                registry
                    .requirements()
                    .iter()
                    .filter(|r| r.is_decision_stale())
                    .map(|r| StaleDecision {
                        registry: registry.id(),
                        registry_name: registry.name().to_string(),
                        requirement: r.id().clone(),
                    })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{
            InvalidTransitionError, RegistryStatus, RequirementStatus,
            history::Event,
        },
        storage::InMemoryStore,
    };

    fn row(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn workflow() -> Workflow<InMemoryStore> {
        Workflow::new(InMemoryStore::new(), Config::default())
    }

    fn req(s: &str) -> RequirementId {
        s.parse().unwrap()
    }

    fn reg_a(workflow: &mut Workflow<InMemoryStore>) -> RegistryId {
        workflow
            .import_registry(
                "Reg A",
                "alice",
                vec![row(&[("Country", "US")]), row(&[("Country", "DE")])],
            )
            .unwrap()
            .id()
    }

    /// Drives a draft requirement into `InQaQc`.
    fn into_qa(workflow: &mut Workflow<InMemoryStore>, id: RegistryId, requirement: &str) {
        workflow.submit_requirement(id, &req(requirement)).unwrap();
        workflow
            .assign_qa_reviewer(id, &req(requirement), "qa")
            .unwrap();
    }

    fn assert_registry_invariant(workflow: &Workflow<InMemoryStore>) {
        for registry in workflow.store().list().unwrap() {
            if !registry.submitted() {
                assert_eq!(registry.status(), RegistryStatus::NotPublished);
            }
        }
    }

    #[test]
    fn import_creates_draft_registry() {
        let mut workflow = workflow();
        let registry = workflow
            .import_registry(
                "Reg A",
                "alice",
                vec![row(&[("Country", "US")]), row(&[("Country", "DE")])],
            )
            .unwrap();

        assert_eq!(registry.name(), "Reg A");
        assert_eq!(registry.owner(), "alice");
        assert_eq!(registry.status(), RegistryStatus::NotPublished);
        assert!(!registry.submitted());
        let ids: Vec<_> = registry
            .requirements()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, ["REQ-001", "REQ-002"]);
        assert!(
            registry
                .requirements()
                .iter()
                .all(|r| r.status() == RequirementStatus::Draft && r.owner() == "alice")
        );
        assert_eq!(workflow.get_registry(registry.id()).unwrap(), registry);
    }

    #[test_case("  ", vec![row(&[("Country", "US")])], ImportError::EmptyName; "blank name")]
    #[test_case("Reg A", vec![], ImportError::NoRows; "no rows")]
    #[test_case("Reg A", vec![row(&[("Country", "US")]), row(&[])], ImportError::EmptyRow { row: 2 }; "empty row")]
    fn import_rejects_bad_input(name: &str, rows: Vec<Attributes>, expected: ImportError) {
        let mut workflow = workflow();
        let error = workflow.import_registry(name, "alice", rows).unwrap_err();
        assert!(matches!(error, Error::Import(e) if e == expected));
        assert!(workflow.store().list().unwrap().is_empty());
    }

    #[test]
    fn import_enforces_configured_schema() {
        let mut config = Config::default();
        config.require_attribute("Country");
        config.declare_attribute("Country");
        config.declare_attribute("Regulation");
        config.allow_unknown_attributes = false;
        let mut workflow = Workflow::new(InMemoryStore::new(), config);

        let missing = workflow
            .import_registry("Reg A", "alice", vec![row(&[("Regulation", "OSHA")])])
            .unwrap_err();
        assert!(matches!(
            missing,
            Error::Import(ImportError::MissingAttribute { row: 1, .. })
        ));

        let undeclared = workflow
            .import_registry(
                "Reg A",
                "alice",
                vec![row(&[("Country", "US"), ("Colour", "red")])],
            )
            .unwrap_err();
        assert!(matches!(
            undeclared,
            Error::Import(ImportError::UndeclaredAttribute { row: 1, ref attribute }) if attribute == "Colour"
        ));
    }

    #[test]
    fn configured_prefix_is_used_for_new_ids() {
        let config: Config = toml::from_str("_version = \"1\"\nprefix = \"ROW\"\n").unwrap();
        let mut workflow = Workflow::new(InMemoryStore::new(), config);
        let id = reg_a(&mut workflow);
        let registry = workflow.get_registry(id).unwrap();
        assert_eq!(registry.requirements()[0].id().to_string(), "ROW-001");

        let copy = workflow.clone_requirement(id, &req("ROW-002")).unwrap();
        assert_eq!(copy.id().to_string(), "ROW-003");
    }

    #[test]
    fn decide_on_draft_requirement_fails_until_it_reaches_qa() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let registry = workflow.submit_registry(id).unwrap();
        assert_eq!(registry.status(), RegistryStatus::InQaQc);
        assert!(registry.submitted());

        let error = workflow
            .decide(id, &req("REQ-001"), Outcome::Approve)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidTransition(_)));

        workflow.submit_requirement(id, &req("REQ-001")).unwrap();
        let error = workflow
            .decide(id, &req("REQ-001"), Outcome::Approve)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidTransition(_)));

        let in_qa = workflow
            .assign_qa_reviewer(id, &req("REQ-001"), "qa")
            .unwrap();
        assert_eq!(in_qa.status(), RequirementStatus::InQaQc);
        assert_eq!(in_qa.qa_user(), Some("qa"));

        let decided = workflow
            .decide(id, &req("REQ-001"), Outcome::Approve)
            .unwrap();
        assert_eq!(decided.status(), RequirementStatus::Approved);
        assert!(decided.decision().is_some());
    }

    #[test]
    fn submitting_a_registry_twice_fails_and_changes_nothing() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        workflow.submit_registry(id).unwrap();
        let before = workflow.get_registry(id).unwrap();

        let error = workflow.submit_registry(id).unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidTransition(InvalidTransitionError::Registry { .. })
        ));
        assert_eq!(workflow.get_registry(id).unwrap(), before);
    }

    #[test]
    fn reviewer_can_be_reassigned_but_not_after_decision() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let draft = workflow
            .assign_qa_reviewer(id, &req("REQ-002"), "qa1")
            .unwrap();
        assert_eq!(draft.status(), RequirementStatus::Draft);
        assert_eq!(draft.qa_user(), Some("qa1"));

        into_qa(&mut workflow, id, "REQ-001");
        let reassigned = workflow
            .assign_qa_reviewer(id, &req("REQ-001"), "qa2")
            .unwrap();
        assert_eq!(reassigned.status(), RequirementStatus::InQaQc);
        assert_eq!(reassigned.qa_user(), Some("qa2"));

        workflow
            .decide(id, &req("REQ-001"), Outcome::Reject)
            .unwrap();
        assert!(
            workflow
                .assign_qa_reviewer(id, &req("REQ-001"), "qa3")
                .is_err()
        );
    }

    #[test]
    fn statuses_only_move_forward_until_reopened() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let r1 = req("REQ-001");
        let mut observed = vec![workflow.get_requirement(id, &r1).unwrap().status()];

        observed.push(workflow.submit_requirement(id, &r1).unwrap().status());
        observed.push(workflow.assign_qa_reviewer(id, &r1, "qa").unwrap().status());
        // failed commands must not move the status
        assert!(workflow.submit_requirement(id, &r1).is_err());
        observed.push(workflow.get_requirement(id, &r1).unwrap().status());
        observed.push(workflow.decide(id, &r1, Outcome::Approve).unwrap().status());

        assert!(observed.windows(2).all(|w| w[0].rank() <= w[1].rank()));

        let reopened = workflow.reopen(id, &r1).unwrap();
        assert_eq!(reopened.status(), RequirementStatus::Draft);
        assert_eq!(reopened.qa_user(), None);
        assert!(reopened.decision().is_none());
    }

    #[test]
    fn full_registry_approval_round() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        workflow.submit_registry(id).unwrap();
        into_qa(&mut workflow, id, "REQ-001");
        into_qa(&mut workflow, id, "REQ-002");
        workflow
            .decide(id, &req("REQ-001"), Outcome::Approve)
            .unwrap();

        let error = workflow.request_approval(id).unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidTransition(InvalidTransitionError::PendingRequirements { pending: 1 })
        ));

        workflow
            .decide(id, &req("REQ-002"), Outcome::Reject)
            .unwrap();
        let waiting = workflow.request_approval(id).unwrap();
        assert_eq!(waiting.status(), RegistryStatus::WaitingForApproval);

        let approved = workflow.decide_registry(id, Outcome::Approve).unwrap();
        assert_eq!(approved.status(), RegistryStatus::Approved);

        assert!(workflow.decide_registry(id, Outcome::Reject).is_err());

        workflow.reopen(id, &req("REQ-002")).unwrap();
        assert_eq!(
            workflow.get_registry(id).unwrap().status(),
            RegistryStatus::InQaQc
        );
        assert_registry_invariant(&workflow);
    }

    #[test]
    fn reopen_registry_returns_to_draft() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);

        let untouched = workflow.reopen_registry(id).unwrap();
        assert_eq!(untouched.history().len(), 1);

        workflow.submit_registry(id).unwrap();
        workflow.submit_requirement(id, &req("REQ-001")).unwrap();
        let reopened = workflow.reopen_registry(id).unwrap();

        assert!(!reopened.submitted());
        assert_eq!(reopened.status(), RegistryStatus::NotPublished);
        assert_eq!(
            reopened.requirement(&req("REQ-001")).unwrap().status(),
            RequirementStatus::Submitted
        );
        assert!(workflow.submit_registry(id).is_ok());
        assert_registry_invariant(&workflow);
    }

    #[test]
    fn clone_registry_copies_rows_with_fresh_identity() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        workflow.submit_registry(id).unwrap();
        into_qa(&mut workflow, id, "REQ-001");
        workflow
            .add_comment(
                CommentTarget::Document { registry: id },
                "bob",
                "looks fine",
            )
            .unwrap();
        let source = workflow.get_registry(id).unwrap();

        let copy = workflow.clone_registry(id).unwrap();

        assert_ne!(copy.id(), source.id());
        assert_eq!(copy.name(), "Reg A (Clone)");
        assert!(!copy.submitted());
        assert_eq!(copy.status(), RegistryStatus::NotPublished);
        assert_eq!(copy.requirements().len(), source.requirements().len());
        for (a, b) in source.requirements().iter().zip(copy.requirements()) {
            assert_eq!(a.attributes(), b.attributes());
            assert_ne!(a.uuid(), b.uuid());
            assert!(source.requirement(b.id()).is_none());
            assert_eq!(b.status(), RequirementStatus::Draft);
            assert_eq!(b.qa_user(), None);
        }
        let ids: Vec<_> = copy
            .requirements()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, ["REQ-003", "REQ-004"]);
        assert_eq!(copy.all_comments().count(), 0);
        assert!(matches!(
            copy.history(),
            [entry] if entry.event == Event::ClonedFrom { source: id }
        ));
        // the source is untouched
        assert_eq!(workflow.get_registry(id).unwrap(), source);
        assert_eq!(workflow.store().list().unwrap().len(), 2);
    }

    #[test]
    fn clone_requirement_appends_draft_copy() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        into_qa(&mut workflow, id, "REQ-001");

        let copy = workflow.clone_requirement(id, &req("REQ-001")).unwrap();

        assert_eq!(copy.id().to_string(), "REQ-003");
        assert_eq!(copy.status(), RequirementStatus::Draft);
        assert_eq!(copy.attribute("Country"), Some("US"));
        assert_eq!(workflow.get_registry(id).unwrap().requirements().len(), 3);
    }

    #[test]
    fn cell_comment_on_missing_attribute_fails() {
        let mut workflow = workflow();
        let registry = workflow
            .import_registry("Reg A", "alice", vec![row(&[("Regulation", "OSHA")])])
            .unwrap()
            .id();

        let target = CommentTarget::from_parts(
            CommentLevel::Cell,
            registry,
            Some(req("REQ-001")),
            Some("Country".to_string()),
        )
        .unwrap();
        let error = workflow
            .add_comment(target, "bob", "check value")
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Validation(ValidationError::UnknownAttribute { .. })
        ));
        assert!(
            workflow
                .list_comments(&CommentQuery::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test_case("", "text", &ValidationError::EmptyAuthor; "empty author")]
    #[test_case("bob", "   ", &ValidationError::EmptyText; "blank text")]
    fn comment_input_is_validated(author: &str, text: &str, expected: &ValidationError) {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let error = workflow
            .add_comment(CommentTarget::Document { registry: id }, author, text)
            .unwrap_err();
        assert!(matches!(error, Error::Validation(ref e) if e == expected));
    }

    #[test]
    fn comments_on_unknown_targets_are_rejected() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);

        let unknown = RegistryId::new_v4();
        let error = workflow
            .add_comment(CommentTarget::Document { registry: unknown }, "bob", "hi")
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::UnknownRegistry(r)) if r == unknown
        ));

        let error = workflow
            .add_comment(
                CommentTarget::Row {
                    registry: id,
                    requirement: req("REQ-009"),
                },
                "bob",
                "hi",
            )
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::UnknownRequirement(_))
        ));
    }

    #[test]
    fn each_comment_grows_the_log_by_one_in_creation_order() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let targets = [
            CommentTarget::Row {
                registry: id,
                requirement: req("REQ-002"),
            },
            CommentTarget::Document { registry: id },
            CommentTarget::Cell {
                registry: id,
                requirement: req("REQ-001"),
                attribute: "Country".to_string(),
            },
            CommentTarget::Row {
                registry: id,
                requirement: req("REQ-001"),
            },
        ];

        let mut added = Vec::new();
        for (i, target) in targets.into_iter().enumerate() {
            let before = workflow.list_comments(&CommentQuery::default()).unwrap();
            let comment = workflow
                .add_comment(target, "bob", &format!("note {i}"))
                .unwrap();
            let after = workflow.list_comments(&CommentQuery::default()).unwrap();

            assert_eq!(after.len(), before.len() + 1);
            // existing comments are never touched
            assert_eq!(&after[..before.len()], &before[..]);
            added.push(comment);
        }

        let listed = workflow.list_comments(&CommentQuery::default()).unwrap();
        assert_eq!(listed, added);
        assert!(
            listed
                .windows(2)
                .all(|w| w[0].created_at() < w[1].created_at())
        );
    }

    #[test]
    fn list_comments_filters_by_level_registry_and_requirement() {
        let mut workflow = workflow();
        let a = reg_a(&mut workflow);
        let b = reg_a(&mut workflow);
        workflow
            .add_comment(CommentTarget::Document { registry: a }, "bob", "doc a")
            .unwrap();
        workflow
            .add_comment(
                CommentTarget::Row {
                    registry: a,
                    requirement: req("REQ-001"),
                },
                "bob",
                "row a1",
            )
            .unwrap();
        workflow
            .add_comment(
                CommentTarget::Row {
                    registry: b,
                    requirement: req("REQ-001"),
                },
                "bob",
                "row b1",
            )
            .unwrap();

        let texts = |query: CommentQuery| -> Vec<String> {
            workflow
                .list_comments(&query)
                .unwrap()
                .iter()
                .map(|c| c.text().to_string())
                .collect()
        };

        assert_eq!(
            texts(CommentQuery {
                level: Some(CommentLevel::Row),
                ..CommentQuery::default()
            }),
            ["row a1", "row b1"]
        );
        assert_eq!(
            texts(CommentQuery {
                registry: Some(a),
                ..CommentQuery::default()
            }),
            ["doc a", "row a1"]
        );
        assert_eq!(
            texts(CommentQuery {
                registry: Some(b),
                requirement: Some(req("REQ-001")),
                ..CommentQuery::default()
            }),
            ["row b1"]
        );
        assert_eq!(
            workflow.get_registry(a).unwrap().document_comment(),
            Some("doc a")
        );
    }

    #[test]
    fn update_merges_attributes_and_leaves_comments_alone() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        workflow
            .add_comment(
                CommentTarget::Row {
                    registry: id,
                    requirement: req("REQ-001"),
                },
                "bob",
                "keep me",
            )
            .unwrap();
        workflow.submit_requirement(id, &req("REQ-001")).unwrap();
        let comments = workflow.list_comments(&CommentQuery::default()).unwrap();

        let updated = workflow
            .update_requirement_attributes(id, &req("REQ-001"), row(&[("Jurisdiction", "Federal")]))
            .unwrap();

        assert_eq!(updated.attribute("Jurisdiction"), Some("Federal"));
        assert_eq!(updated.attribute("Country"), Some("US"));
        assert_eq!(updated.status(), RequirementStatus::Submitted);
        assert_eq!(
            workflow.list_comments(&CommentQuery::default()).unwrap(),
            comments
        );
    }

    #[test]
    fn noop_update_is_not_written() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let before = workflow.get_registry(id).unwrap();

        workflow
            .update_requirement_attributes(id, &req("REQ-001"), row(&[("Country", "US")]))
            .unwrap();
        workflow
            .update_requirement_attributes(id, &req("REQ-001"), Attributes::new())
            .unwrap();

        assert_eq!(workflow.get_registry(id).unwrap(), before);
    }

    #[test]
    fn noop_update_is_audited_when_skipping_is_disabled() {
        let mut config = Config::default();
        config.skip_noop_updates = false;
        let mut workflow = Workflow::new(InMemoryStore::new(), config);
        let id = reg_a(&mut workflow);

        workflow
            .update_requirement_attributes(id, &req("REQ-001"), row(&[("Country", "US")]))
            .unwrap();

        let history = workflow.get_registry(id).unwrap().history().to_vec();
        assert_eq!(
            history.last().map(|entry| &entry.event),
            Some(&Event::AttributesUpdated {
                keys: vec!["Country".to_string()]
            })
        );
    }

    #[test]
    fn update_rejects_undeclared_keys() {
        let mut config = Config::default();
        config.declare_attribute("Country");
        config.allow_unknown_attributes = false;
        let mut workflow = Workflow::new(InMemoryStore::new(), config);
        let id = reg_a(&mut workflow);

        let error = workflow
            .update_requirement_attributes(id, &req("REQ-001"), row(&[("Colour", "red")]))
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::UndeclaredAttribute(_))
        ));
    }

    #[test]
    fn editing_after_decision_marks_it_stale() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        into_qa(&mut workflow, id, "REQ-001");
        workflow
            .decide(id, &req("REQ-001"), Outcome::Approve)
            .unwrap();
        assert!(workflow.stale_decisions().unwrap().is_empty());

        workflow
            .update_requirement_attributes(id, &req("REQ-001"), row(&[("Country", "CA")]))
            .unwrap();

        let stale = workflow.stale_decisions().unwrap();
        assert_eq!(
            stale,
            vec![StaleDecision {
                registry: id,
                registry_name: "Reg A".to_string(),
                requirement: req("REQ-001"),
            }]
        );
    }

    #[test]
    fn rename_and_delete() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);

        assert!(matches!(
            workflow.rename_registry(id, " ").unwrap_err(),
            Error::Validation(ValidationError::EmptyName)
        ));
        let renamed = workflow.rename_registry(id, "Reg B").unwrap();
        assert_eq!(renamed.name(), "Reg B");

        workflow
            .add_comment(CommentTarget::Document { registry: id }, "bob", "bye")
            .unwrap();
        workflow.delete_registry(id).unwrap();

        assert!(matches!(
            workflow.get_registry(id).unwrap_err(),
            Error::NotFound(NotFoundError::Registry(_))
        ));
        assert!(
            workflow
                .list_comments(&CommentQuery::default())
                .unwrap()
                .is_empty()
        );
        assert!(workflow.delete_registry(id).is_err());
    }

    #[test]
    fn blank_reviewer_is_rejected() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        workflow.submit_requirement(id, &req("REQ-001")).unwrap();
        let before = workflow.get_registry(id).unwrap();

        assert!(matches!(
            workflow
                .assign_qa_reviewer(id, &req("REQ-001"), "  ")
                .unwrap_err(),
            Error::Validation(ValidationError::EmptyReviewer)
        ));
        assert_eq!(workflow.get_registry(id).unwrap(), before);
    }

    #[test]
    fn failed_import_leaves_directory_store_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = crate::storage::DirectoryStore::open(tmp.path()).unwrap();
        std::fs::create_dir(tmp.path().join("index.yaml")).unwrap();
        let mut workflow = Workflow::new(store, Config::default());

        assert!(
            workflow
                .import_registry("Reg A", "alice", vec![row(&[("Country", "US")])])
                .is_err()
        );
        assert_eq!(
            std::fs::read_dir(tmp.path().join("registries"))
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn unknown_requirement_is_not_found() {
        let mut workflow = workflow();
        let id = reg_a(&mut workflow);
        let error = workflow
            .submit_requirement(id, &req("REQ-042"))
            .unwrap_err();
        assert!(matches!(
            error,
            Error::NotFound(NotFoundError::Requirement { .. })
        ));
    }

    #[test]
    fn listing_and_flattening() {
        let mut workflow = workflow();
        reg_a(&mut workflow);
        workflow
            .import_registry("Reg JP", "bob", vec![row(&[("Country", "JP")])])
            .unwrap();

        let filter = RegistryFilter {
            owner: Some("bob".to_string()),
            ..RegistryFilter::default()
        };
        let summaries = workflow.list_registries(&filter).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "Reg JP");
        assert_eq!(summaries[0].requirement_count, 1);

        let all = workflow
            .find_registries(&RegistryFilter::default())
            .unwrap();
        let rows = Workflow::<InMemoryStore>::flatten_requirements(&all);
        let names: Vec<_> = rows.iter().map(|r| r.registry_name.as_str()).collect();
        assert_eq!(names, ["Reg A", "Reg A", "Reg JP"]);
    }
}
