//! The enforcer: model, policy state, role graphs, environment, adapter.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use turnstile_matcher::{Environment, EvalResult, Value};
use turnstile_model::{Model, Policy, RoleArity};
use turnstile_roles::{RoleGroup, stub_2, stub_3};

use crate::adapter::{Adapter, PolicyFilter, PolicyRecord};
use crate::builtins;
use crate::csv;
use crate::file::FileAdapter;
use crate::mapping::MappingPolicy;
use crate::{AdapterError, EnforcerError, EnforcerResult};

/// An access-control enforcer.
///
/// Owns the validated [`Model`], the mutable policy and mapping-policy
/// sets, one [`RoleGroup`] per declared role mapping, the matcher
/// environment (role stubs, built-ins, user functions), and the
/// persistence adapter. Plain data with no interior locking: share it
/// immutably, or serialize mutations externally; the [`crate::registry`]
/// module does exactly that.
pub struct Enforcer {
    model: Model,
    policies: Vec<Policy>,
    mapping_policies: Vec<MappingPolicy>,
    role_groups: HashMap<String, RoleGroup>,
    env: Environment,
    adapter: Box<dyn Adapter>,
}

impl std::fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enforcer")
            .field("policies", &self.policies.len())
            .field("mapping_policies", &self.mapping_policies.len())
            .field("role_groups", &self.role_groups.len())
            .field("env_entries", &self.env.len())
            .finish_non_exhaustive()
    }
}

impl Enforcer {
    /// Loads a model file and builds an enforcer around it.
    ///
    /// Without an adapter, a read-only [`FileAdapter`] with no backing file
    /// is installed; loads against it fail until a policy file or a real
    /// adapter is provided.
    ///
    /// # Errors
    ///
    /// Propagates model loading and validation failures.
    pub async fn new(
        config_path: impl AsRef<Path>,
        adapter: Option<Box<dyn Adapter>>,
    ) -> EnforcerResult<Self> {
        let model = Model::from_file(config_path).await?;
        Ok(Self::with_model(model, adapter))
    }

    /// Builds an enforcer around an already-validated model.
    #[must_use]
    pub fn with_model(model: Model, adapter: Option<Box<dyn Adapter>>) -> Self {
        let adapter = adapter.unwrap_or_else(|| Box::new(FileAdapter::unbacked()));
        let mut enforcer = Self {
            model,
            policies: Vec::new(),
            mapping_policies: Vec::new(),
            role_groups: HashMap::new(),
            env: Environment::new(),
            adapter,
        };
        enforcer.reset_configuration();
        enforcer
    }

    /// Returns the model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Returns the stored policies, most recently added first.
    #[must_use]
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Returns the stored mapping policies in insertion order.
    #[must_use]
    pub fn mapping_policies(&self) -> &[MappingPolicy] {
        &self.mapping_policies
    }

    /// Returns the role graph for a declared mapping name.
    #[must_use]
    pub fn role_group(&self, name: &str) -> Option<&RoleGroup> {
        self.role_groups.get(name)
    }

    /// Returns the current adapter.
    #[must_use]
    pub fn adapter(&self) -> &dyn Adapter {
        &*self.adapter
    }

    /// Drops all policies, mapping policies, and role-graph edges, and
    /// rebuilds the environment from the model: one role stub per declared
    /// mapping, then the built-ins on top. On a name collision the built-in
    /// wins, so a role mapping named `regexMatch` loses its stub.
    pub fn reset_configuration(&mut self) {
        self.policies.clear();
        self.mapping_policies.clear();
        self.env.clear();

        let names: Vec<String> = self
            .model
            .role_mappings()
            .iter()
            .map(|m| m.name().to_owned())
            .collect();
        self.role_groups = names
            .iter()
            .map(|name| (name.clone(), RoleGroup::new(name.clone())))
            .collect();
        for name in &names {
            self.refresh_role_stub(name);
        }
        builtins::install(&mut self.env);
    }

    /// Registers a user-defined matcher function, replacing any existing
    /// entry of that name.
    pub fn add_fun<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.env.insert(name.into(), Value::function(f));
    }

    /// Replaces the persistence adapter.
    pub fn set_persist_adapter(&mut self, adapter: Box<dyn Adapter>) {
        self.adapter = adapter;
    }

    /// Decides whether a request is allowed.
    ///
    /// A request that fails validation does not match anything; matcher
    /// evaluation errors disqualify the policy at hand, not the decision.
    pub fn enforce<I>(&self, request: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = request.into_iter().map(Into::into).collect();
        let request = match self.model.create_request(values) {
            Ok(request) => request,
            Err(err) => {
                debug!(%err, "request rejected; denying");
                return false;
            }
        };

        let mut matched = Vec::new();
        for policy in &self.policies {
            match self.model.matches(&request, policy, &self.env) {
                Ok(true) => matched.push(policy),
                Ok(false) => {}
                Err(err) => {
                    debug!(%err, policy_key = policy.key(), "matcher evaluation failed; treating as non-match");
                }
            }
        }

        let decision = self.model.allow(matched);
        debug!(decision, "enforce");
        decision
    }

    /// Adds a policy rule.
    ///
    /// The in-memory set is updated before the adapter persists; if the
    /// adapter then fails, memory is ahead of storage until the caller
    /// reloads.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::AlreadyExisted`] when the rule is
    /// structurally present, plus validation and adapter failures.
    pub async fn add_policy(&mut self, key: &str, values: Vec<Value>) -> EnforcerResult<()> {
        let policy = self.model.create_policy(key, values)?;
        if self.policies.contains(&policy) {
            return Err(EnforcerError::AlreadyExisted);
        }
        let record = policy_record(&policy);
        self.policies.insert(0, policy);
        self.adapter.add_policy(&record).await?;
        Ok(())
    }

    /// Removes a policy rule and every structural duplicate of it.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::Nonexistent`] when the rule is absent, plus
    /// validation and adapter failures.
    pub async fn remove_policy(&mut self, key: &str, values: Vec<Value>) -> EnforcerResult<()> {
        let policy = self.model.create_policy(key, values)?;
        if !self.policies.contains(&policy) {
            return Err(EnforcerError::Nonexistent);
        }
        self.adapter.remove_policy(&policy_record(&policy)).await?;
        self.policies.retain(|stored| *stored != policy);
        Ok(())
    }

    /// Removes every policy whose key equals `key` and whose values,
    /// starting at the zero-based attribute index `idx`, equal `values`.
    ///
    /// # Errors
    ///
    /// Propagates adapter failures.
    pub async fn remove_filtered_policy(
        &mut self,
        key: &str,
        idx: usize,
        values: &[String],
    ) -> EnforcerResult<()> {
        self.adapter.remove_filtered_policy(key, idx, values).await?;
        let before = self.policies.len();
        self.policies
            .retain(|policy| !filtered_policy_match(policy, key, idx, values));
        debug!(removed = before - self.policies.len(), key, "filtered policy removal");
        Ok(())
    }

    /// Returns the policies matching every criterion. A criterion pairs an
    /// attribute name with a required value; the pseudo-attribute `key`
    /// matches the policy key. No criteria returns everything.
    #[must_use]
    pub fn list_policies(&self, criteria: &[(&str, &str)]) -> Vec<&Policy> {
        self.policies
            .iter()
            .filter(|policy| {
                criteria.iter().all(|(attr, value)| {
                    if *attr == "key" {
                        return policy.key() == *value;
                    }
                    policy
                        .attrs()
                        .iter()
                        .find(|(name, _)| name == attr)
                        .is_some_and(|(_, v)| v.to_string() == *value)
                })
            })
            .collect()
    }

    /// Adds a role-mapping policy: records the tuple, adds the inheritance
    /// edge, refreshes the matcher stub, and persists.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::MappingNotFound`] for an undeclared name,
    /// [`EnforcerError::InvalidMapping`] on an arity mismatch with the
    /// declaration, [`EnforcerError::AlreadyExisted`] on a duplicate, plus
    /// adapter failures.
    pub async fn add_mapping_policy(&mut self, mapping: MappingPolicy) -> EnforcerResult<()> {
        self.check_mapping(&mapping)?;
        if self.mapping_policies.contains(&mapping) {
            return Err(EnforcerError::AlreadyExisted);
        }

        if let Some(group) = self.role_groups.get_mut(mapping.name()) {
            group.add_inheritance(mapping.edge_source(), mapping.edge_target());
        }
        let record = mapping.to_record();
        let name = mapping.name().to_owned();
        self.mapping_policies.push(mapping);
        self.refresh_role_stub(&name);
        self.adapter.add_policy(&record).await?;
        Ok(())
    }

    /// Removes a role-mapping policy: drops the edge and the tuple,
    /// refreshes the matcher stub, and persists.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::Nonexistent`] when the tuple is absent,
    /// plus the same failures as [`Enforcer::add_mapping_policy`].
    pub async fn remove_mapping_policy(&mut self, mapping: MappingPolicy) -> EnforcerResult<()> {
        self.check_mapping(&mapping)?;
        if !self.mapping_policies.contains(&mapping) {
            return Err(EnforcerError::Nonexistent);
        }

        if let Some(group) = self.role_groups.get_mut(mapping.name()) {
            group.remove_inheritance(&mapping.edge_source(), &mapping.edge_target());
        }
        self.mapping_policies.retain(|stored| *stored != mapping);
        self.refresh_role_stub(mapping.name());
        self.adapter.remove_policy(&mapping.to_record()).await?;
        Ok(())
    }

    /// Returns the mapping policies matching every criterion. Recognized
    /// attributes: `name`, `child`, `parent`, `domain`.
    #[must_use]
    pub fn list_mapping_policies(&self, criteria: &[(&str, &str)]) -> Vec<&MappingPolicy> {
        self.mapping_policies
            .iter()
            .filter(|mapping| {
                criteria.iter().all(|(attr, value)| match *attr {
                    "name" => mapping.name() == *value,
                    "child" => mapping.child() == *value,
                    "parent" => mapping.parent() == *value,
                    "domain" => mapping.domain() == Some(*value),
                    _ => false,
                })
            })
            .collect()
    }

    /// Roles `user` holds directly in the given mapping. For
    /// domain-qualified mappings the identifiers are the raw graph keys,
    /// domain included.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::MappingNotFound`] for an undeclared name.
    pub fn roles_for_user(&self, name: &str, user: &str) -> EnforcerResult<Vec<String>> {
        let group = self.named_group(name)?;
        Ok(group
            .direct_parents(user)
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    /// Users that hold `role` directly in the given mapping.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::MappingNotFound`] for an undeclared name.
    pub fn users_for_role(&self, name: &str, role: &str) -> EnforcerResult<Vec<String>> {
        let group = self.named_group(name)?;
        Ok(group
            .direct_children(role)
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    /// True iff `user` holds `role` in the given mapping, directly or
    /// through the inheritance chain.
    ///
    /// # Errors
    ///
    /// Returns [`EnforcerError::MappingNotFound`] for an undeclared name.
    pub fn has_role_for_user(&self, name: &str, user: &str, role: &str) -> EnforcerResult<bool> {
        let group = self.named_group(name)?;
        Ok(group.has_inheritance(user, role))
    }

    /// Adds several rules under one key with all-or-nothing duplicate
    /// semantics: if any rule is already present, nothing is added.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Enforcer::add_policy`].
    pub async fn add_policies(
        &mut self,
        key: &str,
        rows: Vec<Vec<Value>>,
    ) -> EnforcerResult<()> {
        let mut batch = Vec::with_capacity(rows.len());
        for values in rows {
            let policy = self.model.create_policy(key, values)?;
            if self.policies.contains(&policy) || batch.contains(&policy) {
                return Err(EnforcerError::AlreadyExisted);
            }
            batch.push(policy);
        }
        for policy in batch {
            let record = policy_record(&policy);
            self.policies.insert(0, policy);
            self.adapter.add_policy(&record).await?;
        }
        Ok(())
    }

    /// Removes several rules under one key with all-or-nothing semantics:
    /// if any rule is absent, nothing is removed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Enforcer::remove_policy`].
    pub async fn remove_policies(
        &mut self,
        key: &str,
        rows: Vec<Vec<Value>>,
    ) -> EnforcerResult<()> {
        let mut batch = Vec::with_capacity(rows.len());
        for values in rows {
            let policy = self.model.create_policy(key, values)?;
            if !self.policies.contains(&policy) {
                return Err(EnforcerError::Nonexistent);
            }
            batch.push(policy);
        }
        for policy in batch {
            self.adapter.remove_policy(&policy_record(&policy)).await?;
            self.policies.retain(|stored| *stored != policy);
        }
        Ok(())
    }

    fn named_group(&self, name: &str) -> EnforcerResult<&RoleGroup> {
        self.role_groups
            .get(name)
            .ok_or_else(|| EnforcerError::MappingNotFound {
                name: name.to_owned(),
            })
    }

    /// Replaces the in-memory policy set from the adapter. Records whose
    /// first field is not a declared policy key are skipped.
    ///
    /// # Errors
    ///
    /// Propagates adapter failures (including
    /// [`AdapterError::NoPolicySource`] when neither an adapter nor a
    /// policy file was configured) and validation failures on records with
    /// a known key.
    pub async fn load_policies(&mut self) -> EnforcerResult<()> {
        let records = self.adapter.load_policies().await?;
        self.replace_policies(records)
    }

    /// Points the enforcer at a CSV policy file (installing a read-only
    /// file adapter) and loads it.
    ///
    /// # Errors
    ///
    /// Same failures as [`Enforcer::load_policies`].
    pub async fn load_policies_from_file(&mut self, path: impl Into<std::path::PathBuf>) -> EnforcerResult<()> {
        self.adapter = Box::new(FileAdapter::new(path));
        self.load_policies().await
    }

    /// Replaces the in-memory policy set from the adapter, restricted by
    /// `filter`.
    ///
    /// # Errors
    ///
    /// Same failures as [`Enforcer::load_policies`].
    pub async fn load_filtered_policies(&mut self, filter: &PolicyFilter) -> EnforcerResult<()> {
        let records = self.adapter.load_filtered_policies(filter).await?;
        self.replace_policies(records)
    }

    /// Appends mapping policies from the adapter. Records whose first field
    /// is not a declared role-mapping name are skipped; duplicates are
    /// silently ignored.
    ///
    /// # Errors
    ///
    /// Propagates adapter failures and arity mismatches.
    pub async fn load_mapping_policies(&mut self) -> EnforcerResult<()> {
        let records = self.adapter.load_policies().await?;
        self.append_mapping_policies(records)
    }

    /// Appends mapping policies from a CSV file without touching the
    /// configured adapter.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures and arity mismatches.
    pub async fn load_mapping_policies_from_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> EnforcerResult<()> {
        let text = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(AdapterError::from)?;
        self.append_mapping_policies(csv::parse(&text))
    }

    /// Hands the whole state, mapping policies first and then policies, to
    /// the adapter as a bulk replace.
    ///
    /// # Errors
    ///
    /// Propagates adapter failures.
    pub async fn save_policies(&mut self) -> EnforcerResult<()> {
        let mut records: Vec<PolicyRecord> = self
            .mapping_policies
            .iter()
            .map(MappingPolicy::to_record)
            .collect();
        records.extend(self.policies.iter().map(policy_record));
        self.adapter.save_policies(&records).await?;
        info!(records = records.len(), "policies saved");
        Ok(())
    }

    fn check_mapping(&self, mapping: &MappingPolicy) -> EnforcerResult<()> {
        let Some(declared) = self.model.role_mapping(mapping.name()) else {
            return Err(EnforcerError::MappingNotFound {
                name: mapping.name().to_owned(),
            });
        };
        if mapping.value_count() != declared.arity().arg_count() {
            return Err(EnforcerError::InvalidMapping);
        }
        Ok(())
    }

    fn replace_policies(&mut self, records: Vec<PolicyRecord>) -> EnforcerResult<()> {
        let mut policies: Vec<Policy> = Vec::new();
        for record in records {
            let Some((key, values)) = record.split_first() else {
                continue;
            };
            if !self.model.has_policy_key(key) {
                continue;
            }
            let values = values.iter().map(|v| Value::from(v.as_str())).collect();
            let policy = self.model.create_policy(key, values)?;
            if !policies.contains(&policy) {
                policies.push(policy);
            }
        }
        info!(policies = policies.len(), "policy set loaded");
        self.policies = policies;
        Ok(())
    }

    fn append_mapping_policies(&mut self, records: Vec<PolicyRecord>) -> EnforcerResult<()> {
        let mut appended = 0usize;
        for record in records {
            let Some((name, values)) = record.split_first() else {
                continue;
            };
            let Some(declared) = self.model.role_mapping(name) else {
                continue;
            };
            let mapping = match (declared.arity(), values) {
                (RoleArity::Two, [child, parent]) => MappingPolicy::new(name, child, parent),
                (RoleArity::Three, [child, parent, domain]) => {
                    MappingPolicy::with_domain(name, child, parent, domain)
                }
                _ => {
                    warn!(name, fields = values.len(), "mapping record arity mismatch");
                    return Err(EnforcerError::InvalidMapping);
                }
            };
            if self.mapping_policies.contains(&mapping) {
                continue;
            }
            if let Some(group) = self.role_groups.get_mut(mapping.name()) {
                group.add_inheritance(mapping.edge_source(), mapping.edge_target());
            }
            self.mapping_policies.push(mapping);
            appended += 1;
        }

        let names: Vec<String> = self
            .model
            .role_mappings()
            .iter()
            .map(|m| m.name().to_owned())
            .collect();
        for name in &names {
            self.refresh_role_stub(name);
        }
        info!(appended, "mapping policies loaded");
        Ok(())
    }

    /// Reinstalls the matcher stub for one role mapping over a fresh graph
    /// snapshot. Skipped for names shadowed by a built-in.
    fn refresh_role_stub(&mut self, name: &str) {
        if builtins::NAMES.contains(&name) {
            return;
        }
        let Some(mapping) = self.model.role_mapping(name) else {
            return;
        };
        let Some(group) = self.role_groups.get(name) else {
            return;
        };
        let snapshot = Arc::new(group.clone());
        let stub = match mapping.arity() {
            RoleArity::Two => stub_2(snapshot),
            RoleArity::Three => stub_3(snapshot),
        };
        self.env.insert(name.to_owned(), stub);
    }
}

/// Renders a policy as an adapter record. A trailing default `"allow"` is
/// omitted, matching the usual policy file shape.
fn policy_record(policy: &Policy) -> PolicyRecord {
    let mut record = vec![policy.key().to_owned()];
    let attrs = policy.attrs();
    for (i, (name, value)) in attrs.iter().enumerate() {
        if i + 1 == attrs.len() && name == "eft" && value.as_str() == Some("allow") {
            continue;
        }
        record.push(value.to_string());
    }
    record
}

fn filtered_policy_match(policy: &Policy, key: &str, idx: usize, values: &[String]) -> bool {
    if policy.key() != key {
        return false;
    }
    let attrs = policy.attrs();
    let Some(slice) = attrs.get(idx..idx + values.len()) else {
        return false;
    };
    slice
        .iter()
        .zip(values)
        .all(|((_, stored), wanted)| stored.to_string() == *wanted)
}
