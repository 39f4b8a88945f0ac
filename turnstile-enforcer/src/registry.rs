//! Named enforcer instances.
//!
//! An [`EnforcerHandle`] wraps an [`Enforcer`] in a dedicated task that
//! drains a command queue, so every operation on one named instance is
//! strictly serialized (FIFO) and runs to completion before the next
//! starts. Handles are cheap to clone and hand out across request
//! handlers.
//!
//! Two construction variants:
//!
//! - [`EnforcerHandle::shared`] caches instances per name in a
//!   process-wide registry; the first construction initializes, later ones
//!   reuse the live instance. Intended for production.
//! - [`EnforcerHandle::isolated`] always builds a fresh instance and never
//!   touches the registry. Intended for concurrent test suites, where
//!   cross-test state sharing is a defect.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use turnstile_matcher::{NativeFn, Value};
use turnstile_model::Policy;

use crate::adapter::{Adapter, PolicyFilter};
use crate::enforcer::Enforcer;
use crate::mapping::MappingPolicy;
use crate::{EnforcerError, EnforcerResult};

/// Result alias for named-instance operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by named-instance operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The instance's task has stopped and can take no more commands.
    #[error("enforcer instance `{name}` is closed")]
    Closed {
        /// Name of the closed instance.
        name: String,
    },
    /// The operation itself failed inside the instance.
    #[error(transparent)]
    Enforcer(#[from] EnforcerError),
}

static SHARED: Lazy<RwLock<HashMap<String, EnforcerHandle>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Enforce {
        request: Vec<Value>,
        reply: Reply<bool>,
    },
    AddPolicy {
        key: String,
        values: Vec<Value>,
        reply: Reply<EnforcerResult<()>>,
    },
    RemovePolicy {
        key: String,
        values: Vec<Value>,
        reply: Reply<EnforcerResult<()>>,
    },
    RemoveFilteredPolicy {
        key: String,
        idx: usize,
        values: Vec<String>,
        reply: Reply<EnforcerResult<()>>,
    },
    ListPolicies {
        criteria: Vec<(String, String)>,
        reply: Reply<Vec<Policy>>,
    },
    AddMappingPolicy {
        mapping: MappingPolicy,
        reply: Reply<EnforcerResult<()>>,
    },
    RemoveMappingPolicy {
        mapping: MappingPolicy,
        reply: Reply<EnforcerResult<()>>,
    },
    ListMappingPolicies {
        criteria: Vec<(String, String)>,
        reply: Reply<Vec<MappingPolicy>>,
    },
    LoadPolicies {
        reply: Reply<EnforcerResult<()>>,
    },
    LoadPoliciesFromFile {
        path: PathBuf,
        reply: Reply<EnforcerResult<()>>,
    },
    LoadFilteredPolicies {
        filter: PolicyFilter,
        reply: Reply<EnforcerResult<()>>,
    },
    LoadMappingPolicies {
        reply: Reply<EnforcerResult<()>>,
    },
    LoadMappingPoliciesFromFile {
        path: PathBuf,
        reply: Reply<EnforcerResult<()>>,
    },
    SavePolicies {
        reply: Reply<EnforcerResult<()>>,
    },
    SetPersistAdapter {
        adapter: Box<dyn Adapter>,
        reply: Reply<()>,
    },
    AddFun {
        name: String,
        function: NativeFn,
        reply: Reply<()>,
    },
    ResetConfiguration {
        reply: Reply<()>,
    },
}

/// Client handle to a named enforcer instance.
#[derive(Clone)]
pub struct EnforcerHandle {
    name: Arc<str>,
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for EnforcerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnforcerHandle")
            .field("name", &self.name)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl EnforcerHandle {
    /// Returns or creates the shared instance registered under `name`.
    ///
    /// The first call for a name loads the model and spawns the instance;
    /// concurrent and later calls reuse it, ignoring their `config_path`
    /// and `adapter` arguments.
    ///
    /// # Errors
    ///
    /// Propagates model loading failures from the initial construction.
    pub async fn shared(
        name: &str,
        config_path: impl AsRef<Path>,
        adapter: Option<Box<dyn Adapter>>,
    ) -> RegistryResult<Self> {
        if let Some(handle) = lookup_shared(name) {
            return Ok(handle);
        }

        let handle = Self::isolated(name, config_path, adapter).await?;

        let mut registry = SHARED.write().expect("shared enforcer registry poisoned");
        if let Some(existing) = registry.get(name) {
            // Someone else won the construction race; reuse theirs and let
            // ours shut down when this handle drops.
            if !existing.tx.is_closed() {
                return Ok(existing.clone());
            }
        }
        registry.insert(name.to_owned(), handle.clone());
        Ok(handle)
    }

    /// Creates a fresh, unregistered instance named `name`.
    ///
    /// # Errors
    ///
    /// Propagates model loading failures.
    pub async fn isolated(
        name: &str,
        config_path: impl AsRef<Path>,
        adapter: Option<Box<dyn Adapter>>,
    ) -> RegistryResult<Self> {
        let enforcer = Enforcer::new(config_path, adapter).await?;
        Ok(Self::spawn(name, enforcer))
    }

    /// Wraps an existing enforcer value in a dedicated task.
    #[must_use]
    pub fn spawn(name: &str, mut enforcer: Enforcer) -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(32);
        let name: Arc<str> = Arc::from(name);
        let instance = Arc::clone(&name);

        tokio::spawn(async move {
            info!(instance = %instance, "enforcer instance started");
            while let Some(command) = rx.recv().await {
                handle_command(&mut enforcer, command).await;
            }
            info!(instance = %instance, "enforcer instance stopped");
        });

        Self { name, tx }
    }

    /// Returns the instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decides whether a request is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped.
    pub async fn enforce<I>(&self, request: I) -> RegistryResult<bool>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let request = request.into_iter().map(Into::into).collect();
        self.roundtrip(|reply| Command::Enforce { request, reply })
            .await
    }

    /// Adds a policy rule.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped and
    /// propagates the enforcer's own failures.
    pub async fn add_policy(&self, key: &str, values: Vec<Value>) -> RegistryResult<()> {
        let key = key.to_owned();
        self.roundtrip(|reply| Command::AddPolicy { key, values, reply })
            .await??;
        Ok(())
    }

    /// Removes a policy rule.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn remove_policy(&self, key: &str, values: Vec<Value>) -> RegistryResult<()> {
        let key = key.to_owned();
        self.roundtrip(|reply| Command::RemovePolicy { key, values, reply })
            .await??;
        Ok(())
    }

    /// Removes policies matching a value slice.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn remove_filtered_policy(
        &self,
        key: &str,
        idx: usize,
        values: Vec<String>,
    ) -> RegistryResult<()> {
        let key = key.to_owned();
        self.roundtrip(|reply| Command::RemoveFilteredPolicy {
            key,
            idx,
            values,
            reply,
        })
        .await??;
        Ok(())
    }

    /// Lists policies matching the criteria.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped.
    pub async fn list_policies(
        &self,
        criteria: Vec<(String, String)>,
    ) -> RegistryResult<Vec<Policy>> {
        self.roundtrip(|reply| Command::ListPolicies { criteria, reply })
            .await
    }

    /// Adds a role-mapping policy.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn add_mapping_policy(&self, mapping: MappingPolicy) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::AddMappingPolicy { mapping, reply })
            .await??;
        Ok(())
    }

    /// Removes a role-mapping policy.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn remove_mapping_policy(&self, mapping: MappingPolicy) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::RemoveMappingPolicy { mapping, reply })
            .await??;
        Ok(())
    }

    /// Lists mapping policies matching the criteria.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped.
    pub async fn list_mapping_policies(
        &self,
        criteria: Vec<(String, String)>,
    ) -> RegistryResult<Vec<MappingPolicy>> {
        self.roundtrip(|reply| Command::ListMappingPolicies { criteria, reply })
            .await
    }

    /// Reloads policies from the adapter.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn load_policies(&self) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::LoadPolicies { reply }).await??;
        Ok(())
    }

    /// Points the instance at a policy file and loads it.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn load_policies_from_file(&self, path: impl Into<PathBuf>) -> RegistryResult<()> {
        let path = path.into();
        self.roundtrip(|reply| Command::LoadPoliciesFromFile { path, reply })
            .await??;
        Ok(())
    }

    /// Reloads a filtered policy subset from the adapter.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn load_filtered_policies(&self, filter: PolicyFilter) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::LoadFilteredPolicies { filter, reply })
            .await??;
        Ok(())
    }

    /// Loads mapping policies from the adapter.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn load_mapping_policies(&self) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::LoadMappingPolicies { reply })
            .await??;
        Ok(())
    }

    /// Loads mapping policies from a CSV file.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn load_mapping_policies_from_file(
        &self,
        path: impl Into<PathBuf>,
    ) -> RegistryResult<()> {
        let path = path.into();
        self.roundtrip(|reply| Command::LoadMappingPoliciesFromFile { path, reply })
            .await??;
        Ok(())
    }

    /// Saves the instance state through the adapter.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EnforcerHandle::add_policy`].
    pub async fn save_policies(&self) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::SavePolicies { reply }).await??;
        Ok(())
    }

    /// Replaces the instance's persistence adapter.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped.
    pub async fn set_persist_adapter(&self, adapter: Box<dyn Adapter>) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::SetPersistAdapter { adapter, reply })
            .await
    }

    /// Registers a user-defined matcher function on the instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped.
    pub async fn add_fun(&self, name: &str, function: NativeFn) -> RegistryResult<()> {
        let name = name.to_owned();
        self.roundtrip(|reply| Command::AddFun {
            name,
            function,
            reply,
        })
        .await
    }

    /// Resets the instance to its post-construction state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Closed`] when the instance has stopped.
    pub async fn reset_configuration(&self) -> RegistryResult<()> {
        self.roundtrip(|reply| Command::ResetConfiguration { reply })
            .await
    }

    fn closed(&self) -> RegistryError {
        RegistryError::Closed {
            name: self.name.to_string(),
        }
    }

    async fn roundtrip<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> RegistryResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }
}

/// Drops the shared registration for `name`, letting the instance stop
/// once the last outside handle is gone.
pub fn remove_shared(name: &str) {
    SHARED
        .write()
        .expect("shared enforcer registry poisoned")
        .remove(name);
}

fn lookup_shared(name: &str) -> Option<EnforcerHandle> {
    let registry = SHARED.read().expect("shared enforcer registry poisoned");
    registry
        .get(name)
        .filter(|handle| !handle.tx.is_closed())
        .cloned()
}

async fn handle_command(enforcer: &mut Enforcer, command: Command) {
    match command {
        Command::Enforce { request, reply } => {
            let _ = reply.send(enforcer.enforce(request));
        }
        Command::AddPolicy { key, values, reply } => {
            let _ = reply.send(enforcer.add_policy(&key, values).await);
        }
        Command::RemovePolicy { key, values, reply } => {
            let _ = reply.send(enforcer.remove_policy(&key, values).await);
        }
        Command::RemoveFilteredPolicy {
            key,
            idx,
            values,
            reply,
        } => {
            let _ = reply.send(enforcer.remove_filtered_policy(&key, idx, &values).await);
        }
        Command::ListPolicies { criteria, reply } => {
            let criteria: Vec<(&str, &str)> = criteria
                .iter()
                .map(|(a, v)| (a.as_str(), v.as_str()))
                .collect();
            let policies = enforcer
                .list_policies(&criteria)
                .into_iter()
                .cloned()
                .collect();
            let _ = reply.send(policies);
        }
        Command::AddMappingPolicy { mapping, reply } => {
            let _ = reply.send(enforcer.add_mapping_policy(mapping).await);
        }
        Command::RemoveMappingPolicy { mapping, reply } => {
            let _ = reply.send(enforcer.remove_mapping_policy(mapping).await);
        }
        Command::ListMappingPolicies { criteria, reply } => {
            let criteria: Vec<(&str, &str)> = criteria
                .iter()
                .map(|(a, v)| (a.as_str(), v.as_str()))
                .collect();
            let mappings = enforcer
                .list_mapping_policies(&criteria)
                .into_iter()
                .cloned()
                .collect();
            let _ = reply.send(mappings);
        }
        Command::LoadPolicies { reply } => {
            let _ = reply.send(enforcer.load_policies().await);
        }
        Command::LoadPoliciesFromFile { path, reply } => {
            let _ = reply.send(enforcer.load_policies_from_file(path).await);
        }
        Command::LoadFilteredPolicies { filter, reply } => {
            let _ = reply.send(enforcer.load_filtered_policies(&filter).await);
        }
        Command::LoadMappingPolicies { reply } => {
            let _ = reply.send(enforcer.load_mapping_policies().await);
        }
        Command::LoadMappingPoliciesFromFile { path, reply } => {
            let _ = reply.send(enforcer.load_mapping_policies_from_file(path).await);
        }
        Command::SavePolicies { reply } => {
            let _ = reply.send(enforcer.save_policies().await);
        }
        Command::SetPersistAdapter { adapter, reply } => {
            enforcer.set_persist_adapter(adapter);
            let _ = reply.send(());
        }
        Command::AddFun {
            name,
            function,
            reply,
        } => {
            enforcer.add_fun(name, move |args| function(args));
            let _ = reply.send(());
        }
        Command::ResetConfiguration { reply } => {
            enforcer.reset_configuration();
            let _ = reply.send(());
        }
    }
}
