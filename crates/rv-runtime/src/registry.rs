use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use orion_error::prelude::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rv_core::RuleKey;

use crate::cancel::StopReason;
use crate::error::{RuntimeReason, RuntimeResult};
use crate::supervisor::{SupervisorContext, SupervisorHandle};

// ---------------------------------------------------------------------------
// SupervisorRegistry -- one supervisor per rule key
// ---------------------------------------------------------------------------

/// Thread-safe map of live rule supervisors.
///
/// Every supervisor is a child of the registry's root token, so
/// [`SupervisorRegistry::shutdown`] stops all of them at once. Join handles
/// are kept until [`SupervisorRegistry::wait`] collects them.
pub struct SupervisorRegistry {
    ctx: Arc<SupervisorContext>,
    root: CancellationToken,
    supervisors: Mutex<HashMap<RuleKey, SupervisorHandle>>,
    tasks: Mutex<Vec<(RuleKey, JoinHandle<RuntimeResult<()>>)>>,
}

impl SupervisorRegistry {
    pub fn new(ctx: Arc<SupervisorContext>) -> Self {
        Self::with_root(ctx, CancellationToken::new())
    }

    /// Registry whose supervisors also stop when `root` is cancelled.
    pub fn with_root(ctx: Arc<SupervisorContext>, root: CancellationToken) -> Self {
        Self {
            ctx,
            root,
            supervisors: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Return the supervisor for `key`, spawning one if none is registered.
    ///
    /// The flag is `true` when a new supervisor was created.
    pub fn get_or_create(&self, key: &RuleKey) -> (SupervisorHandle, bool) {
        let mut supervisors = self.supervisors.lock().expect("registry lock poisoned");
        if let Some(handle) = supervisors.get(key) {
            return (handle.clone(), false);
        }
        let handle = SupervisorHandle::new(key.clone(), &self.root);
        let task = handle.spawn(Arc::clone(&self.ctx));
        supervisors.insert(key.clone(), handle.clone());
        drop(supervisors);

        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        tasks.retain(|(_, t)| !t.is_finished());
        tasks.push((key.clone(), task));
        rv_debug!(sys, rule = %key, "rule supervisor registered");
        (handle, true)
    }

    pub fn get(&self, key: &RuleKey) -> Option<SupervisorHandle> {
        self.supervisors
            .lock()
            .expect("registry lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn exists(&self, key: &RuleKey) -> bool {
        self.supervisors
            .lock()
            .expect("registry lock poisoned")
            .contains_key(key)
    }

    /// Remove `key` from the registry. The caller decides how to stop the
    /// returned supervisor.
    pub fn del(&self, key: &RuleKey) -> Option<SupervisorHandle> {
        self.supervisors
            .lock()
            .expect("registry lock poisoned")
            .remove(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<RuleKey> {
        let mut keys: Vec<RuleKey> = self
            .supervisors
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.supervisors.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop and unregister every supervisor with `reason`.
    pub fn stop_all(&self, reason: StopReason) {
        let drained: Vec<SupervisorHandle> = self
            .supervisors
            .lock()
            .expect("registry lock poisoned")
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        rv_info!(sys, supervisors = drained.len(), reason = %reason, "stopping all rule supervisors");
        for handle in drained {
            handle.stop(reason.clone());
        }
    }

    /// Cancel the root token. Supervisors see it as a shutdown.
    pub fn shutdown(&self) {
        rv_info!(sys, supervisors = self.len(), "registry shutdown requested");
        self.root.cancel();
    }

    /// Join every supervisor task spawned so far, returning the first error.
    pub async fn wait(&self) -> RuntimeResult<()> {
        let tasks = std::mem::take(&mut *self.tasks.lock().expect("registry lock poisoned"));
        let mut first_err = None;
        for (key, task) in tasks {
            let joined = task
                .await
                .map_err(|e| {
                    StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("supervisor {key} join error: {e}"))
                })
                .and_then(|res| res);
            if let Err(e) = joined {
                rv_error!(sys, rule = %key, error = %e, "rule supervisor failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
