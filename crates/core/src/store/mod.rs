use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    effect::{EffectConfig, EffectPatch},
    AsciiscopeError, Result,
};

#[derive(Debug)]
struct StoreState {
    config: EffectConfig,
    revision: u64,
}

/// Process-wide home of the [`EffectConfig`]. Cloning shares the same state.
///
/// All mutation goes through [`ConfigStore::merge`] or
/// [`ConfigStore::merge_with`]; each call is applied under one lock, so
/// readers never observe half of a patch, and concurrent patches touching
/// different fields both survive.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    shared: Arc<Mutex<StoreState>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(EffectConfig::default())
    }
}

impl ConfigStore {
    pub fn new(initial: EffectConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(StoreState {
                config: initial,
                revision: 0,
            })),
        }
    }

    /// Like [`ConfigStore::new`] but refuses a config that no merge could
    /// have produced.
    pub fn try_new(initial: EffectConfig) -> Result<Self> {
        initial.validate()?;
        Ok(Self::new(initial))
    }

    /// Applies the present fields of `patch`. Returns `true` when at least
    /// one value changed; re-applying the same patch is a no-op.
    pub fn merge(&self, patch: EffectPatch) -> Result<bool> {
        self.merge_with(|_| patch)
    }

    /// Builds the patch from the current state while holding the lock, so
    /// read-modify-write updates (toggles) never act on a stale value.
    pub fn merge_with<F>(&self, build: F) -> Result<bool>
    where
        F: FnOnce(&EffectConfig) -> EffectPatch,
    {
        let mut state = self.lock()?;
        let patch = build(&state.config);
        patch.validate()?;
        let changed = patch.apply_to(&mut state.config);
        if changed {
            state.revision += 1;
            tracing::debug!(revision = state.revision, "effect config merged");
        }
        Ok(changed)
    }

    /// Copy of the most recently merged values.
    pub fn snapshot(&self) -> Result<EffectConfig> {
        Ok(self.lock()?.config.clone())
    }

    /// Reads a single value without cloning the whole config.
    pub fn read<T>(&self, select: impl FnOnce(&EffectConfig) -> T) -> Result<T> {
        Ok(select(&self.lock()?.config))
    }

    /// Number of merges that changed something.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.lock()?.revision)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.shared
            .lock()
            .map_err(|_| AsciiscopeError::Poisoned("effect config store"))
    }
}
