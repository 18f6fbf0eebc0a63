use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Opaque reference to a compiled shader permutation. Backends map it to
/// their own pipeline objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShaderHandle(u64);

impl ShaderHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureLevel {
    Es31,
    Sm5,
    #[default]
    Sm6,
}

/// Compiled output of one kernel, queried per permutation at submission time.
///
/// Implementations must not block: a permutation that is still compiling
/// reports `None` and the scheduler retries next frame.
pub trait KernelResource: Send + Sync {
    fn shader(&self, permutation_id: u32, feature_level: FeatureLevel) -> Option<ShaderHandle>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShaderState {
    Ready(ShaderHandle),
    Compiling,
    Failed(String),
}

/// Polled table of permutation states for one kernel.
#[derive(Debug)]
pub struct ShaderMap {
    min_feature_level: FeatureLevel,
    /// When set, permutations missing from `states` resolve to a handle
    /// derived from this base and the permutation id.
    immediate_base: Option<u64>,
    states: Mutex<HashMap<u32, ShaderState>>,
}

impl ShaderMap {
    pub fn new(min_feature_level: FeatureLevel) -> Self {
        Self {
            min_feature_level,
            immediate_base: None,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Every permutation is ready, with handle `base << 32 | permutation_id`.
    pub fn immediate(base: u32) -> Self {
        Self {
            min_feature_level: FeatureLevel::Es31,
            immediate_base: Some(u64::from(base) << 32),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_state(&self, permutation_id: u32, state: ShaderState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(permutation_id, state);
        }
    }

    pub fn mark_ready(&self, permutation_id: u32, handle: ShaderHandle) {
        self.set_state(permutation_id, ShaderState::Ready(handle));
    }

    pub fn state(&self, permutation_id: u32) -> Option<ShaderState> {
        self.states.lock().ok()?.get(&permutation_id).cloned()
    }
}

impl KernelResource for ShaderMap {
    fn shader(&self, permutation_id: u32, feature_level: FeatureLevel) -> Option<ShaderHandle> {
        if feature_level < self.min_feature_level {
            return None;
        }
        match self.state(permutation_id) {
            Some(ShaderState::Ready(handle)) => Some(handle),
            Some(ShaderState::Compiling) | Some(ShaderState::Failed(_)) => None,
            None => self
                .immediate_base
                .map(|base| ShaderHandle::new(base | u64::from(permutation_id))),
        }
    }
}
