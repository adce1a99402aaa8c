//! Local-index bookkeeping: the binding between a device's private unknown
//! numbering and positions in the global solution and state vectors.

use crate::error::{Error, Result};

/// Local indices assigned to one device instance by the topology layer.
///
/// A device's local unknowns are numbered externals first, then internals;
/// state slots live in a separate (non-solution) state vector. Indices are
/// assigned exactly once per topology build.
#[derive(Debug, Clone, Default)]
pub struct LocalIds {
    external: Vec<usize>,
    internal: Vec<usize>,
    state: Vec<usize>,
    bound: bool,
    state_bound: bool,
}

impl LocalIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind solution-vector indices. `internal` and `external` counts must
    /// match what the device declared; a second call without a topology
    /// rebuild is rejected.
    pub fn register(
        &mut self,
        internal: &[usize],
        external: &[usize],
        expect_internal: usize,
        expect_external: usize,
    ) -> Result<()> {
        if self.bound {
            return Err(Error::SparsityMismatch(
                "local indices are already bound; topology must be rebuilt first".to_string(),
            ));
        }
        if internal.len() != expect_internal || external.len() != expect_external {
            return Err(Error::SparsityMismatch(format!(
                "expected {expect_external} external / {expect_internal} internal indices, \
                 got {} / {}",
                external.len(),
                internal.len()
            )));
        }
        self.external = external.to_vec();
        self.internal = internal.to_vec();
        self.bound = true;
        Ok(())
    }

    /// Bind state-vector indices for purely-internal state slots. Like
    /// `register`, a second call without a topology rebuild is rejected.
    pub fn register_state(&mut self, state: &[usize], expect_state: usize) -> Result<()> {
        if self.state_bound {
            return Err(Error::SparsityMismatch(
                "state indices are already bound; topology must be rebuilt first".to_string(),
            ));
        }
        if state.len() != expect_state {
            return Err(Error::SparsityMismatch(format!(
                "expected {expect_state} state indices, got {}",
                state.len()
            )));
        }
        self.state = state.to_vec();
        self.state_bound = true;
        Ok(())
    }

    /// Drop all bindings so a changed topology can re-register.
    pub fn unbind(&mut self) {
        self.external.clear();
        self.internal.clear();
        self.state.clear();
        self.bound = false;
        self.state_bound = false;
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn external(&self) -> &[usize] {
        &self.external
    }

    pub fn internal(&self) -> &[usize] {
        &self.internal
    }

    pub fn state(&self) -> &[usize] {
        &self.state
    }

    /// Global solution index of local unknown `local` (externals first).
    pub fn unknown(&self, local: usize) -> usize {
        if local < self.external.len() {
            self.external[local]
        } else {
            self.internal[local - self.external.len()]
        }
    }

    /// Total number of local solution unknowns.
    pub fn num_unknowns(&self) -> usize {
        self.external.len() + self.internal.len()
    }
}
