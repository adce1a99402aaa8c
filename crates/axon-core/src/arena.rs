//! Arena storage for device models.
//!
//! One model exists per unique parameter set in the netlist; every instance
//! of that model holds a [`ModelId`] handle rather than an aliasing
//! reference, so reloading models cannot create lifetime hazards.

/// Handle to a model in a [`ModelArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(usize);

impl ModelId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owning storage for all models of one device type.
#[derive(Debug, Clone, Default)]
pub struct ModelArena<M> {
    models: Vec<M>,
}

impl<M> ModelArena<M> {
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// Store a model and return its handle.
    pub fn insert(&mut self, model: M) -> ModelId {
        self.models.push(model);
        ModelId(self.models.len() - 1)
    }

    pub fn get(&self, id: ModelId) -> &M {
        &self.models[id.0]
    }

    pub fn get_mut(&mut self, id: ModelId) -> &mut M {
        &mut self.models[id.0]
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &M)> {
        self.models.iter().enumerate().map(|(i, m)| (ModelId(i), m))
    }
}
