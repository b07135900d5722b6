//! Actor activation lookup consumed by the timer engine.

use dashmap::DashSet;
use std::fmt::Debug;

/// Answers whether an actor instance is currently activated on this host
pub trait ActorActivationTable: Send + Sync + Debug {
    fn is_activated(&self, actor_type: &str, actor_id: &str) -> bool;
}

/// Activation table held in memory, keyed by `type||id`
#[derive(Debug, Default)]
pub struct InMemoryActorTable {
    actors: DashSet<String>,
}

impl InMemoryActorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, actor_type: &str, actor_id: &str) {
        self.actors.insert(super::timer::actor_key(actor_type, actor_id));
    }

    /// Returns whether the actor was active
    pub fn deactivate(&self, actor_type: &str, actor_id: &str) -> bool {
        self.actors
            .remove(&super::timer::actor_key(actor_type, actor_id))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl ActorActivationTable for InMemoryActorTable {
    fn is_activated(&self, actor_type: &str, actor_id: &str) -> bool {
        self.actors
            .contains(&super::timer::actor_key(actor_type, actor_id))
    }
}
