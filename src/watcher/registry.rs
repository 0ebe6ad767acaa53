use crate::watcher::monitor::Monitor;
use std::collections::{HashMap, HashSet};

/// The unit being monitored: a whole watcher or one of its processes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Group(String),
    Process(u32),
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityId::Group(name) => write!(f, "{}", name),
            EntityId::Process(pid) => write!(f, "pid {}", pid),
        }
    }
}

/// Changes applied by one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub added: usize,
    pub removed: usize,
}

/// Owns one `Monitor` per live entity
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: HashMap<EntityId, Monitor>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Align the monitor set with the entities seen this tick
    ///
    /// Vanished entities lose their state, new ones start from zero and
    /// surviving ones are left untouched.
    pub fn reconcile(&mut self, live: &HashSet<EntityId>) -> Reconciled {
        let before = self.monitors.len();
        self.monitors.retain(|entity, _| live.contains(entity));
        let removed = before - self.monitors.len();

        let mut added = 0;
        for entity in live {
            if !self.monitors.contains_key(entity) {
                self.monitors.insert(entity.clone(), Monitor::new());
                added += 1;
            }
        }

        Reconciled { added, removed }
    }

    pub fn get(&self, entity: &EntityId) -> Option<&Monitor> {
        self.monitors.get(entity)
    }

    pub fn get_mut(&mut self, entity: &EntityId) -> Option<&mut Monitor> {
        self.monitors.get_mut(entity)
    }

    pub fn contains(&self, entity: &EntityId) -> bool {
        self.monitors.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityId> {
        self.monitors.keys()
    }
}
