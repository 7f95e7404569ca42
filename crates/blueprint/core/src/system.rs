//! System container.
//!
//! A [`System`] owns the wrapped value together with the bookkeeping of which
//! concrete kinds are attached ([`Attachments`]): an insertion-ordered history
//! mapping each attached kind to the blueprint that produced it, and an index
//! from every abstract kind to the attached kinds specializing it.
//!
//! The value is only ever mutated by the addition engine (`System::add*`)
//! and by guarded property writes and mutating methods (see
//! [`crate::binding`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::blueprint::{Blueprint, BlueprintSum};
use crate::config::SystemConfig;
use crate::error::SystemError;
use crate::kind::Kind;
use crate::registry::KindRegistry;

/// Which components are attached to a system, and how they got there.
///
/// Hooks receive this read-only view next to the wrapped value.
pub struct Attachments<V: 'static> {
    registry: Arc<KindRegistry>,
    history: IndexMap<Kind, Box<dyn Blueprint<V>>>,
    abstracts: HashMap<Kind, IndexSet<Kind>>,
}

impl<V: 'static> Attachments<V> {
    pub(crate) fn new(registry: Arc<KindRegistry>) -> Self {
        Self {
            registry,
            history: IndexMap::new(),
            abstracts: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Whether `kind`, or some concrete specialization of it, is attached.
    pub fn has_component(&self, kind: Kind) -> bool {
        if self.history.contains_key(&kind) {
            return true;
        }
        self.abstracts.get(&kind).is_some_and(|set| !set.is_empty())
    }

    /// Attached concrete kinds, in attachment order.
    pub fn components(&self) -> Vec<Kind> {
        self.history.keys().copied().collect()
    }

    /// Attached concrete kinds specializing `kind`, in attachment order.
    pub fn components_of(&self, kind: Kind) -> Vec<Kind> {
        if self.history.contains_key(&kind) {
            return vec![kind];
        }
        self.abstracts
            .get(&kind)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Copy of the blueprint that attached `kind`.
    pub fn blueprint_for(&self, kind: Kind) -> Option<Box<dyn Blueprint<V>>> {
        self.history.get(&kind).cloned()
    }

    /// Copies of every blueprint expanded so far, in attachment order.
    pub fn blueprints(&self) -> Vec<Box<dyn Blueprint<V>>> {
        self.history.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub(crate) fn record(&mut self, kind: Kind, blueprint: Box<dyn Blueprint<V>>) {
        for sup in self.registry.supers(kind) {
            self.abstracts.entry(sup).or_default().insert(kind);
        }
        self.history.insert(kind, blueprint);
    }

    /// Undo the last [`record`](Self::record), used when its expansion aborts.
    pub(crate) fn retract(&mut self, kind: Kind) {
        self.history.shift_remove(&kind);
        for sup in self.registry.supers(kind) {
            if let Some(set) = self.abstracts.get_mut(&sup) {
                set.shift_remove(&kind);
                if set.is_empty() {
                    self.abstracts.remove(&sup);
                }
            }
        }
    }
}

impl<V: 'static> Clone for Attachments<V> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            history: self.history.clone(),
            abstracts: self.abstracts.clone(),
        }
    }
}

impl<V: 'static> PartialEq for Attachments<V> {
    fn eq(&self, other: &Self) -> bool {
        self.history.len() == other.history.len()
            && self
                .history
                .iter()
                .zip(other.history.iter())
                .all(|((ka, ba), (kb, bb))| ka == kb && **ba == **bb)
    }
}

impl<V: 'static> fmt::Debug for Attachments<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.history.iter()).finish()
    }
}

/// The wrapped value plus its component bookkeeping.
pub struct System<V: 'static> {
    pub(crate) value: V,
    pub(crate) attachments: Attachments<V>,
    pub(crate) config: SystemConfig,
    pub(crate) poisoned: Option<Kind>,
}

impl<V: 'static> System<V> {
    /// Wrap `value`, with no component attached yet.
    pub fn new(registry: Arc<KindRegistry>, value: V) -> Self {
        Self::with_config(registry, value, SystemConfig::default())
    }

    pub fn with_config(registry: Arc<KindRegistry>, value: V, config: SystemConfig) -> Self {
        Self {
            value,
            attachments: Attachments::new(registry),
            config,
            poisoned: None,
        }
    }

    /// Wrap `value` then add the seed blueprints, as one addition.
    pub fn with_blueprints(
        registry: Arc<KindRegistry>,
        value: V,
        seeds: BlueprintSum<V>,
    ) -> Result<Self, SystemError> {
        Self::with_config_and_blueprints(registry, value, SystemConfig::default(), seeds)
    }

    pub fn with_config_and_blueprints(
        registry: Arc<KindRegistry>,
        value: V,
        config: SystemConfig,
        seeds: BlueprintSum<V>,
    ) -> Result<Self, SystemError> {
        let mut system = Self::with_config(registry, value, config);
        if !seeds.is_empty() {
            system.add_sum(seeds)?;
        }
        Ok(system)
    }

    /// Read-only view of the wrapped value.
    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn attachments(&self) -> &Attachments<V> {
        &self.attachments
    }

    pub fn registry(&self) -> &KindRegistry {
        self.attachments.registry()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn has_component(&self, kind: Kind) -> bool {
        self.attachments.has_component(kind)
    }

    pub fn components(&self) -> Vec<Kind> {
        self.attachments.components()
    }

    pub fn components_of(&self, kind: Kind) -> Vec<Kind> {
        self.attachments.components_of(kind)
    }

    pub fn blueprints(&self) -> Vec<Box<dyn Blueprint<V>>> {
        self.attachments.blueprints()
    }

    pub fn blueprint_for(&self, kind: Kind) -> Option<Box<dyn Blueprint<V>>> {
        self.attachments.blueprint_for(kind)
    }

    /// Whether an aborted expansion left this system inconsistent.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// The kind whose expansion aborted, if any.
    pub fn poisoned_by(&self) -> Option<Kind> {
        self.poisoned
    }
}

impl<V: Clone + 'static> System<V> {
    /// Fully independent deep copy of the value and its bookkeeping.
    pub fn fork(&self) -> Self {
        Self {
            value: self.value.clone(),
            attachments: self.attachments.clone(),
            config: self.config.clone(),
            poisoned: self.poisoned,
        }
    }
}

impl<V: Clone + 'static> Clone for System<V> {
    fn clone(&self) -> Self {
        self.fork()
    }
}

impl<V: PartialEq + 'static> PartialEq for System<V> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.attachments == other.attachments
    }
}

impl<V: fmt::Debug + 'static> fmt::Debug for System<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("value", &self.value)
            .field("attachments", &self.attachments)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl<V: 'static> fmt::Display for System<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<V>();
        let n = self.attachments.len();
        write!(
            f,
            "System<{name}> with {n} component{}",
            if n == 1 { "" } else { "s" }
        )?;
        if let Some(kind) = self.poisoned {
            write!(f, " (poisoned by {kind})")?;
        }
        if n > 0 {
            write!(f, ":")?;
        }
        for kind in self.attachments.history.keys() {
            write!(f, "\n  - {kind}")?;
        }
        Ok(())
    }
}

// `std::ops::Add` is not imported here: in scope, it shadows the inherent
// `System::add` for method calls on a `System` binding.

impl<V: Clone + 'static> std::ops::Add<BlueprintSum<V>> for &System<V> {
    type Output = Result<System<V>, SystemError>;

    fn add(self, sum: BlueprintSum<V>) -> Self::Output {
        let mut fork = self.fork();
        fork.add_sum(sum)?;
        Ok(fork)
    }
}

impl<V: Clone + 'static> std::ops::Add<Box<dyn Blueprint<V>>> for &System<V> {
    type Output = Result<System<V>, SystemError>;

    fn add(self, blueprint: Box<dyn Blueprint<V>>) -> Self::Output {
        let mut fork = self.fork();
        fork.add_all(vec![blueprint])?;
        Ok(fork)
    }
}
