//! Blueprint contract.
//!
//! A blueprint is a value-carrying recipe that, once expanded, attaches
//! exactly one concrete component kind to the wrapped value `V`. Blueprints
//! are plain data: they are deep-copied by the engine and compared
//! structurally, so implementors derive `Clone`, `PartialEq` and `Debug` and
//! get the type-erased plumbing from [`BlueprintClone`] for free.

use std::any::Any;
use std::fmt;
use std::ops::Add;

use crate::error::HookError;
use crate::kind::Kind;
use crate::registry::Edges;
use crate::system::Attachments;

/// Type-erased copy and comparison, implemented for every
/// `Blueprint<V> + Clone + PartialEq`.
pub trait BlueprintClone<V: 'static> {
    fn clone_box(&self) -> Box<dyn Blueprint<V>>;
    fn eq_box(&self, other: &dyn Blueprint<V>) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<V, T> BlueprintClone<V> for T
where
    V: 'static,
    T: Blueprint<V> + Clone + PartialEq,
{
    fn clone_box(&self) -> Box<dyn Blueprint<V>> {
        Box::new(self.clone())
    }

    fn eq_box(&self, other: &dyn Blueprint<V>) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A construction recipe for one concrete component kind of `V`.
///
/// Hooks run in this order during an addition: `early_check` once the whole
/// forest is known to be structurally legal, then, for each node in commit
/// order, `late_check` against the live value followed by `expand`.
pub trait Blueprint<V: 'static>: BlueprintClone<V> + fmt::Debug + 'static {
    /// The concrete kind this blueprint attaches. Must not vary between calls.
    fn component_kind(&self) -> Kind;

    /// Sub-blueprints always expanded together with this one.
    fn embedded(&self) -> Vec<Box<dyn Blueprint<V>>> {
        Vec::new()
    }

    /// Kinds this blueprint can provide defaults for, when not already present.
    fn implied(&self) -> Vec<Kind> {
        Vec::new()
    }

    /// Build the default blueprint for one of the kinds listed by [`implied`].
    ///
    /// The returned blueprint's kind must specialize `target`.
    ///
    /// [`implied`]: Blueprint::implied
    fn implied_blueprint_for(&self, target: Kind) -> Option<Box<dyn Blueprint<V>>> {
        let _ = target;
        None
    }

    /// Requirements of this expansion step, on top of the kind's own.
    fn extra_requirements(&self) -> Edges {
        Edges::new()
    }

    /// Check the blueprint alone, before anything is written.
    fn early_check(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Check the blueprint against the live value, right before expansion.
    fn late_check(&self, value: &V, attachments: &Attachments<V>) -> Result<(), HookError> {
        let _ = (value, attachments);
        Ok(())
    }

    /// Write the component into the value.
    ///
    /// Any error here aborts the addition and poisons the system: everything
    /// that can be rejected must be rejected by the checks.
    fn expand(&self, value: &mut V, attachments: &Attachments<V>) -> anyhow::Result<()>;
}

impl<V: 'static> Clone for Box<dyn Blueprint<V>> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

impl<V: 'static> PartialEq for dyn Blueprint<V> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_box(other)
    }
}

/// Ordered accumulation of blueprints, added to a system in one go.
///
/// Nothing is validated until the sum is added.
pub struct BlueprintSum<V: 'static> {
    pieces: Vec<Box<dyn Blueprint<V>>>,
}

impl<V: 'static> BlueprintSum<V> {
    pub fn new() -> Self {
        Self { pieces: Vec::new() }
    }

    pub fn of<B: Blueprint<V>>(blueprint: B) -> Self {
        Self::new().with(blueprint)
    }

    pub fn with<B: Blueprint<V>>(mut self, blueprint: B) -> Self {
        self.pieces.push(Box::new(blueprint));
        self
    }

    pub fn push(&mut self, blueprint: Box<dyn Blueprint<V>>) {
        self.pieces.push(blueprint);
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Blueprint<V>> {
        self.pieces.iter().map(|b| b.as_ref())
    }

    pub fn kinds(&self) -> Vec<Kind> {
        self.pieces.iter().map(|b| b.component_kind()).collect()
    }
}

impl<V: 'static> Default for BlueprintSum<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> Clone for BlueprintSum<V> {
    fn clone(&self) -> Self {
        Self {
            pieces: self.pieces.clone(),
        }
    }
}

impl<V: 'static> fmt::Debug for BlueprintSum<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.pieces.iter()).finish()
    }
}

impl<V: 'static> PartialEq for BlueprintSum<V> {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
    }
}

impl<V: 'static> IntoIterator for BlueprintSum<V> {
    type Item = Box<dyn Blueprint<V>>;
    type IntoIter = std::vec::IntoIter<Box<dyn Blueprint<V>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.into_iter()
    }
}

impl<V: 'static> FromIterator<Box<dyn Blueprint<V>>> for BlueprintSum<V> {
    fn from_iter<I: IntoIterator<Item = Box<dyn Blueprint<V>>>>(iter: I) -> Self {
        Self {
            pieces: iter.into_iter().collect(),
        }
    }
}

impl<V: 'static> Add for BlueprintSum<V> {
    type Output = BlueprintSum<V>;

    fn add(mut self, rhs: BlueprintSum<V>) -> Self::Output {
        self.pieces.extend(rhs.pieces);
        self
    }
}

impl<V: 'static> Add<Box<dyn Blueprint<V>>> for BlueprintSum<V> {
    type Output = BlueprintSum<V>;

    fn add(mut self, rhs: Box<dyn Blueprint<V>>) -> Self::Output {
        self.pieces.push(rhs);
        self
    }
}
