//! Component kind registry.
//!
//! Kinds form a specialization tree: every kind has at most one direct
//! super-kind, and only abstract kinds can be specialized. Concrete kinds are
//! the leaves that actually attach to a system; abstract kinds classify them.
//!
//! The registry is an arena of kind records addressed by index, with the
//! parent link stored as an index. Requirement and conflict edges hang off the
//! records and only ever grow: the declaration layer builds the registry once,
//! then shares it read-only (`Arc<KindRegistry>`) with every system.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::RegistryError;
use crate::kind::Kind;

/// Ordered `kind -> optional reason` edges.
pub type Edges = IndexMap<Kind, Option<String>>;

#[derive(Clone, Debug)]
struct KindRecord {
    kind: Kind,
    parent: Option<usize>,
    is_abstract: bool,
    requires: Edges,
    conflicts: Edges,
}

/// Arena of every declared component kind.
#[derive(Clone, Debug, Default)]
pub struct KindRegistry {
    records: Vec<KindRecord>,
    index: HashMap<Kind, usize>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an abstract kind, optionally specializing another abstract kind.
    pub fn declare_abstract(
        &mut self,
        kind: Kind,
        parent: Option<Kind>,
    ) -> Result<Kind, RegistryError> {
        self.declare(kind, parent, true)
    }

    /// Declare a concrete (attachable) kind, optionally specializing an abstract kind.
    pub fn declare_concrete(
        &mut self,
        kind: Kind,
        parent: Option<Kind>,
    ) -> Result<Kind, RegistryError> {
        self.declare(kind, parent, false)
    }

    fn declare(
        &mut self,
        kind: Kind,
        parent: Option<Kind>,
        is_abstract: bool,
    ) -> Result<Kind, RegistryError> {
        if self.index.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        let parent = match parent {
            Some(p) => {
                let idx = self.idx(p)?;
                if !self.records[idx].is_abstract {
                    return Err(RegistryError::ParentNotAbstract { kind, parent: p });
                }
                Some(idx)
            }
            None => None,
        };
        debug!(kind = %kind, is_abstract, "declared component kind");
        self.index.insert(kind, self.records.len());
        self.records.push(KindRecord {
            kind,
            parent,
            is_abstract,
            requires: Edges::new(),
            conflicts: Edges::new(),
        });
        Ok(kind)
    }

    fn idx(&self, kind: Kind) -> Result<usize, RegistryError> {
        self.index
            .get(&kind)
            .copied()
            .ok_or(RegistryError::UnknownKind(kind))
    }

    fn record(&self, kind: Kind) -> Option<&KindRecord> {
        self.index.get(&kind).map(|&i| &self.records[i])
    }

    pub fn contains(&self, kind: Kind) -> bool {
        self.index.contains_key(&kind)
    }

    pub fn is_abstract(&self, kind: Kind) -> bool {
        self.record(kind).is_some_and(|r| r.is_abstract)
    }

    pub fn is_concrete(&self, kind: Kind) -> bool {
        self.record(kind).is_some_and(|r| !r.is_abstract)
    }

    /// Direct super-kind.
    pub fn parent(&self, kind: Kind) -> Option<Kind> {
        self.record(kind)
            .and_then(|r| r.parent)
            .map(|i| self.records[i].kind)
    }

    /// All super-kinds, nearest first.
    pub fn supers(&self, kind: Kind) -> Vec<Kind> {
        let mut out = Vec::new();
        let mut current = self.record(kind).and_then(|r| r.parent);
        while let Some(i) = current {
            out.push(self.records[i].kind);
            current = self.records[i].parent;
        }
        out
    }

    /// Whether `sub` is `sup` or one of its (transitive) specializations.
    pub fn specializes(&self, sub: Kind, sup: Kind) -> bool {
        sub == sup || self.supers(sub).contains(&sup)
    }

    fn vertical(&self, a: Kind, b: Kind) -> bool {
        self.specializes(a, b) || self.specializes(b, a)
    }

    /// Concrete kinds specializing `kind`, in declaration order.
    pub fn concrete_specializations(&self, kind: Kind) -> Vec<Kind> {
        self.records
            .iter()
            .filter(|r| !r.is_abstract && self.specializes(r.kind, kind))
            .map(|r| r.kind)
            .collect()
    }

    /// Every declared kind, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
        self.records.iter().map(|r| r.kind)
    }

    /// Declare that `kind` cannot be attached unless `required` is.
    ///
    /// Redeclaring an edge with the same reason is a no-op.
    pub fn declare_requirement(
        &mut self,
        kind: Kind,
        required: Kind,
        reason: Option<&str>,
    ) -> Result<(), RegistryError> {
        let idx = self.idx(kind)?;
        self.idx(required)?;
        if self.records[idx].is_abstract {
            return Err(RegistryError::RequirementOnAbstract(kind));
        }
        if self.vertical(kind, required) {
            return Err(RegistryError::VerticalRequirement { kind, required });
        }
        insert_edge(&mut self.records[idx].requires, kind, required, reason)
    }

    /// Declare that `a` and `b` cannot be attached together.
    ///
    /// The edge is recorded on both sides. Conflicting with an abstract kind
    /// conflicts with all of its concrete specializations.
    pub fn declare_conflict(
        &mut self,
        a: Kind,
        b: Kind,
        reason: Option<&str>,
    ) -> Result<(), RegistryError> {
        let ia = self.idx(a)?;
        let ib = self.idx(b)?;
        if self.vertical(a, b) {
            return Err(RegistryError::VerticalConflict { kind: a, other: b });
        }
        // Check both sides before writing either.
        check_edge(&self.records[ia].conflicts, a, b, reason)?;
        check_edge(&self.records[ib].conflicts, b, a, reason)?;
        insert_edge(&mut self.records[ia].conflicts, a, b, reason)?;
        insert_edge(&mut self.records[ib].conflicts, b, a, reason)
    }

    /// Declare every pair of `kinds` mutually conflicting.
    pub fn declare_conflicts(
        &mut self,
        kinds: &[Kind],
        reason: Option<&str>,
    ) -> Result<(), RegistryError> {
        for (i, &a) in kinds.iter().enumerate() {
            for &b in &kinds[i + 1..] {
                self.declare_conflict(a, b, reason)?;
            }
        }
        Ok(())
    }

    /// Kinds required by `kind`, as declared on it.
    pub fn requires(&self, kind: Kind) -> Edges {
        self.record(kind)
            .map(|r| r.requires.clone())
            .unwrap_or_default()
    }

    /// Kinds conflicting with `kind` or with any of its super-kinds.
    pub fn conflicts(&self, kind: Kind) -> Edges {
        let mut out = Edges::new();
        for k in std::iter::once(kind).chain(self.supers(kind)) {
            if let Some(r) = self.record(k) {
                for (other, reason) in &r.conflicts {
                    out.entry(*other).or_insert_with(|| reason.clone());
                }
            }
        }
        out
    }
}

fn check_edge(
    edges: &Edges,
    kind: Kind,
    other: Kind,
    reason: Option<&str>,
) -> Result<(), RegistryError> {
    match edges.get(&other) {
        Some(existing) if existing.as_deref() != reason => Err(RegistryError::InconsistentReason {
            kind,
            other,
            existing: existing.clone(),
            proposed: reason.map(str::to_owned),
        }),
        _ => Ok(()),
    }
}

fn insert_edge(
    edges: &mut Edges,
    kind: Kind,
    other: Kind,
    reason: Option<&str>,
) -> Result<(), RegistryError> {
    check_edge(edges, kind, other, reason)?;
    edges
        .entry(other)
        .or_insert_with(|| reason.map(str::to_owned));
    Ok(())
}
