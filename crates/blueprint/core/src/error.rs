use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::kind::Kind;

/// Errors raised while declaring kinds and their requirement/conflict edges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown component kind: {0}")]
    UnknownKind(Kind),

    #[error("component kind declared twice: {0}")]
    DuplicateKind(Kind),

    #[error("cannot specialize {parent} into {kind}: only abstract kinds have sub-kinds")]
    ParentNotAbstract { kind: Kind, parent: Kind },

    #[error("only concrete kinds carry requirements, {0} is abstract")]
    RequirementOnAbstract(Kind),

    #[error("{kind} cannot require {required}: the two kinds are related by specialization")]
    VerticalRequirement { kind: Kind, required: Kind },

    #[error("{kind} cannot conflict with {other}: the two kinds are related by specialization")]
    VerticalConflict { kind: Kind, other: Kind },

    #[error(
        "edge {kind} -> {other} already declared with reason {existing:?}, cannot redeclare with {proposed:?}"
    )]
    InconsistentReason {
        kind: Kind,
        other: Kind,
        existing: Option<String>,
        proposed: Option<String>,
    },
}

/// Failure reported by a blueprint's `early_check` or `late_check` hook.
#[derive(Error, Debug)]
pub enum HookError {
    /// The blueprint is invalid for this system. This is the caller's problem.
    #[error("{0}")]
    Check(String),

    /// Anything else. This is the blueprint author's problem.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl HookError {
    pub fn check(message: impl Into<String>) -> Self {
        HookError::Check(message.into())
    }
}

/// How a pending node relates to its parent in the addition forest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Relation {
    /// Supplied directly by the caller.
    Root,
    /// Carried by the parent blueprint, mandatory.
    Embedded,
    /// Constructed on demand by the parent blueprint.
    Implied,
}

/// One node on the path from a failing blueprint up to its forest root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub kind: Kind,
    pub relation: Relation,
    /// `Debug` rendering of the blueprint, if the system renders them.
    pub blueprint: Option<String>,
}

/// The recoverable ways an addition can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddErrorKind {
    #[error("no blueprint given to add")]
    NoBlueprints,

    #[error("invalid blueprint for {component}: {reason} (this is a bug in the blueprint library)")]
    InvalidBlueprint { component: Kind, reason: String },

    #[error("blueprint cannot expand {component}: the component is already attached to the system")]
    AlreadyInValue { component: Kind },

    #[error("two different blueprints were brought for {component}")]
    InconsistentForSameComponent { component: Kind },

    #[error("{component} requires {missing}{}, neither attached nor brought before it", reason_suffix(.reason))]
    MissingRequiredComponent {
        component: Kind,
        missing: Kind,
        reason: Option<String>,
    },

    #[error("{component} conflicts with {other} already attached to the system{}", reason_suffix(.reason))]
    ConflictWithSystemComponent {
        component: Kind,
        other: Kind,
        reason: Option<String>,
    },

    #[error("{component} conflicts with {other} brought by the same addition{}", reason_suffix(.reason))]
    ConflictWithBroughtComponent {
        component: Kind,
        other: Kind,
        reason: Option<String>,
    },

    #[error("{} check failed for {component}: {message}", check_stage(.late))]
    HookCheckFailure {
        component: Kind,
        late: bool,
        message: String,
    },

    #[error(
        "unexpected failure in {} check for {component}: {message} (this is a bug in the blueprint library)",
        check_stage(.late)
    )]
    UnexpectedHookFailure {
        component: Kind,
        late: bool,
        message: String,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" ({r})"),
        None => String::new(),
    }
}

fn check_stage(late: &bool) -> &'static str {
    if *late {
        "late"
    } else {
        "early"
    }
}

impl AddErrorKind {
    /// The kind the failing node was trying to attach, if any.
    pub fn component(&self) -> Option<Kind> {
        match self {
            AddErrorKind::NoBlueprints => None,
            AddErrorKind::InvalidBlueprint { component, .. }
            | AddErrorKind::AlreadyInValue { component }
            | AddErrorKind::InconsistentForSameComponent { component }
            | AddErrorKind::MissingRequiredComponent { component, .. }
            | AddErrorKind::ConflictWithSystemComponent { component, .. }
            | AddErrorKind::ConflictWithBroughtComponent { component, .. }
            | AddErrorKind::HookCheckFailure { component, .. }
            | AddErrorKind::UnexpectedHookFailure { component, .. } => Some(*component),
        }
    }

    /// Whether the failure happened after some components were committed.
    pub fn is_late(&self) -> bool {
        matches!(
            self,
            AddErrorKind::HookCheckFailure { late: true, .. }
                | AddErrorKind::UnexpectedHookFailure { late: true, .. }
        )
    }
}

/// A recoverable addition failure, with the path of the failing node.
///
/// Unless [`AddErrorKind::is_late`] holds, the system is untouched.
/// A late failure leaves the system consistent but without every requested
/// component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddError {
    pub kind: AddErrorKind,
    /// From the failing node up to its forest root.
    pub path: Vec<PathStep>,
    /// Path of the other node involved (inconsistency or brought conflict).
    pub related: Vec<PathStep>,
}

impl AddError {
    pub fn new(kind: AddErrorKind, path: Vec<PathStep>) -> Self {
        Self {
            kind,
            path,
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, related: Vec<PathStep>) -> Self {
        self.related = related;
        self
    }
}

impl fmt::Display for AddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        render_path(f, &self.path)?;
        if !self.related.is_empty() {
            write!(f, "\n  other blueprint:")?;
            render_path(f, &self.related)?;
        }
        Ok(())
    }
}

impl std::error::Error for AddError {}

/// Expansion of a component failed midway through the commit phase.
///
/// This is never recoverable: the wrapped value may have been partially
/// mutated, the system is poisoned and must be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionAborted {
    pub component: Kind,
    pub path: Vec<PathStep>,
    /// Components committed by the same addition before the failure.
    pub committed: Vec<Kind>,
    pub message: String,
}

impl fmt::Display for ExpansionAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expansion of {} aborted: {}\n\
             the system is now in an inconsistent state and must be discarded \
             (this is a bug in the blueprint library)",
            self.component, self.message
        )?;
        if !self.committed.is_empty() {
            let names: Vec<&str> = self.committed.iter().map(|k| k.name()).collect();
            write!(f, "\n  committed before the failure: {}", names.join(", "))?;
        }
        render_path(f, &self.path)
    }
}

impl std::error::Error for ExpansionAborted {}

/// What `System::add*` returns on failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error(transparent)]
    Add(#[from] AddError),

    #[error(transparent)]
    Aborted(#[from] ExpansionAborted),

    #[error("system was poisoned by the aborted expansion of {0} and must be discarded")]
    Poisoned(Kind),
}

impl SystemError {
    /// Whether the system must be discarded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SystemError::Add(_))
    }

    pub fn as_add_error(&self) -> Option<&AddError> {
        match self {
            SystemError::Add(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from guarded property and method access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("component {missing} is required to use {name}")]
    MissingComponent { name: &'static str, missing: Kind },

    #[error("property {0} is read-only")]
    ReadOnly(&'static str),

    #[error("cannot write property {name}: {message}")]
    WriteRejected { name: &'static str, message: String },

    #[error("system was poisoned by the aborted expansion of {0}")]
    Poisoned(Kind),
}

fn render_path(f: &mut fmt::Formatter<'_>, path: &[PathStep]) -> fmt::Result {
    let mut previous: Option<Relation> = None;
    for step in path {
        let lead = match previous {
            None => "in",
            Some(Relation::Embedded) => "embedded within",
            Some(Relation::Implied) => "implied by",
            Some(Relation::Root) => "within",
        };
        write!(f, "\n  {lead} blueprint for {}", step.kind)?;
        if let Some(rendered) = &step.blueprint {
            write!(f, ": {rendered}")?;
        }
        previous = Some(step.relation);
    }
    Ok(())
}
