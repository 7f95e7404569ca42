//! Addition engine.
//!
//! Adding blueprints to a system runs in three stages:
//!
//! 1. **Build**: one pending tree per caller-supplied blueprint, in pre-order.
//!    Embedded sub-blueprints become children of their carrier, then implied
//!    kinds not yet present are constructed and appended as children.
//! 2. **Validate**: post-order walk (children before parents, siblings in
//!    caller order) checking requirements, conflicts and `early_check`.
//!    Validated kinds are collected in an insertion-ordered set.
//! 3. **Commit**: the checked set is replayed in order; each kind gets its
//!    `late_check`, is recorded, then expanded.
//!
//! Nothing is written before stage 3, so a failure in stages 1-2 leaves the
//! system exactly as it was. A `late_check` failure in stage 3 stops the
//! addition with the system consistent but incomplete. An `expand` failure is
//! fatal: the system is poisoned.
//!
//! Pending nodes live in an arena and refer to each other by index.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::blueprint::{Blueprint, BlueprintSum};
use crate::config::SystemConfig;
use crate::error::{
    AddError, AddErrorKind, ExpansionAborted, HookError, PathStep, Relation, SystemError,
};
use crate::kind::Kind;
use crate::registry::KindRegistry;
use crate::system::{Attachments, System};

type NodeId = usize;

struct Node<V: 'static> {
    blueprint: Box<dyn Blueprint<V>>,
    kind: Kind,
    parent: Option<NodeId>,
    relation: Relation,
    children: Vec<NodeId>,
}

/// Pending attachments of one addition.
struct Forest<V: 'static> {
    nodes: Vec<Node<V>>,
    roots: Vec<NodeId>,
    /// Which node brings each concrete kind.
    brought: IndexMap<Kind, NodeId>,
    /// Validated kinds, in commit order.
    checked: IndexMap<Kind, NodeId>,
}

impl<V: 'static> Forest<V> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            brought: IndexMap::new(),
            checked: IndexMap::new(),
        }
    }

    /// Steps from `id` up to its root.
    fn path(&self, id: NodeId, config: &SystemConfig) -> Vec<PathStep> {
        let mut steps = Vec::new();
        let mut current = Some(id);
        while let Some(i) = current {
            let node = &self.nodes[i];
            steps.push(PathStep {
                kind: node.kind,
                relation: node.relation,
                blueprint: config
                    .render_blueprints
                    .then(|| format!("{:?}", node.blueprint)),
            });
            current = node.parent;
        }
        steps
    }

    /// Validated kinds, in commit order.
    fn order(&self) -> Vec<Kind> {
        self.checked.keys().copied().collect()
    }
}

/// Pre-commit stages: read-only access to the system.
struct Planner<'a, V: 'static> {
    attachments: &'a Attachments<V>,
    config: &'a SystemConfig,
    forest: Forest<V>,
}

impl<'a, V: 'static> Planner<'a, V> {
    fn registry(&self) -> &'a KindRegistry {
        self.attachments.registry()
    }

    fn fail(&self, kind: AddErrorKind, at: NodeId) -> AddError {
        AddError::new(kind, self.forest.path(at, self.config))
    }

    fn push(
        &mut self,
        blueprint: Box<dyn Blueprint<V>>,
        parent: Option<NodeId>,
        relation: Relation,
    ) -> NodeId {
        let id = self.forest.nodes.len();
        let kind = blueprint.component_kind();
        self.forest.nodes.push(Node {
            blueprint,
            kind,
            parent,
            relation,
            children: Vec::new(),
        });
        id
    }

    /// Build one pending tree. Returns `None` when an equal blueprint for the
    /// same kind was already brought and this one is redundant.
    fn build(
        &mut self,
        blueprint: Box<dyn Blueprint<V>>,
        parent: Option<NodeId>,
        relation: Relation,
    ) -> Result<Option<NodeId>, AddError> {
        let id = self.push(blueprint, parent, relation);
        let kind = self.forest.nodes[id].kind;

        if !self.registry().is_concrete(kind) {
            return Err(self.fail(
                AddErrorKind::InvalidBlueprint {
                    component: kind,
                    reason: format!("{kind} is not a declared concrete component kind"),
                },
                id,
            ));
        }
        if self.forest.nodes.len() > self.config.max_forest_nodes {
            return Err(self.fail(
                AddErrorKind::InvalidBlueprint {
                    component: kind,
                    reason: format!(
                        "addition exceeds {} pending blueprints",
                        self.config.max_forest_nodes
                    ),
                },
                id,
            ));
        }
        if relation != Relation::Implied && self.attachments.has_component(kind) {
            return Err(self.fail(AddErrorKind::AlreadyInValue { component: kind }, id));
        }
        if let Some(&other) = self.forest.brought.get(&kind) {
            if *self.forest.nodes[other].blueprint == *self.forest.nodes[id].blueprint {
                debug!(component = %kind, "equal blueprint already brought, skipping");
                self.forest.nodes.pop();
                return Ok(None);
            }
            let related = self.forest.path(other, self.config);
            return Err(self
                .fail(AddErrorKind::InconsistentForSameComponent { component: kind }, id)
                .with_related(related));
        }
        self.forest.brought.insert(kind, id);
        if let Some(p) = parent {
            self.forest.nodes[p].children.push(id);
        }
        debug!(component = %kind, relation = ?relation, "pending node built");

        let embedded = self.forest.nodes[id].blueprint.embedded();
        for sub in embedded {
            self.build(sub, Some(id), Relation::Embedded)?;
        }

        let implied = self.forest.nodes[id].blueprint.implied();
        for target in implied {
            if self.provided(target) {
                debug!(component = %kind, implied = %target, "implied kind already provided");
                continue;
            }
            let Some(sub) = self.forest.nodes[id].blueprint.implied_blueprint_for(target) else {
                return Err(self.fail(
                    AddErrorKind::InvalidBlueprint {
                        component: kind,
                        reason: format!(
                            "declares {target} as implied but builds no blueprint for it"
                        ),
                    },
                    id,
                ));
            };
            let produced = sub.component_kind();
            if !self.registry().specializes(produced, target) {
                return Err(self.fail(
                    AddErrorKind::InvalidBlueprint {
                        component: kind,
                        reason: format!(
                            "implied blueprint for {target} produces {produced}, which does not specialize it"
                        ),
                    },
                    id,
                ));
            }
            self.build(sub, Some(id), Relation::Implied)?;
        }

        Ok(Some(id))
    }

    /// Whether `target` is attached or brought, directly or by specialization.
    fn provided(&self, target: Kind) -> bool {
        self.attachments.has_component(target)
            || self
                .forest
                .brought
                .keys()
                .any(|k| self.registry().specializes(*k, target))
    }

    fn brought_before(&self, target: Kind) -> Option<(Kind, NodeId)> {
        self.forest
            .checked
            .iter()
            .find(|(k, _)| self.registry().specializes(**k, target))
            .map(|(k, id)| (*k, *id))
    }

    fn validate(&mut self, id: NodeId) -> Result<(), AddError> {
        let children = self.forest.nodes[id].children.clone();
        for child in children {
            self.validate(child)?;
        }

        let kind = self.forest.nodes[id].kind;
        let registry = self.registry();

        let mut requirements = registry.requires(kind);
        for (req, reason) in self.forest.nodes[id].blueprint.extra_requirements() {
            requirements.entry(req).or_insert(reason);
        }
        for (missing, reason) in requirements {
            if !self.attachments.has_component(missing) && self.brought_before(missing).is_none() {
                return Err(self.fail(
                    AddErrorKind::MissingRequiredComponent {
                        component: kind,
                        missing,
                        reason,
                    },
                    id,
                ));
            }
        }

        for (declared, reason) in registry.conflicts(kind) {
            if let Some(&other) = self.attachments.components_of(declared).first() {
                return Err(self.fail(
                    AddErrorKind::ConflictWithSystemComponent {
                        component: kind,
                        other,
                        reason,
                    },
                    id,
                ));
            }
            if let Some((other, other_id)) = self.brought_before(declared) {
                let related = self.forest.path(other_id, self.config);
                return Err(self
                    .fail(
                        AddErrorKind::ConflictWithBroughtComponent {
                            component: kind,
                            other,
                            reason,
                        },
                        id,
                    )
                    .with_related(related));
            }
        }

        let blueprint = &self.forest.nodes[id].blueprint;
        let outcome = guarded(self.config, || blueprint.early_check());
        if let Some(failure) = hook_failure(outcome, kind, false) {
            return Err(self.fail(failure, id));
        }

        debug!(component = %kind, "pending node validated");
        self.forest.checked.insert(kind, id);
        Ok(())
    }

    /// Run build and validation. Never touches the value.
    fn plan(mut self, blueprints: Vec<Box<dyn Blueprint<V>>>) -> Result<Forest<V>, AddError> {
        for blueprint in blueprints {
            if let Some(root) = self.build(blueprint, None, Relation::Root)? {
                self.forest.roots.push(root);
            }
        }
        let roots = self.forest.roots.clone();
        for root in roots {
            self.validate(root)?;
        }
        Ok(self.forest)
    }
}

/// Call a hook, optionally turning panics into errors.
fn guarded<T>(config: &SystemConfig, hook: impl FnOnce() -> T) -> Result<T, String> {
    if !config.catch_panics {
        return Ok(hook());
    }
    panic::catch_unwind(AssertUnwindSafe(hook)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn hook_failure(
    outcome: Result<Result<(), HookError>, String>,
    component: Kind,
    late: bool,
) -> Option<AddErrorKind> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(HookError::Check(message))) => Some(AddErrorKind::HookCheckFailure {
            component,
            late,
            message,
        }),
        Ok(Err(HookError::Unexpected(e))) => Some(AddErrorKind::UnexpectedHookFailure {
            component,
            late,
            message: format!("{e:#}"),
        }),
        Err(message) => Some(AddErrorKind::UnexpectedHookFailure {
            component,
            late,
            message,
        }),
    }
}

impl<V: 'static> System<V> {
    /// Add one blueprint.
    ///
    /// With `std::ops::Add` in scope, method syntax picks the `&System + _`
    /// operator instead of this method; call it as `System::add(&mut s, b)`.
    pub fn add<B: Blueprint<V>>(&mut self, blueprint: B) -> Result<(), SystemError> {
        self.add_all(vec![Box::new(blueprint) as Box<dyn Blueprint<V>>])
    }

    /// Add every blueprint of a sum, as one addition.
    pub fn add_sum(&mut self, sum: BlueprintSum<V>) -> Result<(), SystemError> {
        self.add_all(sum)
    }

    /// Add several blueprints as one addition: either every requested kind
    /// is validated before anything is written, or nothing is written.
    pub fn add_all<I>(&mut self, blueprints: I) -> Result<(), SystemError>
    where
        I: IntoIterator<Item = Box<dyn Blueprint<V>>>,
    {
        if let Some(kind) = self.poisoned {
            return Err(SystemError::Poisoned(kind));
        }
        let blueprints: Vec<_> = blueprints.into_iter().collect();
        if blueprints.is_empty() {
            return Err(AddError::new(AddErrorKind::NoBlueprints, Vec::new()).into());
        }
        let requested = blueprints.len();

        let planner = Planner {
            attachments: &self.attachments,
            config: &self.config,
            forest: Forest::new(),
        };
        let forest = match planner.plan(blueprints) {
            Ok(forest) => forest,
            Err(e) => {
                warn!(error = %e.kind, "addition rejected before commit");
                return Err(e.into());
            }
        };
        debug!(order = ?forest.order(), "addition validated, committing");

        self.commit(&forest)?;
        info!(
            requested,
            attached = forest.checked.len(),
            total = self.attachments.len(),
            "addition committed"
        );
        Ok(())
    }

    fn commit(&mut self, forest: &Forest<V>) -> Result<(), SystemError> {
        let mut committed = Vec::new();
        for (&kind, &id) in &forest.checked {
            let blueprint = &forest.nodes[id].blueprint;

            let (value, attachments) = (&self.value, &self.attachments);
            let outcome = guarded(&self.config, || blueprint.late_check(value, attachments));
            if let Some(failure) = hook_failure(outcome, kind, true) {
                let err = AddError::new(failure, forest.path(id, &self.config));
                warn!(
                    component = %kind,
                    committed = committed.len(),
                    error = %err.kind,
                    "addition stopped by late check"
                );
                return Err(err.into());
            }

            self.attachments.record(kind, blueprint.clone());
            // Stays poisoned if `expand` unwinds past `guarded`.
            self.poisoned = Some(kind);
            let (value, attachments) = (&mut self.value, &self.attachments);
            let outcome = guarded(&self.config, || blueprint.expand(value, attachments));
            let message = match outcome {
                Ok(Ok(())) => {
                    self.poisoned = None;
                    debug!(component = %kind, "component expanded");
                    committed.push(kind);
                    continue;
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(panicked) => panicked,
            };

            self.attachments.retract(kind);
            error!(component = %kind, error = %message, "expansion aborted, system poisoned");
            return Err(ExpansionAborted {
                component: kind,
                path: forest.path(id, &self.config),
                committed,
                message,
            }
            .into());
        }
        Ok(())
    }
}
