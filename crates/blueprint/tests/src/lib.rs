//! Shared fixtures for the blueprint integration and property tests.
//!
//! The domain is a small vehicle assembly: every component records itself in
//! a [`Trace`] when expanded, and a single configurable [`Part`] blueprint
//! covers embedding, implication, extra requirements and every hook outcome.

use std::sync::Arc;

use anyhow::anyhow;
use blueprint_core::{Attachments, Blueprint, Edges, HookError, Kind, KindRegistry};

pub const CHASSIS: Kind = Kind::new("Chassis");
pub const ENGINE: Kind = Kind::new("Engine");
pub const POWER: Kind = Kind::new("Power");
pub const PETROL: Kind = Kind::new("Petrol");
pub const ELECTRIC: Kind = Kind::new("Electric");
pub const WHEELS: Kind = Kind::new("Wheels");
pub const TRAILER: Kind = Kind::new("Trailer");
pub const RADIO: Kind = Kind::new("Radio");

pub const CONCRETE: [Kind; 7] = [CHASSIS, ENGINE, PETROL, ELECTRIC, WHEELS, TRAILER, RADIO];

pub fn registry() -> Arc<KindRegistry> {
    let mut reg = KindRegistry::new();
    reg.declare_concrete(CHASSIS, None).unwrap();
    reg.declare_concrete(ENGINE, None).unwrap();
    reg.declare_abstract(POWER, None).unwrap();
    reg.declare_concrete(PETROL, Some(POWER)).unwrap();
    reg.declare_concrete(ELECTRIC, Some(POWER)).unwrap();
    reg.declare_concrete(WHEELS, None).unwrap();
    reg.declare_concrete(TRAILER, None).unwrap();
    reg.declare_concrete(RADIO, None).unwrap();

    reg.declare_requirement(ENGINE, CHASSIS, Some("mounted on the chassis"))
        .unwrap();
    reg.declare_requirement(PETROL, ENGINE, Some("drives the engine"))
        .unwrap();
    reg.declare_requirement(ELECTRIC, ENGINE, Some("drives the engine"))
        .unwrap();
    reg.declare_requirement(WHEELS, CHASSIS, None).unwrap();
    reg.declare_requirement(TRAILER, WHEELS, Some("towed on wheels"))
        .unwrap();
    reg.declare_requirement(RADIO, POWER, Some("draws current"))
        .unwrap();
    reg.declare_conflict(PETROL, ELECTRIC, Some("one power source"))
        .unwrap();
    Arc::new(reg)
}

/// The wrapped value: expansion order, as seen from inside the value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace {
    pub built: Vec<Kind>,
}

/// What a check hook does when run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Pass,
    Reject,
    Crash,
    Panic,
}

impl Outcome {
    fn run(self, kind: Kind, stage: &str) -> Result<(), HookError> {
        match self {
            Outcome::Pass => Ok(()),
            Outcome::Reject => Err(HookError::check(format!("{kind} rejected at {stage}"))),
            Outcome::Crash => Err(anyhow!("{kind} crashed at {stage}").into()),
            Outcome::Panic => panic!("{kind} panicked at {stage}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub kind: Kind,
    pub embeds: Vec<Part>,
    pub implies: Vec<(Kind, Part)>,
    pub extra: Vec<Kind>,
    pub early: Outcome,
    pub late: Outcome,
    pub expand: Outcome,
}

impl Part {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            embeds: Vec::new(),
            implies: Vec::new(),
            extra: Vec::new(),
            early: Outcome::Pass,
            late: Outcome::Pass,
            expand: Outcome::Pass,
        }
    }

    pub fn embed(mut self, part: Part) -> Self {
        self.embeds.push(part);
        self
    }

    pub fn imply(mut self, target: Kind, part: Part) -> Self {
        self.implies.push((target, part));
        self
    }

    pub fn require(mut self, kind: Kind) -> Self {
        self.extra.push(kind);
        self
    }

    pub fn early(mut self, outcome: Outcome) -> Self {
        self.early = outcome;
        self
    }

    pub fn late(mut self, outcome: Outcome) -> Self {
        self.late = outcome;
        self
    }

    pub fn expand(mut self, outcome: Outcome) -> Self {
        self.expand = outcome;
        self
    }

    /// Every kind this part may bring, children first.
    pub fn kinds(&self) -> Vec<Kind> {
        let mut kinds = Vec::new();
        for part in &self.embeds {
            kinds.extend(part.kinds());
        }
        for (_, part) in &self.implies {
            kinds.extend(part.kinds());
        }
        kinds.push(self.kind);
        kinds
    }
}

impl Blueprint<Trace> for Part {
    fn component_kind(&self) -> Kind {
        self.kind
    }

    fn embedded(&self) -> Vec<Box<dyn Blueprint<Trace>>> {
        self.embeds
            .iter()
            .map(|p| Box::new(p.clone()) as Box<dyn Blueprint<Trace>>)
            .collect()
    }

    fn implied(&self) -> Vec<Kind> {
        self.implies.iter().map(|(target, _)| *target).collect()
    }

    fn implied_blueprint_for(&self, target: Kind) -> Option<Box<dyn Blueprint<Trace>>> {
        self.implies
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, p)| Box::new(p.clone()) as Box<dyn Blueprint<Trace>>)
    }

    fn extra_requirements(&self) -> Edges {
        self.extra.iter().map(|k| (*k, None)).collect()
    }

    fn early_check(&self) -> Result<(), HookError> {
        self.early.run(self.kind, "early check")
    }

    fn late_check(&self, _: &Trace, _: &Attachments<Trace>) -> Result<(), HookError> {
        self.late.run(self.kind, "late check")
    }

    fn expand(&self, trace: &mut Trace, _: &Attachments<Trace>) -> anyhow::Result<()> {
        trace.built.push(self.kind);
        match self.expand {
            Outcome::Pass => Ok(()),
            Outcome::Panic => panic!("{} panicked while expanding", self.kind),
            Outcome::Reject | Outcome::Crash => Err(anyhow!("{} could not be fitted", self.kind)),
        }
    }
}

/// A fixed pool of parts, indexed by property tests.
pub fn catalogue() -> Vec<Part> {
    vec![
        Part::new(CHASSIS),
        Part::new(ENGINE),
        Part::new(ENGINE).embed(Part::new(CHASSIS)),
        Part::new(PETROL),
        Part::new(ELECTRIC),
        Part::new(RADIO).imply(POWER, Part::new(ELECTRIC)),
        Part::new(WHEELS),
        Part::new(TRAILER).embed(Part::new(WHEELS)),
        Part::new(WHEELS).late(Outcome::Reject),
        Part::new(RADIO).early(Outcome::Reject),
        Part::new(PETROL).require(WHEELS),
        Part::new(TRAILER).imply(WHEELS, Part::new(WHEELS)),
        Part::new(ENGINE).early(Outcome::Crash),
        Part::new(PETROL).embed(Part::new(ENGINE).embed(Part::new(CHASSIS))),
    ]
}
