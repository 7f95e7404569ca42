//! Toy food-web model assembled from blueprints.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use blueprint_core::{
    Attachments, Blueprint, HookError, Kind, KindRegistry, Method, MethodMut, Property,
    RegistryError,
};

pub const SPECIES: Kind = Kind::new("Species");
pub const FOODWEB: Kind = Kind::new("Foodweb");
pub const BODY_MASS: Kind = Kind::new("BodyMass");
pub const MASS_MEASURED: Kind = Kind::new("MassMeasured");
pub const MASS_FROM_LEVELS: Kind = Kind::new("MassFromLevels");
pub const METABOLISM: Kind = Kind::new("Metabolism");
pub const TEMPERATURE: Kind = Kind::new("Temperature");

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub species: Vec<String>,
    /// `(predator, prey)` pairs.
    pub links: Vec<(usize, usize)>,
    pub masses: Vec<f64>,
    pub metabolism: Vec<f64>,
    pub temperature: Option<f64>,
}

impl Model {
    /// Longest predator chain above each species, producers at level 1.
    fn trophic_levels(&self) -> Vec<usize> {
        let n = self.species.len();
        let mut levels = vec![1; n];
        for _ in 0..n {
            for &(pred, prey) in &self.links {
                levels[pred] = levels[pred].max(levels[prey] + 1);
            }
        }
        levels
    }
}

pub fn registry() -> Result<Arc<KindRegistry>, RegistryError> {
    let mut reg = KindRegistry::new();
    reg.declare_concrete(SPECIES, None)?;
    reg.declare_concrete(FOODWEB, None)?;
    reg.declare_abstract(BODY_MASS, None)?;
    reg.declare_concrete(MASS_MEASURED, Some(BODY_MASS))?;
    reg.declare_concrete(MASS_FROM_LEVELS, Some(BODY_MASS))?;
    reg.declare_concrete(METABOLISM, None)?;
    reg.declare_concrete(TEMPERATURE, None)?;

    reg.declare_requirement(FOODWEB, SPECIES, Some("links index species"))?;
    reg.declare_requirement(MASS_MEASURED, SPECIES, None)?;
    reg.declare_requirement(MASS_FROM_LEVELS, FOODWEB, Some("masses follow trophic levels"))?;
    reg.declare_requirement(METABOLISM, BODY_MASS, Some("rates scale with mass"))?;
    reg.declare_conflict(MASS_MEASURED, MASS_FROM_LEVELS, Some("body masses given twice"))?;
    Ok(Arc::new(reg))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Species(pub Vec<String>);

impl Species {
    pub fn named(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl Blueprint<Model> for Species {
    fn component_kind(&self) -> Kind {
        SPECIES
    }

    fn early_check(&self) -> Result<(), HookError> {
        if self.0.is_empty() {
            return Err(HookError::check("at least one species is needed"));
        }
        Ok(())
    }

    fn expand(&self, model: &mut Model, _: &Attachments<Model>) -> anyhow::Result<()> {
        model.species = self.0.clone();
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Foodweb {
    pub links: Vec<(usize, usize)>,
    pub species: Option<Species>,
}

impl Foodweb {
    pub fn new(links: &[(usize, usize)]) -> Self {
        Self {
            links: links.to_vec(),
            species: None,
        }
    }

    pub fn with_species(mut self, species: Species) -> Self {
        self.species = Some(species);
        self
    }
}

impl Blueprint<Model> for Foodweb {
    fn component_kind(&self) -> Kind {
        FOODWEB
    }

    fn embedded(&self) -> Vec<Box<dyn Blueprint<Model>>> {
        self.species
            .iter()
            .map(|s| Box::new(s.clone()) as Box<dyn Blueprint<Model>>)
            .collect()
    }

    fn late_check(&self, model: &Model, _: &Attachments<Model>) -> Result<(), HookError> {
        let n = model.species.len();
        for &(pred, prey) in &self.links {
            if pred >= n || prey >= n {
                return Err(HookError::check(format!(
                    "link ({pred}, {prey}) is out of range for {n} species"
                )));
            }
        }
        Ok(())
    }

    fn expand(&self, model: &mut Model, _: &Attachments<Model>) -> anyhow::Result<()> {
        model.links = self.links.clone();
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MassMeasured(pub Vec<f64>);

impl Blueprint<Model> for MassMeasured {
    fn component_kind(&self) -> Kind {
        MASS_MEASURED
    }

    fn early_check(&self) -> Result<(), HookError> {
        if self.0.iter().any(|m| *m <= 0.0) {
            return Err(HookError::check("body masses must be positive"));
        }
        Ok(())
    }

    fn late_check(&self, model: &Model, _: &Attachments<Model>) -> Result<(), HookError> {
        if self.0.len() != model.species.len() {
            return Err(HookError::check(format!(
                "{} masses given for {} species",
                self.0.len(),
                model.species.len()
            )));
        }
        Ok(())
    }

    fn expand(&self, model: &mut Model, _: &Attachments<Model>) -> anyhow::Result<()> {
        model.masses = self.0.clone();
        Ok(())
    }
}

/// Masses grow geometrically with trophic level.
#[derive(Clone, Debug, PartialEq)]
pub struct MassFromLevels {
    pub ratio: f64,
}

impl Blueprint<Model> for MassFromLevels {
    fn component_kind(&self) -> Kind {
        MASS_FROM_LEVELS
    }

    fn expand(&self, model: &mut Model, _: &Attachments<Model>) -> anyhow::Result<()> {
        model.masses = model
            .trophic_levels()
            .into_iter()
            .map(|level| self.ratio.powi(level as i32 - 1))
            .collect();
        Ok(())
    }
}

/// Allometric metabolic rates, `rate * mass^exponent`.
#[derive(Clone, Debug, PartialEq)]
pub struct Metabolism {
    pub rate: f64,
    pub exponent: f64,
}

impl Blueprint<Model> for Metabolism {
    fn component_kind(&self) -> Kind {
        METABOLISM
    }

    fn implied(&self) -> Vec<Kind> {
        vec![BODY_MASS]
    }

    fn implied_blueprint_for(&self, target: Kind) -> Option<Box<dyn Blueprint<Model>>> {
        (target == BODY_MASS)
            .then(|| Box::new(MassFromLevels { ratio: 100.0 }) as Box<dyn Blueprint<Model>>)
    }

    fn expand(&self, model: &mut Model, _: &Attachments<Model>) -> anyhow::Result<()> {
        model.metabolism = model
            .masses
            .iter()
            .map(|m| self.rate * m.powf(self.exponent))
            .collect();
        Ok(())
    }
}

/// Reads its value from a sensor that may be offline.
#[derive(Clone, Debug, PartialEq)]
pub struct Temperature {
    pub sensor: String,
}

impl Blueprint<Model> for Temperature {
    fn component_kind(&self) -> Kind {
        TEMPERATURE
    }

    fn expand(&self, model: &mut Model, _: &Attachments<Model>) -> anyhow::Result<()> {
        let reading: f64 = std::env::var(&self.sensor)
            .with_context(|| format!("sensor {} is offline", self.sensor))?
            .parse()
            .map_err(|e| anyhow!("sensor {} sent garbage: {e}", self.sensor))?;
        model.temperature = Some(reading);
        Ok(())
    }
}

pub fn richness() -> Property<Model, usize> {
    Property::read_only("richness", &[SPECIES], |m| m.species.len())
}

pub fn masses() -> Property<Model, Vec<f64>> {
    Property::read_write(
        "masses",
        &[SPECIES, BODY_MASS],
        |m| m.masses.clone(),
        |m, masses| {
            if masses.len() != m.species.len() {
                return Err(HookError::check("one mass per species"));
            }
            m.masses = masses;
            Ok(())
        },
    )
}

pub fn connectance() -> Method<Model, (), f64> {
    Method::new("connectance", &[FOODWEB], |m, ()| {
        let n = m.species.len() as f64;
        m.links.len() as f64 / (n * n)
    })
}

pub fn diet_of() -> Method<Model, usize, Vec<String>> {
    Method::new("diet_of", &[FOODWEB], |m, predator| {
        m.links
            .iter()
            .filter(|(pred, _)| *pred == predator)
            .map(|(_, prey)| m.species[*prey].clone())
            .collect()
    })
}

/// Multiply every body mass by a constant factor.
pub fn rescale_masses() -> MethodMut<Model, f64, ()> {
    MethodMut::new("rescale_masses", &[BODY_MASS], |m, factor| {
        m.masses.iter_mut().for_each(|mass| *mass *= factor);
    })
}
