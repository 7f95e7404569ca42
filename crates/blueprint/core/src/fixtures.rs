//! Small food-web flavoured domain shared by the unit tests.

use std::sync::Arc;

use anyhow::anyhow;

use crate::blueprint::Blueprint;
use crate::error::HookError;
use crate::kind::Kind;
use crate::registry::KindRegistry;
use crate::system::Attachments;

pub const SPECIES: Kind = Kind::new("Species");
pub const FOODWEB: Kind = Kind::new("Foodweb");
pub const MASS: Kind = Kind::new("Mass");
pub const MASS_VALUES: Kind = Kind::new("MassValues");
pub const MASS_RATIO: Kind = Kind::new("MassRatio");
pub const METABOLISM: Kind = Kind::new("Metabolism");
pub const BROKEN: Kind = Kind::new("Broken");

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Web {
    pub species: Vec<String>,
    pub masses: Vec<f64>,
    pub links: Vec<(usize, usize)>,
    pub metabolism: Option<f64>,
    pub expanded: Vec<Kind>,
}

pub fn registry() -> Arc<KindRegistry> {
    let mut reg = KindRegistry::new();
    reg.declare_concrete(SPECIES, None).unwrap();
    reg.declare_concrete(FOODWEB, None).unwrap();
    reg.declare_abstract(MASS, None).unwrap();
    reg.declare_concrete(MASS_VALUES, Some(MASS)).unwrap();
    reg.declare_concrete(MASS_RATIO, Some(MASS)).unwrap();
    reg.declare_concrete(METABOLISM, None).unwrap();
    reg.declare_concrete(BROKEN, None).unwrap();
    reg.declare_requirement(FOODWEB, SPECIES, Some("links refer to species"))
        .unwrap();
    reg.declare_requirement(MASS_VALUES, SPECIES, None).unwrap();
    reg.declare_requirement(MASS_RATIO, SPECIES, None).unwrap();
    reg.declare_requirement(METABOLISM, MASS, Some("rates scale with mass"))
        .unwrap();
    reg.declare_conflict(MASS_VALUES, MASS_RATIO, Some("masses given twice"))
        .unwrap();
    Arc::new(reg)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Species {
    pub names: Vec<String>,
}

pub fn species(names: &[&str]) -> Species {
    Species {
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}

impl Blueprint<Web> for Species {
    fn component_kind(&self) -> Kind {
        SPECIES
    }

    fn early_check(&self) -> Result<(), HookError> {
        if self.names.is_empty() {
            return Err(HookError::check("no species given"));
        }
        Ok(())
    }

    fn expand(&self, web: &mut Web, _: &Attachments<Web>) -> anyhow::Result<()> {
        web.species.extend(self.names.iter().cloned());
        web.expanded.push(SPECIES);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Foodweb {
    pub links: Vec<(usize, usize)>,
    pub species: Option<Species>,
}

impl Foodweb {
    pub fn new(links: Vec<(usize, usize)>) -> Self {
        Self {
            links,
            species: None,
        }
    }

    pub fn with_species(mut self, species: Species) -> Self {
        self.species = Some(species);
        self
    }
}

impl Blueprint<Web> for Foodweb {
    fn component_kind(&self) -> Kind {
        FOODWEB
    }

    fn embedded(&self) -> Vec<Box<dyn Blueprint<Web>>> {
        match &self.species {
            Some(s) => vec![Box::new(s.clone())],
            None => Vec::new(),
        }
    }

    fn late_check(&self, web: &Web, _: &Attachments<Web>) -> Result<(), HookError> {
        let n = web.species.len();
        if let Some((i, j)) = self.links.iter().find(|(i, j)| *i >= n || *j >= n) {
            return Err(HookError::check(format!(
                "link ({i}, {j}) refers to a species beyond the {n} known"
            )));
        }
        Ok(())
    }

    fn expand(&self, web: &mut Web, _: &Attachments<Web>) -> anyhow::Result<()> {
        web.links = self.links.clone();
        web.expanded.push(FOODWEB);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MassValues(pub Vec<f64>);

impl Blueprint<Web> for MassValues {
    fn component_kind(&self) -> Kind {
        MASS_VALUES
    }

    fn late_check(&self, web: &Web, _: &Attachments<Web>) -> Result<(), HookError> {
        if self.0.len() != web.species.len() {
            return Err(HookError::check(format!(
                "expected {} masses, got {}",
                web.species.len(),
                self.0.len()
            )));
        }
        Ok(())
    }

    fn expand(&self, web: &mut Web, _: &Attachments<Web>) -> anyhow::Result<()> {
        web.masses = self.0.clone();
        web.expanded.push(MASS_VALUES);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MassRatio(pub f64);

impl Blueprint<Web> for MassRatio {
    fn component_kind(&self) -> Kind {
        MASS_RATIO
    }

    fn expand(&self, web: &mut Web, _: &Attachments<Web>) -> anyhow::Result<()> {
        web.masses = vec![self.0; web.species.len()];
        web.expanded.push(MASS_RATIO);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Metabolism {
    pub rate: f64,
}

impl Blueprint<Web> for Metabolism {
    fn component_kind(&self) -> Kind {
        METABOLISM
    }

    fn implied(&self) -> Vec<Kind> {
        vec![MASS]
    }

    fn implied_blueprint_for(&self, target: Kind) -> Option<Box<dyn Blueprint<Web>>> {
        (target == MASS).then(|| Box::new(MassRatio(1.0)) as Box<dyn Blueprint<Web>>)
    }

    fn early_check(&self) -> Result<(), HookError> {
        if self.rate.is_nan() {
            return Err(anyhow!("rate is NaN").into());
        }
        if self.rate <= 0.0 {
            return Err(HookError::check(format!(
                "rate must be positive, got {}",
                self.rate
            )));
        }
        Ok(())
    }

    fn expand(&self, web: &mut Web, _: &Attachments<Web>) -> anyhow::Result<()> {
        let total: f64 = web.masses.iter().sum();
        web.metabolism = Some(self.rate * total);
        web.expanded.push(METABOLISM);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Broken {
    pub panics: bool,
}

impl Blueprint<Web> for Broken {
    fn component_kind(&self) -> Kind {
        BROKEN
    }

    fn expand(&self, web: &mut Web, _: &Attachments<Web>) -> anyhow::Result<()> {
        web.expanded.push(BROKEN);
        if self.panics {
            panic!("broken expansion panicked");
        }
        Err(anyhow!("broken expansion"))
    }
}
