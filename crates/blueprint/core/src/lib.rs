#![deny(unsafe_code)]
//! Blueprint: an extensible component engine.
//!
//! A [`System`] wraps an arbitrary value and grows it, one component at a
//! time, from [`Blueprint`]s. Component kinds live in a [`KindRegistry`]
//! that records their hierarchy, requirements and conflicts.
//!
//! ## Addition pipeline
//!
//! 1. **Build**: expand the requested blueprints into a pending forest of
//!    embedded and implied sub-blueprints.
//! 2. **Validate**: check the forest bottom-up: structural rules, early
//!    checks, requirements and conflicts. Any failure leaves the system
//!    untouched.
//! 3. **Commit**: for each validated kind in order, run its late check,
//!    record it and expand it into the wrapped value.
//!
//! A failure inside `expand` cannot be rolled back. The system is then
//! poisoned and refuses further additions; keep a [`System::fork`] if a
//! fallback state is needed.
//!
//! ## Invariants
//!
//! - A concrete kind is attached at most once.
//! - An abstract kind is provided by every attached specialization of it;
//!   only a declared conflict keeps two specializations apart.
//! - Requirements are attached before the components requiring them.
//! - No two attached components conflict.

mod add;
pub mod binding;
pub mod blueprint;
pub mod config;
pub mod error;
pub mod kind;
pub mod registry;
pub mod system;

#[cfg(test)]
mod fixtures;

pub use binding::{Bound, Method, MethodMut, Property};
pub use blueprint::{Blueprint, BlueprintClone, BlueprintSum};
pub use config::SystemConfig;
pub use error::{
    AddError, AddErrorKind, BindingError, ExpansionAborted, HookError, PathStep, RegistryError,
    Relation, SystemError,
};
pub use kind::Kind;
pub use registry::{Edges, KindRegistry};
pub use system::{Attachments, System};
