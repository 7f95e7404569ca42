//! Property tests: random sequences of additions keep the system invariants.
//!
//! Each case picks additions from a fixed part catalogue, applies them to a
//! fresh system, and after every step checks that no kind is attached twice,
//! the abstract index matches the history, requirements precede the
//! components requiring them, and failed pre-commit additions changed
//! nothing.

use blueprint_core::{Blueprint, Kind, KindRegistry, RegistryError, System, SystemError};
use blueprint_tests::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// A sequence of additions, each a non-empty group of catalogue indices.
fn arb_additions() -> impl Strategy<Value = Vec<Vec<usize>>> {
    let n = catalogue().len();
    prop::collection::vec(prop::collection::vec(0..n, 1..4), 1..8)
}

fn pick(indices: &[usize]) -> Vec<Part> {
    let catalogue = catalogue();
    indices.iter().map(|i| catalogue[*i].clone()).collect()
}

fn boxed(parts: &[Part]) -> Vec<Box<dyn Blueprint<Trace>>> {
    parts
        .iter()
        .map(|p| Box::new(p.clone()) as Box<dyn Blueprint<Trace>>)
        .collect()
}

fn check_invariants(system: &System<Trace>) -> Result<(), TestCaseError> {
    let registry = registry();
    let components = system.components();

    // No double attachment.
    let mut seen = components.clone();
    seen.sort();
    seen.dedup();
    prop_assert_eq!(seen.len(), components.len());

    // The value saw exactly the committed kinds, in order.
    prop_assert_eq!(&system.value().built, &components);

    // Abstract index matches a recomputation from history.
    for kind in registry.kinds().filter(|k| registry.is_abstract(*k)) {
        let expected: Vec<Kind> = components
            .iter()
            .copied()
            .filter(|c| registry.specializes(*c, kind))
            .collect();
        prop_assert_eq!(system.components_of(kind), expected.clone());
        prop_assert_eq!(system.has_component(kind), !expected.is_empty());
    }

    // Requirements attached before, conflicts never together.
    for (i, kind) in components.iter().enumerate() {
        for required in registry.requires(*kind).keys() {
            prop_assert!(
                components[..i]
                    .iter()
                    .any(|c| registry.specializes(*c, *required)),
                "{} attached before its requirement {}",
                kind,
                required
            );
        }
        for other in registry.conflicts(*kind).keys() {
            prop_assert!(!system.has_component(*other));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Any sequence of additions keeps the system invariants.
    #[test]
    fn additions_preserve_invariants(additions in arb_additions()) {
        let mut system = System::new(registry(), Trace::default());
        for group in additions {
            let before = system.fork();
            match system.add_all(boxed(&pick(&group))) {
                Ok(()) => {}
                Err(SystemError::Add(e)) if !e.kind.is_late() => {
                    // Atomicity of the pre-commit stages.
                    prop_assert_eq!(&system, &before);
                }
                Err(SystemError::Add(_)) => {
                    prop_assert!(system.components().starts_with(&before.components()));
                }
                Err(other) => prop_assert!(false, "catalogue parts never abort: {}", other),
            }
            check_invariants(&system)?;
        }
    }

    /// Within one successful addition, every embedded or implied child is
    /// committed before its parent.
    #[test]
    fn children_commit_before_parents(additions in arb_additions()) {
        let mut system = System::new(registry(), Trace::default());
        for group in additions {
            let parts = pick(&group);
            let already = system.components().len();
            if system.add_all(boxed(&parts)).is_err() {
                continue;
            }
            let committed = &system.components()[already..];
            let position = |k: Kind| committed.iter().position(|c| *c == k);
            for part in &parts {
                let kinds = part.kinds();
                let Some(parent) = position(part.kind) else { continue };
                for child in &kinds[..kinds.len() - 1] {
                    if let Some(at) = position(*child) {
                        prop_assert!(at < parent, "{} committed after {}", child, part.kind);
                    }
                }
            }
        }
    }

    /// Forks never observe each other's additions.
    #[test]
    fn forks_are_independent(
        shared in arb_additions(),
        left in arb_additions(),
        right in arb_additions(),
    ) {
        let mut base = System::new(registry(), Trace::default());
        for group in shared {
            let _ = base.add_all(boxed(&pick(&group)));
        }
        let snapshot = base.fork();

        let mut fork = base.fork();
        for group in left {
            let _ = fork.add_all(boxed(&pick(&group)));
        }
        prop_assert_eq!(&base, &snapshot);
        let fork_components = fork.components();

        for group in right {
            let _ = base.add_all(boxed(&pick(&group)));
        }
        prop_assert_eq!(fork.components(), fork_components);
        prop_assert_eq!(&fork.value().built, &fork.components());
    }

    /// Declaring a conflict is visible from both sides, whatever the order
    /// and however often it is redeclared.
    #[test]
    fn conflicts_are_symmetric(
        pairs in prop::collection::vec((0usize..7, 0usize..7, prop::option::of(0u8..3)), 1..20),
    ) {
        let mut reg = KindRegistry::new();
        reg.declare_abstract(POWER, None).unwrap();
        for kind in CONCRETE {
            let parent = (kind == PETROL || kind == ELECTRIC).then_some(POWER);
            reg.declare_concrete(kind, parent).unwrap();
        }

        let mut declared = Vec::new();
        for (a, b, reason) in pairs {
            let (a, b) = (CONCRETE[a], CONCRETE[b]);
            let reason = reason.map(|r| format!("reason {r}"));
            match reg.declare_conflict(a, b, reason.as_deref()) {
                Ok(()) => declared.push((a, b, reason)),
                Err(RegistryError::VerticalConflict { .. }) => prop_assert_eq!(a, b),
                Err(RegistryError::InconsistentReason { existing, proposed, .. }) => {
                    prop_assert_ne!(existing, proposed);
                }
                Err(other) => prop_assert!(false, "unexpected registry error: {}", other),
            }
        }

        for (a, b, reason) in declared {
            let (of_a, of_b) = (reg.conflicts(a), reg.conflicts(b));
            prop_assert_eq!(of_a.get(&b), Some(&reason));
            prop_assert_eq!(of_b.get(&a), Some(&reason));
        }
    }
}
