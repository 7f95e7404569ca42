#![deny(unsafe_code)]
//! Blueprint demo binary: assembling a toy food-web model.
//!
//! Walks through:
//! 1. Declaring component kinds, requirements and conflicts
//! 2. Growing a model with embedded and implied blueprints
//! 3. Forking to explore alternative parametrisations
//! 4. Rejected additions and their rendered paths
//! 5. Guarded properties and methods
//! 6. A fatal expansion that poisons a system
//!
//! Set `RUST_LOG=blueprint_core=debug` to follow the addition pipeline.

mod model;

use blueprint_core::{BlueprintSum, Bound, System, SystemConfig, SystemError};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model::*;

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║             Blueprint component engine  --  Demo              ║
 ║                                                               ║
 ║   Food-web model grown from checked, composable blueprints.   ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

// ── Formatting Helpers ──────────────────────────────────────────────────

fn section(title: &str) {
    println!();
    println!(" ── {title} {}", "─".repeat(58usize.saturating_sub(title.len())));
}

fn ok(msg: &str) {
    println!("   [OK]  {msg}");
}

fn info(msg: &str) {
    println!("   [--]  {msg}");
}

fn warn(msg: &str) {
    println!("   [!!]  {msg}");
}

fn indented(text: &str) -> String {
    text.lines()
        .map(|l| format!("         {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_target(false))
        .init();

    println!("{BANNER}");

    if let Err(e) = run_demo() {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {e:#}");
        std::process::exit(1);
    }

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
}

fn run_demo() -> anyhow::Result<()> {
    // ── Phase A: Kinds ──────────────────────────────────────────────
    section("Phase A: Component kinds");

    let registry = registry()?;
    for kind in registry.kinds() {
        let requires: Vec<_> = registry.requires(kind).keys().map(|k| k.name()).collect();
        let conflicts: Vec<_> = registry.conflicts(kind).keys().map(|k| k.name()).collect();
        info(&format!(
            "{:<15} {:<9} requires {:?}  conflicts {:?}",
            kind.name(),
            if registry.is_abstract(kind) { "abstract" } else { "concrete" },
            requires,
            conflicts,
        ));
    }

    // ── Phase B: Growing a model ────────────────────────────────────
    section("Phase B: Growing a model");

    let names = ["grass", "rabbit", "fox", "eagle"];
    let links = [(1, 0), (2, 1), (3, 1), (3, 2)];

    let mut base = System::new(registry.clone(), Model::default());
    base.add(Foodweb::new(&links).with_species(Species::named(&names)))?;
    ok(&format!("Foodweb with embedded species: {:?}", base.components()));
    info(&base.to_string());

    // ── Phase C: Forks ──────────────────────────────────────────────
    section("Phase C: Forking alternatives");

    let mut implied = base.fork();
    implied.add(Metabolism { rate: 0.3, exponent: 0.75 })?;
    ok(&format!("Implied body masses: {:?}", implied.value().masses));
    ok(&format!("Metabolic rates:     {:?}", implied.value().metabolism));

    let measured = &base
        + (BlueprintSum::of(MassMeasured(vec![1.0, 2.5, 6.0, 4.2]))
            + BlueprintSum::of(Metabolism { rate: 0.3, exponent: 0.75 }));
    let measured = measured?;
    ok(&format!("Measured branch:    {:?}", measured.components()));
    info(&format!(
        "Base model untouched: {:?}",
        base.components()
    ));
    info(&format!(
        "Branches equal? {}",
        if implied == measured { "yes" } else { "no" }
    ));

    // ── Phase D: Rejections ─────────────────────────────────────────
    section("Phase D: Rejected additions");

    let rejected = [
        (
            "metabolism before species",
            System::new(registry.clone(), Model::default())
                .add(Metabolism { rate: 0.3, exponent: 0.75 }),
        ),
        (
            "two mass models",
            implied.fork().add(MassMeasured(vec![1.0, 1.0, 1.0, 1.0])),
        ),
        (
            "mass count mismatch",
            base.fork().add(MassMeasured(vec![1.0, 2.0])),
        ),
        (
            "foodweb given twice",
            base.fork().add(Foodweb::new(&[]).with_species(Species::named(&["x"]))),
        ),
    ];
    for (label, outcome) in rejected {
        match outcome {
            Ok(()) => warn(&format!("{label}: unexpectedly accepted")),
            Err(SystemError::Add(e)) => {
                ok(&format!("{label}: rejected"));
                println!("{}", indented(&e.to_string()));
                println!(
                    "{}",
                    indented(&serde_json::to_string(&e.path).unwrap_or_default())
                );
            }
            Err(other) => return Err(other.into()),
        }
    }

    // ── Phase E: Bindings ───────────────────────────────────────────
    section("Phase E: Guarded properties and methods");

    let (richness, masses, connectance, diet_of) = (richness(), masses(), connectance(), diet_of());
    let bound: [&dyn Bound<Model>; 4] = [&richness, &masses, &connectance, &diet_of];
    info(&format!("Usable on base:     {:?}", base.available(&bound)));
    info(&format!("Usable on branch:   {:?}", implied.available(&bound)));

    ok(&format!("richness    = {}", base.get(&richness)?));
    ok(&format!("connectance = {:.3}", base.call(&connectance, ())?));
    ok(&format!("diet of fox = {:?}", base.call(&diet_of, 2)?));
    match base.get(&masses) {
        Ok(m) => warn(&format!("masses read without a mass model: {m:?}")),
        Err(e) => ok(&format!("masses on base: {e}")),
    }

    let mut edited = measured.fork();
    edited.set(&masses, vec![1.0, 3.0, 9.0, 5.0])?;
    ok(&format!("masses after write = {:?}", edited.get(&masses)?));
    if let Err(e) = edited.set(&masses, vec![1.0]) {
        ok(&format!("short write refused: {e}"));
    }
    edited.call_mut(&rescale_masses(), 10.0)?;
    ok(&format!("masses after rescale = {:?}", edited.get(&masses)?));

    // ── Phase F: Fatal expansion ────────────────────────────────────
    section("Phase F: Fatal expansion");

    let config = SystemConfig::from_json(r#"{ "render_blueprints": false }"#)?;
    let mut doomed = System::with_config(registry.clone(), Model::default(), config);
    let outcome = doomed.add_sum(
        BlueprintSum::of(Species::named(&names))
            + BlueprintSum::of(Temperature {
                sensor: "BLUEPRINT_DEMO_OFFLINE_SENSOR".to_string(),
            }),
    );
    match outcome {
        Err(e) if e.is_fatal() => {
            ok("expansion aborted");
            println!("{}", indented(&e.to_string()));
            info(&doomed.to_string());
            if let Err(again) = doomed.add(Foodweb::new(&links)) {
                ok(&format!("further additions refused: {again}"));
            }
        }
        other => warn(&format!("expected a fatal error, got {other:?}")),
    }

    // ── Summary ─────────────────────────────────────────────────────
    section("Summary");

    let summary = json!({
        "base": base.components(),
        "implied": implied.components(),
        "measured": measured.components(),
        "poisoned": doomed.poisoned_by(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
