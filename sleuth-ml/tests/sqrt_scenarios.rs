//! End-to-end runs of the presets on the `sqrt` of a negative number bug.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use sleuth_core::fitness::best_of;
use sleuth_core::{
    ExplainerState, ExplanationReport, ExplanationSet, GenerationEngine, Grammar, Input,
    OracleResult, RecallPriorityLengthFitness, SleuthConfig, TerminationReason,
};

fn grammar() -> Grammar {
    Grammar::from_rules([
        ("<start>", vec!["<arith_expr>"]),
        ("<arith_expr>", vec!["<function>(<number>)"]),
        ("<function>", vec!["sqrt", "sin", "cos", "tan"]),
        ("<number>", vec!["<maybe_minus><onenine><maybe_digits><maybe_frac>"]),
        ("<maybe_minus>", vec!["", "-"]),
        ("<onenine>", vec!["1", "2", "3", "4", "5", "6", "7", "8", "9"]),
        ("<digit>", vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]),
        ("<maybe_digits>", vec!["", "<digits>"]),
        ("<digits>", vec!["<digit>", "<digit><digits>"]),
        ("<maybe_frac>", vec!["", ".<digits>"]),
    ])
}

fn oracle(input: &str) -> OracleResult {
    if input.starts_with("sqrt(-") {
        OracleResult::Failing
    } else {
        OracleResult::Passing
    }
}

const SEEDS: [&str; 4] = ["sqrt(-900)", "sin(-3)", "cos(10)", "tan(5)"];

fn config(workers: usize) -> SleuthConfig {
    let mut config = SleuthConfig::default();
    config.explainer.max_iterations = 3;
    config.generator.num_inputs = 3;
    config.generator.time_out_ms = 500;
    config.generator.max_attempts = 200;
    config.generator.seed = Some(7);
    config.generator.workers = workers;
    config
}

/// Some best explanation renders every fragment and is exact on the
/// labeled inputs.
fn assert_exact_explanation(best: &ExplanationSet, fragments: &[&str]) {
    let exact = best.iter().find(|e| {
        let shown = e.formula().to_string();
        fragments.iter().all(|f| shown.contains(f))
    });
    let Some(exact) = exact else {
        panic!("no best explanation contains {fragments:?} in {best}");
    };
    assert_eq!(exact.recall(), 1.0);
    assert_eq!(exact.precision(), 1.0);
}

/// Records what each round is steered by, generates nothing new.
struct RecordingEngine {
    rounds: Arc<Mutex<Vec<ExplanationSet>>>,
}

impl GenerationEngine for RecordingEngine {
    fn generate(&mut self, explanations: &ExplanationSet) -> HashSet<Input> {
        self.rounds.lock().unwrap().push(explanations.clone());
        HashSet::new()
    }
}

#[test]
fn alhazen_explains_sqrt_failures() -> anyhow::Result<()> {
    let start = Instant::now();
    let mut explainer = sleuth_ml::alhazen(grammar(), oracle, SEEDS, &config(1))?.build()?;
    let best = explainer.explain()?;

    assert_eq!(explainer.state(), ExplainerState::Terminated);
    assert!(explainer.termination_reason().is_some());
    assert!(explainer.iterations_run() <= 3);
    assert!(explainer.test_inputs().len() >= SEEDS.len());
    assert_exact_explanation(&best, &["exists(<function> == sqrt)", "num(<number>) <="]);
    for input in explainer.test_inputs() {
        assert_eq!(input.oracle(), Some(oracle(input.text())));
        assert!(input.features().is_some());
    }

    let report = ExplanationReport::evaluate(
        "alhazen",
        Some(7),
        start.elapsed(),
        &best,
        explainer.test_inputs(),
        &RecallPriorityLengthFitness,
    );
    assert_eq!(report.explanations.len(), best.len());
    assert!(report.to_json()?.contains("\"name\": \"alhazen\""));
    Ok(())
}

#[test]
fn alhazen_with_worker_threads() -> anyhow::Result<()> {
    let mut explainer = sleuth_ml::alhazen(grammar(), oracle, SEEDS, &config(2))?.build()?;
    let best = explainer.explain()?;
    assert_eq!(explainer.state(), ExplainerState::Terminated);
    assert!(!best.is_empty());
    Ok(())
}

#[test]
fn avicenna_runs_to_completion() -> anyhow::Result<()> {
    let mut explainer = sleuth_ml::avicenna(grammar(), oracle, SEEDS, &config(1))?.build()?;
    let best = explainer.explain()?;
    assert_exact_explanation(&best, &["exists <function> == \"sqrt\"", "num <="]);
    assert_eq!(explainer.state(), ExplainerState::Terminated);
    assert!(matches!(
        explainer.termination_reason(),
        Some(TerminationReason::MaxIterations | TerminationReason::FixedPoint)
    ));
    assert!(explainer
        .test_inputs()
        .iter()
        .any(|i| i.oracle() == Some(OracleResult::Failing)));
    Ok(())
}

#[test]
fn avicenna_steers_with_best_explanations_only() -> anyhow::Result<()> {
    let rounds = Arc::new(Mutex::new(Vec::new()));
    let mut explainer = sleuth_ml::avicenna(grammar(), oracle, SEEDS, &config(1))?
        .engine(RecordingEngine {
            rounds: rounds.clone(),
        })
        .build()?;
    explainer.explain()?;

    let rounds = rounds.lock().unwrap();
    assert_eq!(rounds.len(), 1);
    let steering = &rounds[0];
    assert!(!steering.is_empty());
    assert!(steering.len() < explainer.explanations().len());
    let best = best_of(explainer.explanations().iter(), &RecallPriorityLengthFitness);
    assert_eq!(best.len(), steering.len());
    assert!(steering.iter().all(|e| best.contains(e)));
    Ok(())
}

#[test]
fn alhazen_steers_with_every_explanation() -> anyhow::Result<()> {
    let rounds = Arc::new(Mutex::new(Vec::new()));
    let mut explainer = sleuth_ml::alhazen(grammar(), oracle, SEEDS, &config(1))?
        .engine(RecordingEngine {
            rounds: rounds.clone(),
        })
        .build()?;
    explainer.explain()?;

    let rounds = rounds.lock().unwrap();
    assert_eq!(rounds.len(), 1);
    assert_eq!(rounds[0].len(), explainer.explanations().len());
    Ok(())
}

#[test]
fn presets_reject_invalid_config() {
    let mut config = config(1);
    config.learner.min_recall = 1.5;
    assert!(sleuth_ml::avicenna(grammar(), oracle, SEEDS, &config).is_err());
    config.learner.min_recall = 0.9;
    config.generator.workers = 0;
    assert!(sleuth_ml::alhazen(grammar(), oracle, SEEDS, &config).is_err());
}

#[test]
fn cancelled_before_start_stops_immediately() -> anyhow::Result<()> {
    let mut explainer = sleuth_ml::alhazen(grammar(), oracle, SEEDS, &config(1))?.build()?;
    explainer.cancellation_token().cancel();
    explainer.explain()?;
    assert_eq!(explainer.termination_reason(), Some(TerminationReason::Cancelled));
    assert_eq!(explainer.iterations_run(), 0);
    Ok(())
}
