use std::io::Write;

use refactory::corpus::SUM_LIST;
use refactory::error::Role;
use refactory::{
    Corpus, CorpusEntry, EngineConfig, EngineErrorKind, ExecutionBudget, PerfCase, RuleKind,
    Status, SyntaxTree, TestCase, TransformationOutcome, TransformationSession, optimize,
};
use serde_json::json;
use tempfile::NamedTempFile;

fn attempt(entry: &CorpusEntry, config: &EngineConfig, rule: RuleKind) -> TransformationOutcome {
    let session = TransformationSession::new(entry, config).unwrap();
    session
        .attempt(session.reference().clone(), rule)
        .unwrap()
}

fn canonical(name: &str) -> CorpusEntry {
    Corpus::canonical().get(name).unwrap().clone()
}

fn entry(name: &str, source: &str, tests: Vec<TestCase>) -> CorpusEntry {
    CorpusEntry {
        name: name.into(),
        source: source.into(),
        tests,
        perf: None,
    }
}

#[test]
fn test_canonical_reductions_are_accepted() {
    let config = EngineConfig::default();
    for (name, rule) in [
        ("sum_list", RuleKind::LoopToSum),
        ("max_list", RuleKind::LoopToMax),
        ("check_positive", RuleKind::CollapseBoolBranch),
        ("double_list", RuleKind::AppendToComprehension),
        ("greet", RuleKind::RemoveDocstring),
    ] {
        let outcome = attempt(&canonical(name), &config, rule);
        assert_eq!(outcome.status, Status::Accepted, "{name}");
        assert!(outcome.applied && outcome.accepted);
        assert!(outcome.size_delta > 0, "{name}");
        assert_eq!(outcome.heuristic_score, Some(outcome.size_delta as f64));
        assert!(outcome.timing.is_none());
    }
}

#[test]
fn test_size_delta_counts_saved_characters() {
    let config = EngineConfig::default();
    let outcome = attempt(&canonical("sum_list"), &config, RuleKind::LoopToSum);
    // `total=0`, `forxinlst:`, `total+=x` and `returntotal` become `returnsum(lst)`.
    assert_eq!(outcome.size_delta, 22);

    let outcome = attempt(&canonical("greet"), &config, RuleKind::RemoveDocstring);
    assert_eq!(outcome.size_delta, "'greet'".len() as i64);
}

#[test]
fn test_no_match_is_not_applied() {
    let config = EngineConfig::default();
    let entry = canonical("sum_list");
    let outcome = attempt(&entry, &config, RuleKind::CollapseBoolBranch);
    assert_eq!(outcome.status, Status::NoMatch);
    assert!(!outcome.applied);
    assert!(!outcome.accepted);
    assert_eq!(outcome.heuristic_score, None);
    assert_eq!(outcome.new_tree, entry.parse().unwrap());
}

#[test]
fn test_wrong_accumulator_is_a_soundness_violation() {
    let source = "def sum_list(lst):\n    total = 0\n    for x in lst:\n        total -= x\n    return total\n";
    let entry = entry(
        "sum_list",
        source,
        vec![
            TestCase::new(vec![json!([])]),
            TestCase::new(vec![json!([1, 2, 3])]),
        ],
    );
    let outcome = attempt(&entry, &EngineConfig::default(), RuleKind::LoopToSum);

    assert!(outcome.applied);
    assert!(!outcome.accepted);
    let divergence = outcome.divergence().unwrap();
    assert_eq!(divergence.case, 1);
    assert_eq!(divergence.reference, "returned -6");
    assert_eq!(divergence.candidate, "returned 6");
    assert_eq!(outcome.new_tree, entry.parse().unwrap());
}

#[test]
fn test_exception_class_mismatch_is_a_soundness_violation() {
    let mut entry = canonical("max_list");
    entry.tests.push(TestCase::new(vec![json!([])]));
    let outcome = attempt(&entry, &EngineConfig::default(), RuleKind::LoopToMax);

    let divergence = outcome.divergence().unwrap();
    assert_eq!(divergence.case, 3);
    assert!(divergence.reference.starts_with("raised IndexError"));
    assert!(divergence.candidate.starts_with("raised ValueError"));
}

#[test]
fn test_reference_stays_the_original_source() {
    let config = EngineConfig::default();
    let entry = canonical("sum_list");
    let session = TransformationSession::new(&entry, &config).unwrap();

    let compressed = session
        .attempt(session.reference().clone(), RuleKind::CompressVariable)
        .unwrap();
    assert!(compressed.accepted);
    let reduced = session
        .attempt(compressed.new_tree, RuleKind::LoopToSum)
        .unwrap();
    assert!(reduced.accepted);
    assert_eq!(session.reference().unparse(), entry.parse().unwrap().unparse());
    assert_eq!(
        reduced.new_tree.unparse(),
        "def sum_list(lst):\n    return sum(lst)\n"
    );
}

#[test]
fn test_profiling_attaches_timing() {
    let config = EngineConfig {
        profile: true,
        perf_repeats: 2,
        ..EngineConfig::default()
    };
    let outcome = attempt(&canonical("sum_list"), &config, RuleKind::LoopToSum);
    let timing = outcome.timing.as_ref().unwrap();
    assert_eq!(timing.repeats, 2);
    assert!(timing.speedup > 0.0);

    let expected = outcome.size_delta as f64 + config.speed_weight * (timing.speedup - 1.0);
    assert_eq!(outcome.heuristic_score, Some(expected));
}

#[test]
fn test_timing_compares_against_the_attempt_input() {
    let config = EngineConfig {
        profile: true,
        perf_repeats: 5,
        ..EngineConfig::default()
    };
    let entry = canonical("sum_list");
    let session = TransformationSession::new(&entry, &config).unwrap();
    let reduced = session
        .attempt(session.reference().clone(), RuleKind::LoopToSum)
        .unwrap();
    assert!(reduced.accepted);

    // Renaming `lst` leaves the already reduced body as fast as before.
    let renamed = session
        .attempt(reduced.new_tree, RuleKind::CompressVariable)
        .unwrap();
    assert!(renamed.accepted);
    let timing = renamed.timing.as_ref().unwrap();
    assert!((0.2..5.0).contains(&timing.speedup), "{timing:?}");
    let expected = renamed.size_delta as f64 + config.speed_weight * (timing.speedup - 1.0);
    assert_eq!(renamed.heuristic_score, Some(expected));
}

#[test]
fn test_runaway_reference_is_a_timeout() {
    let source = "def spin(x):\n    \"\"\"never returns\"\"\"\n    while True:\n        x += 1\n";
    let entry = entry("spin", source, vec![TestCase::new(vec![json!(0)])]);
    let config = EngineConfig {
        budget: ExecutionBudget {
            max_steps: 10_000,
            ..ExecutionBudget::default()
        },
        ..EngineConfig::default()
    };
    let session = TransformationSession::new(&entry, &config).unwrap();
    let err = session
        .attempt(session.reference().clone(), RuleKind::RemoveDocstring)
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        EngineErrorKind::ExecutionTimeout {
            role: Role::Reference,
            case: 0,
            ..
        }
    ));
}

#[test]
fn test_greedy_optimizer() {
    let config = EngineConfig::default();
    let report = optimize(&canonical("sum_list"), &config).unwrap();
    let rules: Vec<RuleKind> = report.steps.iter().map(|step| step.rule).collect();
    assert_eq!(
        rules,
        [
            RuleKind::CompressVariable,
            RuleKind::CompressVariable,
            RuleKind::LoopToSum
        ]
    );
    assert!(report.violations.is_empty());
    assert_eq!(report.tree.unparse(), "def sum_list(b):\n    return sum(b)\n");
}

#[test]
fn test_optimizer_respects_step_limit() {
    let config = EngineConfig {
        max_optimize_steps: 1,
        ..EngineConfig::default()
    };
    let report = optimize(&canonical("greet"), &config).unwrap();
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].rule, RuleKind::RemoveDocstring);
}

#[test]
fn test_corpus_file() {
    let corpus = json!({
        "functions": [{
            "name": "sum_list",
            "source": SUM_LIST,
            "tests": [[[1, 2, 3]], [{"range": 10}]],
            "perf": {"args": [{"range": 1000}], "repeats": 2}
        }]
    });
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    write!(file, "{corpus}").unwrap();

    let corpus = Corpus::load(file.path()).unwrap();
    let entry = corpus.get("sum_list").unwrap();
    assert_eq!(entry.tests.len(), 2);
    assert_eq!(entry.perf.as_ref().and_then(|perf| perf.repeats), Some(2));

    let config = EngineConfig {
        profile: true,
        ..EngineConfig::default()
    };
    let outcome = attempt(entry, &config, RuleKind::LoopToSum);
    assert!(outcome.accepted);
    assert_eq!(outcome.timing.unwrap().repeats, 2);
}

#[test]
fn test_corpus_file_errors() {
    let err = Corpus::load("/nonexistent/corpus.json").unwrap_err();
    assert!(matches!(err.kind(), EngineErrorKind::Corpus(_)));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{\"functions\": 3}}").unwrap();
    let err = Corpus::load(file.path()).unwrap_err();
    assert!(matches!(err.kind(), EngineErrorKind::Corpus(_)));
}

#[test]
fn test_sessions_run_on_separate_threads() {
    fn assert_send<T: Send>() {}
    assert_send::<SyntaxTree>();
    assert_send::<Corpus>();
    assert_send::<EngineConfig>();
    assert_send::<PerfCase>();
    assert_send::<TransformationOutcome>();
    assert_send::<refactory::EngineError>();

    let config = &EngineConfig::default();
    let corpus = Corpus::canonical();
    std::thread::scope(|scope| {
        let handles: Vec<_> = corpus
            .functions
            .iter()
            .map(|entry| scope.spawn(move || optimize(entry, config).unwrap()))
            .collect();
        for handle in handles {
            let report = handle.join().unwrap();
            assert!(!report.steps.is_empty(), "{}", report.function);
        }
    });
}
