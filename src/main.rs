//! `refactory` CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command, EngineArgs};
use refactory::{
    Corpus, EngineConfig, RuleKind, Status, TransformationSession, apply_rule, optimize,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Rules => {
            list_rules();
            Ok(0)
        }
        Command::Apply { file, rule } => apply_file(file, rule),
        Command::Inspect { function, engine } => inspect(&function, engine),
        Command::Verify {
            function,
            rule,
            profile,
            engine,
        } => verify(&function, rule, profile, engine),
        Command::Optimize {
            function,
            profile,
            engine,
        } => optimize_corpus(function.as_deref(), profile, engine),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn list_rules() {
    for rule in RuleKind::ALL {
        println!("{:>2}  {:<24} {}", rule.id(), rule.name(), rule.description());
    }
}

fn apply_file(path: std::path::PathBuf, rule: usize) -> refactory::Result<i32> {
    let source = match std::fs::read_to_string(&path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            return Ok(1);
        }
    };
    let (rewritten, applied) = apply_rule(&source, rule)?;
    print!("{rewritten}");
    if !applied {
        eprintln!("rule {rule} did not apply");
    }
    Ok(0)
}

fn load(engine: &EngineArgs, profile: bool) -> refactory::Result<(Corpus, EngineConfig)> {
    let corpus = match &engine.corpus {
        Some(path) => Corpus::load(path)?,
        None => Corpus::canonical(),
    };
    let mut config = match &engine.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(timeout_ms) = engine.timeout_ms {
        config.budget.timeout_ms = timeout_ms;
    }
    if let Some(max_steps) = engine.max_steps {
        config.budget.max_steps = max_steps;
    }
    config.profile |= profile;
    Ok((corpus, config))
}

fn inspect(function: &str, engine: EngineArgs) -> refactory::Result<i32> {
    let (corpus, _) = load(&engine, false)?;
    let tree = corpus.get(function)?.parse()?;
    let features = tree.features();
    match serde_json::to_string_pretty(&features) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error encoding features: {e}");
            return Ok(1);
        }
    }
    Ok(0)
}

fn verify(function: &str, rule: usize, profile: bool, engine: EngineArgs) -> refactory::Result<i32> {
    let rule = RuleKind::from_id(rule)?;
    let (corpus, config) = load(&engine, profile)?;
    let entry = corpus.get(function)?;
    let session = TransformationSession::new(entry, &config)?;
    let outcome = session.attempt(session.reference().clone(), rule)?;

    println!("rule:     {} ({})", rule.id(), rule.name());
    println!("applied:  {}", outcome.applied);
    println!("accepted: {}", outcome.accepted);
    match &outcome.status {
        Status::NoMatch => Ok(0),
        Status::SoundnessViolation(divergence) => {
            println!(
                "diverged on case {} {}: reference {}, candidate {}",
                divergence.case, divergence.args, divergence.reference, divergence.candidate
            );
            Ok(2)
        }
        Status::Accepted => {
            println!("size:     {:+}", outcome.size_delta);
            if let Some(timing) = &outcome.timing {
                println!(
                    "speedup:  {:.3}x ({:?} -> {:?})",
                    timing.speedup, timing.reference_mean, timing.candidate_mean
                );
            }
            if let Some(score) = outcome.heuristic_score {
                println!("score:    {score:.3}");
            }
            println!();
            print!("{}", outcome.new_tree.unparse());
            Ok(0)
        }
    }
}

fn optimize_corpus(
    function: Option<&str>,
    profile: bool,
    engine: EngineArgs,
) -> refactory::Result<i32> {
    let (corpus, config) = load(&engine, profile)?;
    let entries = match function {
        Some(name) => vec![corpus.get(name)?],
        None => corpus.functions.iter().collect(),
    };

    let mut code = 0;
    for entry in entries {
        let report = optimize(entry, &config)?;
        println!("=== {} ===", report.function);
        for step in &report.steps {
            println!("  {:<24} size {:+}", step.rule.name(), step.size_delta);
        }
        for (step, rule) in &report.violations {
            println!("  soundness violation: {} at step {step}", rule.name());
            code = 2;
        }
        print!("{}", report.tree.unparse());
        println!();
    }
    Ok(code)
}
