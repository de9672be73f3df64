use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use stablefold::access::AccessDescriptor;
use stablefold::config::SuiteConfig;
use stablefold::harness::Harness;
use stablefold::jit::model::{FoldMode, ModelJit};
use stablefold::matrix;
use stablefold::policy::{FoldPolicy, FoldRule, FoldVerdict};
use stablefold::registry::StableRegistry;
use stablefold::report::SuiteReport;
use stablefold::{ElementKind, ReferenceWidth, TargetLayout};
use stablefold_contracts::{STABLEFOLD_MATRIX_SCHEMA_VERSION, STABLEFOLD_VERDICT_SCHEMA_VERSION};

const ENV_LOG: &str = "STABLEFOLD_LOG";

#[derive(Parser)]
#[command(name = "stablefold")]
#[command(about = "Stable-read constant folding conformance suite.", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run every scenario against the model JIT.
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        reference_width: Option<ReferenceWidth>,
        #[arg(long = "kind", value_enum)]
        kinds: Vec<ElementKind>,
        #[arg(long)]
        fail_fast: bool,
        #[arg(long)]
        no_graph_check: bool,
        #[arg(long, value_enum)]
        jit_mode: Option<FoldMode>,
        /// Treat default (all-zero) elements as not yet written.
        #[arg(long)]
        no_default_stable: bool,
        #[arg(long)]
        report_json: bool,
        /// Include passing scenario outcomes in the JSON report.
        #[arg(long)]
        with_outcomes: bool,
    },
    /// List the scenario matrix with expected verdicts.
    Matrix {
        #[arg(long, value_enum)]
        reference_width: Option<ReferenceWidth>,
        #[arg(long = "kind", value_enum)]
        kinds: Vec<ElementKind>,
        #[arg(long)]
        json: bool,
    },
    /// Print the fold verdict for one access.
    Verdict {
        #[arg(long, value_enum)]
        source: ElementKind,
        #[arg(long, value_enum)]
        requested: ElementKind,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, value_enum)]
        reference_width: Option<ReferenceWidth>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct MatrixDoc {
    schema_version: &'static str,
    reference_width: ReferenceWidth,
    matrix_sha256: String,
    entries: Vec<matrix::MatrixEntry>,
}

#[derive(Debug, Serialize)]
struct VerdictDoc {
    schema_version: &'static str,
    access: AccessDescriptor,
    verdict: FoldVerdict,
    rule: FoldRule,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    match try_main(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn setup_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "stablefold=warn",
            1 => "stablefold=info",
            _ => "stablefold=debug",
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn try_main(cli: Cli) -> Result<std::process::ExitCode> {
    match cli.cmd {
        Cmd::Run {
            config,
            reference_width,
            kinds,
            fail_fast,
            no_graph_check,
            jit_mode,
            no_default_stable,
            report_json,
            with_outcomes,
        } => {
            let mut cfg = match &config {
                Some(path) => SuiteConfig::load(path)
                    .with_context(|| format!("load config {}", path.display()))?,
                None => SuiteConfig::default(),
            };
            if let Some(w) = reference_width {
                cfg.reference_width = w;
            }
            if !kinds.is_empty() {
                cfg.kinds = kinds;
            }
            cfg.fail_fast |= fail_fast;
            cfg.check_graph &= !no_graph_check;
            if let Some(mode) = jit_mode {
                cfg.jit.mode = mode;
            }
            cfg.jit.default_stable &= !no_default_stable;

            cmd_run(&cfg, report_json, with_outcomes)
        }
        Cmd::Matrix {
            reference_width,
            kinds,
            json,
        } => {
            let layout = TargetLayout::with_reference_width(reference_width.unwrap_or_default());
            let policy = FoldPolicy::new(layout);
            let entries = matrix::entries(&policy, &kinds);
            let digest = matrix::matrix_sha256(&entries);
            if json {
                print_json(&MatrixDoc {
                    schema_version: STABLEFOLD_MATRIX_SCHEMA_VERSION,
                    reference_width: layout.reference_width,
                    matrix_sha256: digest,
                    entries,
                })?;
            } else {
                for e in &entries {
                    println!("{:<36} {:<14} {}", e.name, e.verdict, e.rule.as_str());
                }
                println!("{} scenarios, sha256 {digest}", entries.len());
            }
            Ok(std::process::ExitCode::SUCCESS)
        }
        Cmd::Verdict {
            source,
            requested,
            offset,
            reference_width,
            json,
        } => {
            let layout = TargetLayout::with_reference_width(reference_width.unwrap_or_default());
            let policy = FoldPolicy::new(layout);
            let access = AccessDescriptor::at_offset(source, requested, offset, layout);
            let rule = policy.rule(&access);
            if json {
                print_json(&VerdictDoc {
                    schema_version: STABLEFOLD_VERDICT_SCHEMA_VERSION,
                    access,
                    verdict: rule.verdict(),
                    rule,
                })?;
            } else {
                println!("{access}: {} ({})", rule.verdict(), rule.as_str());
            }
            Ok(std::process::ExitCode::SUCCESS)
        }
    }
}

fn cmd_run(
    cfg: &SuiteConfig,
    report_json: bool,
    with_outcomes: bool,
) -> Result<std::process::ExitCode> {
    let layout = cfg.layout();
    let policy = FoldPolicy::new(layout);
    let mut registry = StableRegistry::with_default_containers(layout);
    let scenarios = matrix::generate(&registry, &policy, &cfg.kinds);
    let digest = matrix::matrix_sha256(&matrix::entries(&policy, &cfg.kinds));

    let harness = Harness::new(ModelJit::new(cfg.jit), policy).with_graph_check(cfg.check_graph);
    let result = harness.run_suite(&mut registry, &scenarios, cfg.fail_fast);

    let mut report = SuiteReport::from_result(&result, digest)
        .with_meta("reference_width", layout.reference_width)
        .with_meta("jit_mode", cfg.jit.mode.as_str())
        .with_meta("default_stable", cfg.jit.default_stable);
    if with_outcomes {
        report = report.with_outcomes(result.outcomes.clone());
    }

    if report_json {
        print_json(&report)?;
    } else {
        for outcome in &result.outcomes {
            println!("ok   {}", outcome.scenario);
        }
        for err in &result.failures {
            println!("FAIL {} [{}] {err}", err.scenario(), err.code());
        }
        println!(
            "{} passed, {} failed, {} skipped of {}",
            report.scenarios_passed,
            report.scenarios_failed,
            report.scenarios_skipped,
            report.scenarios_total
        );
    }
    Ok(std::process::ExitCode::from(report.exit_code()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
