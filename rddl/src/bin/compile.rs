//! `rddl-compile <task.json> [--enumerate <out.txt>] [--no-fdr]`: loads a
//! `TaskSpec`, runs it through the simplification pipeline, and optionally
//! emits the exhaustive-enumeration transition table.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use rddl::spec_io::TaskSpec;
use rddl::{build_task, io, simplify};

/// Compiles a factored planning task into a simplified, evaluable form.
#[derive(Debug, Parser)]
#[command(name = "rddl-compile")]
struct Opt {
    /// Path to the JSON-encoded TaskSpec.
    task: PathBuf,

    /// If set, writes the exhaustive-enumeration transition table to this
    /// file after compilation.
    #[arg(long, value_name = "OUT")]
    enumerate: Option<PathBuf>,

    /// Disables the FDR-generation pass (step 4 of the simplifier), overriding
    /// RDDL_ENABLE_FDR.
    #[arg(long)]
    no_fdr: bool,

    /// Logging level: one of "error", "warn", "info", "debug", "trace".
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(opt.log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if opt.no_fdr {
        // Read once, before any `EnvParam` is first touched by the pipeline.
        std::env::set_var("RDDL_ENABLE_FDR", "false");
    }

    let text = fs::read_to_string(&opt.task).with_context(|| format!("reading task file {}", opt.task.display()))?;
    let spec: TaskSpec = serde_json::from_str(&text).with_context(|| format!("parsing task file {} as a TaskSpec", opt.task.display()))?;

    let mut task = build_task(&spec).context("lowering TaskSpec into a Task")?;
    simplify::simplify(&mut task).context("running the simplification pipeline")?;
    task.finalize_hash_keys().context("finalizing hash keys")?;

    tracing::info!(
        state_fluents = task.state_fluents().len(),
        action_fluents = task.action_fluents().len(),
        legal_actions = task.action_states.len(),
        "compiled task '{}'",
        task.name
    );

    if let Some(out_path) = &opt.enumerate {
        let result = io::enumerate(&task).context("running exhaustive-enumeration")?;
        fs::write(out_path, result.format()).with_context(|| format!("writing enumeration output to {}", out_path.display()))?;
        tracing::info!(num_states = result.num_states, "wrote enumeration to {}", out_path.display());
    }

    Ok(())
}
