//! Compile and run an IR module stored as JSON
//!
//! Run with: cargo run --example run_ir -- demos/factorial.json [--opt-level N] [--step-limit N] [--dump]
//!
//! Set `RUST_LOG=regir=debug` to watch the optimizer converge.

use anyhow::{bail, Context};
use regir::compiler::ir::{display_instructions, Instruction};
use regir::compiler::{compile, CompileOptions};
use regir::runtime::ExecOptions;
use std::{env, fs};
use tracing_subscriber::EnvFilter;

struct Args {
    path: String,
    compile: CompileOptions,
    exec: ExecOptions,
    dump: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut path = None;
    let mut compile = CompileOptions::default();
    let mut exec = ExecOptions::default();
    let mut dump = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--opt-level" => {
                let value = args.next().context("--opt-level needs a value")?;
                compile.opt_level = value.parse().context("invalid --opt-level")?;
            }
            "--step-limit" => {
                let value = args.next().context("--step-limit needs a value")?;
                exec.step_limit = Some(value.parse().context("invalid --step-limit")?);
            }
            "--dump" => dump = true,
            other if path.is_none() => path = Some(other.to_string()),
            other => bail!("unexpected argument {}", other),
        }
    }

    let path = path.context("usage: run_ir <module.json> [--opt-level N] [--step-limit N] [--dump]")?;
    Ok(Args {
        path,
        compile,
        exec,
        dump,
    })
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    let source =
        fs::read_to_string(&args.path).with_context(|| format!("failed to read {}", args.path))?;
    let code: Vec<Instruction> =
        serde_json::from_str(&source).with_context(|| format!("{} is not an IR module", args.path))?;

    if args.dump {
        println!("; input\n{}", display_instructions(&code));
    }

    let program = compile(&code, &args.compile).context("compilation failed")?;
    if args.dump {
        println!("; optimized (O{})\n{}", args.compile.opt_level, display_instructions(&program.code));
    }

    program
        .run(&args.exec, |value| println!("{}", value))
        .context("execution failed")?;
    Ok(())
}
