use std::fs;
use std::io::{self, BufRead, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use prism_core::session::ENTRY_FUNCTION;
use prism_core::{
    Backend, CompileError, CompiledUnit, Interpreter, Session, UnitKind, UnitMode, link_units,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Command line arguments for the Prism driver.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "ir",
        help = "Output format: ir"
    )]
    emit: String,

    #[arg(long, help = "Execute the script after compiling it")]
    run: bool,

    #[arg(long, help = "Start a REPL even when stdin is not a terminal")]
    interactive: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    if cli.interactive || (cli.input.is_none() && io::stdin().is_terminal()) {
        return repl();
    }
    compile_script(cli)
}

fn compile_script(cli: Cli) -> Result<()> {
    if cli.emit != "ir" {
        return Err(anyhow::anyhow!("unsupported emit format: {}", cli.emit));
    }

    let (source, artifact_name) = match &cli.input {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {}", path.display()))?;
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("script")
                .to_string();
            (source, name)
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            (buffer, "stdin".to_string())
        }
    };

    let mut session = Session::new();
    let mut units = Vec::new();
    let mut failed = false;
    for outcome in session.compile(&source, UnitMode::Batch) {
        match outcome {
            Ok(unit) => units.push(unit.module),
            Err(error) => {
                failed = true;
                eprintln!("error: {error}");
            }
        }
    }

    if failed {
        std::process::exit(1);
    }

    let artifact = link_units(&artifact_name, &units);
    if let Some(path) = &cli.output {
        write_output(path, artifact.to_string().as_bytes())?;
    } else if !cli.run {
        print!("{artifact}");
    }

    if cli.run {
        let mut engine = Interpreter::new(io::stdout());
        for module in units {
            engine.add_module(module);
        }
        match engine.invoke(ENTRY_FUNCTION) {
            Ok(value) => println!("=> {value}"),
            Err(error) => {
                eprintln!("error: {error}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn repl() -> Result<()> {
    let mut session = Session::new();
    let mut engine = Interpreter::new(io::stdout());

    if io::stdin().is_terminal() {
        let mut editor = DefaultEditor::new()?;
        loop {
            match editor.readline("prism> ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line.as_str());
                    eval_line(&mut session, &mut engine, &line);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(error) => return Err(error.into()),
            }
        }
    } else {
        for line in io::stdin().lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            eval_line(&mut session, &mut engine, &line);
        }
    }

    Ok(())
}

/// Compile one line and report each form it contained. A failed form
/// prints its error and the loop moves on; the session state is
/// already rolled back.
fn eval_line(session: &mut Session, engine: &mut Interpreter<io::Stdout>, line: &str) {
    for outcome in session.compile(line, UnitMode::Interactive) {
        match outcome.and_then(|unit| run_unit(engine, unit)) {
            Ok(Some(value)) => println!("=> {value}"),
            Ok(None) => {}
            Err(error) => eprintln!("error: {error}"),
        }
    }
}

/// Load a unit into the engine. Definitions and externs stay loaded;
/// a bare expression is invoked once and its unit unloaded again.
fn run_unit(
    engine: &mut Interpreter<io::Stdout>,
    unit: CompiledUnit,
) -> Result<Option<f64>, CompileError> {
    let module_name = unit.module.name.clone();
    engine.add_module(unit.module);
    match unit.kind {
        UnitKind::Expression { name } => {
            let result = engine.invoke(&name);
            engine.remove_unit(&module_name);
            Ok(Some(result?))
        }
        UnitKind::Definition { .. } | UnitKind::Extern { .. } => Ok(None),
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
