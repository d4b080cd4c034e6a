//! What-if computation graph CLI.
//!
//! Provides the `whatif` binary for running computation models and what-if
//! scenarios from JSON model files, optionally against entity data stored in
//! a SQLite database.
//!
//! Exit codes: 0 = success, 1 = node-level errors, 2 = structural error
//! (cycle, unknown entity, invalid model), 3 = I/O or storage error.

mod model;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::Level;

use whatif_core::{ExecutionState, NodeId, PropertyBag};
use whatif_engine::{Engine, EngineConfig, EngineError, FailurePolicy};
use whatif_storage::{persist_outputs, PropertyStore, SqliteStore};

use crate::model::{parse_override, Model, ModelError};

const EXIT_NODE_ERRORS: i32 = 1;
const EXIT_STRUCTURAL: i32 = 2;
const EXIT_IO: i32 = 3;

/// What-if computation graph engine.
#[derive(Parser)]
#[command(name = "whatif", about = "Run computation graphs and what-if scenarios")]
struct Cli {
    /// Log engine activity to stderr (repeat for more detail).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the resolved execution order.
    Order {
        /// Path to the JSON model file.
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Execute every computation node once and print the final state.
    Run {
        #[arg(short, long)]
        model: PathBuf,

        /// Load entity data from this SQLite database instead of the model.
        #[arg(long)]
        db: Option<String>,

        /// Write declared outputs back to the database.
        #[arg(long, requires = "db")]
        persist: bool,

        /// Include a per-node evaluation trace in the output.
        #[arg(long)]
        trace: bool,

        /// Stop at the first node error.
        #[arg(long)]
        fail_fast: bool,
    },

    /// Run one what-if scenario and print its report.
    Simulate {
        #[arg(short, long)]
        model: PathBuf,

        /// Override as entity.property=value (repeatable).
        #[arg(short, long = "set", value_name = "ENTITY.PROPERTY=VALUE")]
        set: Vec<String>,

        /// Scenario title.
        #[arg(short, long, default_value = "What-if scenario")]
        title: String,

        /// Print the full result as JSON instead of the text report.
        #[arg(long)]
        json: bool,

        #[arg(long)]
        db: Option<String>,
    },

    /// Create the model's inline entities in a SQLite database.
    Seed {
        #[arg(short, long)]
        model: PathBuf,

        #[arg(long)]
        db: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Order { model } => run_order(&model),
        Commands::Run {
            model,
            db,
            persist,
            trace,
            fail_fast,
        } => run_execute(&model, db.as_deref(), persist, trace, fail_fast),
        Commands::Simulate {
            model,
            set,
            title,
            json,
            db,
        } => run_simulate(&model, &set, &title, json, db.as_deref()),
        Commands::Seed { model, db } => run_seed(&model, &db),
    };
    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Execute the order subcommand.
fn run_order(model_path: &Path) -> i32 {
    let model = match load_model(model_path) {
        Ok(m) => m,
        Err(code) => return code,
    };
    // Ordering needs the entities to exist, not their values.
    let mut state = model.state();
    for id in model.graph.entity_ids() {
        if !state.contains_entity(id.as_str()) {
            state.insert_entity(id.clone(), PropertyBag::new());
        }
    }
    let engine = match build_engine(model, state, EngineConfig::from_env()) {
        Ok(e) => e,
        Err(code) => return code,
    };
    match engine.execution_order() {
        Ok(order) => {
            for (i, id) in order.iter().enumerate() {
                println!("{:>3}. {}", i + 1, id);
            }
            0
        }
        Err(err) => structural(&err),
    }
}

/// Execute the run subcommand.
fn run_execute(
    model_path: &Path,
    db: Option<&str>,
    persist: bool,
    trace: bool,
    fail_fast: bool,
) -> i32 {
    let model = match load_model(model_path) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let mut store = match db.map(open_store).transpose() {
        Ok(s) => s,
        Err(code) => return code,
    };
    let state = match &store {
        Some(store) => match load_state(store, &model) {
            Ok(s) => s,
            Err(code) => return code,
        },
        None => model.state(),
    };

    let mut config = EngineConfig::from_env();
    config.trace_enabled |= trace;
    if fail_fast {
        config.failure_policy = FailurePolicy::FailFast;
    }
    let mut engine = match build_engine(model, state, config) {
        Ok(e) => e,
        Err(code) => return code,
    };

    let report = match engine.execute() {
        Ok(r) => r,
        Err(err) => return structural(&err),
    };

    if persist {
        if let Some(store) = store.as_mut() {
            let declared = engine.graph().declared_outputs_by_entity();
            if let Err(e) = persist_outputs(store, &engine.all_data_nodes(), &declared) {
                eprintln!("Error: failed to persist outputs: {}", e);
                return EXIT_IO;
            }
        }
    }

    let output = serde_json::json!({
        "report": report,
        "state": engine.state(),
    });
    print_json(&output);

    for err in &report.errors {
        eprintln!("node error: {}: {}", err.node, err.message());
    }
    if report.success() {
        0
    } else {
        EXIT_NODE_ERRORS
    }
}

/// Execute the simulate subcommand.
fn run_simulate(
    model_path: &Path,
    set: &[String],
    title: &str,
    json: bool,
    db: Option<&str>,
) -> i32 {
    let model = match load_model(model_path) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let mut overrides = Vec::with_capacity(set.len());
    for raw in set {
        match parse_override(raw) {
            Ok(o) => overrides.push(o),
            Err(e) => {
                eprintln!("Error: {}", e);
                return EXIT_STRUCTURAL;
            }
        }
    }

    let state = match db {
        Some(path) => match open_store(path).and_then(|s| load_state(&s, &model)) {
            Ok(s) => s,
            Err(code) => return code,
        },
        None => model.state(),
    };
    let mut engine = match build_engine(model, state, EngineConfig::from_env()) {
        Ok(e) => e,
        Err(code) => return code,
    };

    // Baseline pass.
    if let Err(err) = engine.execute() {
        return structural(&err);
    }

    let result = match engine.run_scenario(overrides, title) {
        Ok(r) => r,
        Err(err) => return structural(&err),
    };
    if json {
        print_json(&result);
    } else {
        println!("{}", result);
    }

    if result.success {
        0
    } else {
        EXIT_NODE_ERRORS
    }
}

/// Execute the seed subcommand.
fn run_seed(model_path: &Path, db: &str) -> i32 {
    let model = match load_model(model_path) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let mut store = match open_store(db) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.create_entities(&model.entity_specs()) {
        Ok(created) => {
            for (id, external_id) in &created {
                println!("{}\t{}", id, external_id);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: failed to seed '{}': {}", db, e);
            EXIT_IO
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_model(path: &Path) -> Result<Model, i32> {
    Model::load(path).map_err(|e| {
        eprintln!("Error: {}", e);
        match e {
            ModelError::Io { .. } => EXIT_IO,
            _ => EXIT_STRUCTURAL,
        }
    })
}

fn open_store(path: &str) -> Result<SqliteStore, i32> {
    SqliteStore::new(path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", path, e);
        EXIT_IO
    })
}

fn load_state(store: &SqliteStore, model: &Model) -> Result<ExecutionState, i32> {
    let ids: Vec<NodeId> = model.graph.entity_ids().iter().cloned().collect();
    store.load_state(&ids).map_err(|e| {
        eprintln!("Error: failed to load entities: {}", e);
        EXIT_IO
    })
}

fn build_engine(model: Model, state: ExecutionState, config: EngineConfig) -> Result<Engine, i32> {
    Engine::with_config(model.graph, state, config).map_err(|e| structural(&e))
}

fn structural(err: &EngineError) -> i32 {
    eprintln!("Error: {}", err);
    EXIT_STRUCTURAL
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to render JSON: {}", e),
    }
}
