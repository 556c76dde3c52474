//! Semantic graph inspection CLI.
//!
//! Provides the `semgraph` binary for working with saved MiniPy graphs:
//! writing a demo graph, printing statistics, exporting DOT, querying
//! callers through the reverse-edge index and managing filter files.
//!
//! Exit codes: 0 = success, 1 = bad graph or argument, 3 = I/O error.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use semgraph_core::export::to_stable_graph;
use semgraph_core::minipy::{Attr, Edge, MiniPy, PyKind, CALL_EDGES};
use semgraph_core::{AsgStat, CoreError, Factory, NodeId, Value};
use semgraph_storage::{load_file, save_file, Header, StorageError};

/// Semantic graph tools.
#[derive(Parser)]
#[command(name = "semgraph", about = "Semantic graph inspection tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write a small sample graph.
    Demo {
        /// Output graph file.
        #[arg(short, long)]
        out: PathBuf,

        /// Compress the node stream.
        #[arg(long)]
        zip: bool,
    },

    /// Print node and relation counts.
    Stat {
        /// Graph file.
        file: PathBuf,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the visible graph in Graphviz DOT format.
    Dot {
        /// Graph file.
        file: PathBuf,

        /// Filter file to apply before export.
        #[arg(long)]
        filter: Option<PathBuf>,
    },

    /// List the call sites of a node.
    Callers {
        /// Graph file.
        file: PathBuf,

        /// Id of the called node.
        id: u32,
    },

    /// Hide subtrees and save the resulting filter.
    Filter {
        /// Graph file.
        file: PathBuf,

        /// Ids whose subtrees are hidden.
        #[arg(long = "hide", required = true)]
        hide: Vec<u32>,

        /// Output filter file.
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Demo { out, zip } => run_demo(&out, zip),
        Commands::Stat { file, json } => run_stat(&file, json),
        Commands::Dot { file, filter } => run_dot(&file, filter.as_deref()),
        Commands::Callers { file, id } => run_callers(&file, NodeId(id)),
        Commands::Filter { file, hide, out } => run_filter(&file, &hide, &out),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(exit_code(&e));
    }
}

/// Maps an error to the process exit code.
fn exit_code(err: &StorageError) -> i32 {
    match err {
        StorageError::Io(_) | StorageError::Core(CoreError::Io(_)) => 3,
        _ => 1,
    }
}

fn open(path: &Path) -> Result<Factory<MiniPy>, StorageError> {
    let mut factory = Factory::new();
    load_file(&mut factory, path, &mut Header::new())?;
    Ok(factory)
}

/// Execute the demo subcommand.
fn run_demo(out: &Path, zip: bool) -> Result<(), StorageError> {
    let factory = build_demo()?;
    save_file(&factory, out, &Header::new(), zip)?;
    println!("wrote {} nodes to {}", factory.node_count(), out.display());
    Ok(())
}

/// A module with a class, two methods and a call between them.
fn build_demo() -> Result<Factory<MiniPy>, CoreError> {
    let mut f = Factory::<MiniPy>::new();
    let module = f.create_module_node()?;
    f.add_edge(f.root(), Edge::HasModule, module)?;
    f.set_str_attr(module, Attr::Name, "shapes")?;

    let class = f.create_named(module, Edge::HasMember, PyKind::ClassDef, "Circle")?;
    let doc = f.create_docstring_node()?;
    f.set_str_attr(doc, Attr::Text, "A circle given by its radius.")?;
    f.add_edge(class, Edge::HasDocstring, doc)?;

    let radius = f.create_named(class, Edge::HasMember, PyKind::FunctionDef, "radius")?;
    let int = f.int_type()?;
    f.add_edge(radius, Edge::HasType, int)?;

    let area = f.create_named(class, Edge::HasMember, PyKind::FunctionDef, "area")?;
    let this = f.create_named(area, Edge::HasParameter, PyKind::Parameter, "self")?;
    let stmt = f.create_statement_node()?;
    f.get_mut(stmt)?.set_attr(Attr::Line, Value::Int(7));
    f.add_edge(area, Edge::HasBody, stmt)?;

    let call = f.create_call_node()?;
    f.add_edge(stmt, Edge::HasExpression, call)?;
    f.add_edge(call, Edge::Calls, radius)?;
    let receiver = f.create_named(call, Edge::HasArgument, PyKind::Identifier, "self")?;
    f.add_edge(receiver, Edge::RefersTo, this)?;
    Ok(f)
}

/// Execute the stat subcommand.
fn run_stat(file: &Path, json: bool) -> Result<(), StorageError> {
    let factory = open(file)?;
    let stat = AsgStat::collect(&factory);
    if json {
        let text = serde_json::to_string_pretty(&stat).unwrap_or_else(|e| {
            format!("{{\"error\": \"failed to serialize stats: {}\"}}", e)
        });
        println!("{}", text);
    } else {
        print!("{}", stat);
    }
    Ok(())
}

/// Execute the dot subcommand.
fn run_dot(file: &Path, filter: Option<&Path>) -> Result<(), StorageError> {
    let mut factory = open(file)?;
    if let Some(path) = filter {
        factory.load_filter_file(path)?;
    }
    println!("{}", to_stable_graph(&factory).to_dot());
    Ok(())
}

/// Execute the callers subcommand.
fn run_callers(file: &Path, id: NodeId) -> Result<(), StorageError> {
    let mut factory = open(file)?;
    factory.enable_reverse_edges(CALL_EDGES);
    let callers = factory.incoming_edges(id)?;
    if callers.is_empty() {
        println!("no callers of {}", id);
    }
    for &(_, source) in callers {
        let line = factory
            .get(source)?
            .parent()
            .and_then(|stmt| factory.get(stmt).ok())
            .and_then(|stmt| stmt.int_attr(Attr::Line));
        match line {
            Some(line) => println!("{} (line {})", source, line),
            None => println!("{}", source),
        }
    }
    Ok(())
}

/// Execute the filter subcommand.
fn run_filter(file: &Path, hide: &[u32], out: &Path) -> Result<(), StorageError> {
    let mut factory = open(file)?;
    for &id in hide {
        factory.set_filtered(NodeId(id))?;
    }
    factory.save_filter_file(out)?;
    println!(
        "{} of {} nodes filtered, written to {}",
        factory.filtered_count(),
        factory.node_count(),
        out.display()
    );
    Ok(())
}
