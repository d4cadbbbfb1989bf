use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use storygraph::{
    ConvertError, ConvertOptions, Diagnostic, Visibility, load_source, prepare_story,
    validate_document_value,
};
use storygraph_store::{
    GraphStore, ImportError, ImportOptions, SqliteGraphStore, StoredGraph, import_story,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_PATH: &str = "storygraph.db";

#[derive(Parser, Debug)]
#[command(name = "storygraph")]
#[command(about = "Convert, check and store branching story graphs")]
struct Cli {
    /// Log at debug level when STORYGRAPH_LOG is unset.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Convert(ConvertArgs),
    Check(CheckArgs),
    Import(ImportArgs),
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
struct OverrideArgs {
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    summary: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long, value_parser = parse_visibility)]
    visibility: Option<Visibility>,
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    #[arg(long)]
    input: PathBuf,
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    #[arg(long)]
    input: PathBuf,
    /// Validate the document as uploaded, without repairing it first.
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    target_slug: Option<String>,
    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(clap::Args, Debug)]
struct ShowArgs {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Convert(args) => convert_command(args),
        Commands::Check(args) => check_command(args),
        Commands::Import(args) => import_command(args).await,
        Commands::Show(args) => show_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("STORYGRAPH_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn convert_command(args: ConvertArgs) -> Result<ExitCode, String> {
    let raw = read_source(&args.input)?;
    let prepared = match prepare_story(&raw, &args.overrides.into_options()) {
        Ok(prepared) => prepared,
        Err(error) => return convert_failure(error),
    };
    print_diagnostics(&prepared.repairs);

    let json = serde_json::to_string_pretty(&prepared.payload).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn check_command(args: CheckArgs) -> Result<ExitCode, String> {
    let raw = read_source(&args.input)?;
    if args.strict {
        return Ok(match validate_document_value(&raw) {
            Ok(()) => {
                println!("ok: document is well formed");
                ExitCode::SUCCESS
            }
            Err(diagnostic) => {
                eprintln!("{diagnostic}");
                ExitCode::from(2)
            }
        });
    }

    let prepared = match prepare_story(&raw, &ConvertOptions::default()) {
        Ok(prepared) => prepared,
        Err(error) => return convert_failure(error),
    };
    print_diagnostics(&prepared.repairs);
    println!(
        "ok: {} nodes, {} paths, {} transitions",
        prepared.payload.nodes.len(),
        prepared.payload.paths.len(),
        prepared.payload.transitions.len()
    );
    Ok(ExitCode::SUCCESS)
}

async fn import_command(args: ImportArgs) -> Result<ExitCode, String> {
    let owner = resolve_owner(args.owner)?;
    let raw = read_source(&args.input)?;
    let store = open_store(args.db)?;

    let options = ImportOptions {
        visibility: args.overrides.visibility,
        convert: args.overrides.into_options(),
        target_slug: args.target_slug,
    };
    let outcome = match import_story(&store, &owner, &raw, &options).await {
        Ok(outcome) => outcome,
        Err(ImportError::Convert(error)) => return convert_failure(error),
        Err(error) => return Err(error.to_string()),
    };
    print_diagnostics(&outcome.repairs);

    let story = &outcome.story;
    println!("story: {}", story.slug);
    println!("id: {}", story.id);
    println!("owner: {}", story.owner);
    println!("title: {}", story.title);
    println!("visibility: {}", story.visibility);
    println!("revision: {}", story.revision);
    println!("nodes: {}", outcome.payload.nodes.len());
    println!("paths: {}", outcome.payload.paths.len());
    println!("transitions: {}", outcome.payload.transitions.len());
    println!("payload_hash: {}", story.payload_hash);
    Ok(ExitCode::SUCCESS)
}

async fn show_command(args: ShowArgs) -> Result<ExitCode, String> {
    let store = open_store(args.db)?;
    let graph = store
        .load_graph(&args.slug)
        .await
        .map_err(|e| e.to_string())?;

    if args.json {
        let json = serde_json::to_string_pretty(&graph).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        print_graph(&graph);
    }
    Ok(ExitCode::SUCCESS)
}

impl OverrideArgs {
    fn into_options(self) -> ConvertOptions {
        ConvertOptions {
            slug: self.slug,
            title: self.title,
            summary: self.summary,
            tags: (!self.tags.is_empty()).then_some(self.tags),
            visibility: self.visibility,
        }
    }
}

fn parse_visibility(value: &str) -> Result<Visibility, String> {
    Visibility::parse(value)
        .ok_or_else(|| format!("unknown visibility '{value}' (private, unlisted, public)"))
}

fn read_source(path: &Path) -> Result<Value, String> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("failed reading input '{}': {e}", path.display()))?;
    load_source(&bytes, &[]).map_err(|e| e.to_string())
}

fn resolve_owner(owner: Option<String>) -> Result<String, String> {
    owner
        .or_else(|| std::env::var("STORYGRAPH_OWNER").ok())
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
        .ok_or_else(|| "an owner is required: pass --owner or set STORYGRAPH_OWNER".to_string())
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteGraphStore, String> {
    let path = db
        .or_else(|| std::env::var_os("STORYGRAPH_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    tracing::debug!(path = %path.display(), "opening story database");
    SqliteGraphStore::open(&path).map_err(|e| e.to_string())
}

/// Validation failures exit 2; anything else is a plain error.
fn convert_failure(error: ConvertError) -> Result<ExitCode, String> {
    match error {
        ConvertError::Validation(error) => {
            for diagnostic in &error.diagnostics {
                eprintln!("{diagnostic}");
            }
            eprintln!("error: {error}");
            Ok(ExitCode::from(2))
        }
        other => Err(other.to_string()),
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

fn print_graph(graph: &StoredGraph) {
    let story = &graph.story;
    println!("story: {}", story.slug);
    println!("title: {}", story.title);
    println!("owner: {}", story.owner);
    println!("visibility: {}", story.visibility);
    println!("revision: {}", story.revision);
    if !story.tags.is_empty() {
        println!("tags: {}", story.tags.join(", "));
    }
    for node in &graph.nodes {
        println!("node {} [{}]", node.key, node.node_type);
        for transition in graph.outgoing(node.id) {
            let label = graph
                .path_by_id(transition.path_id)
                .map(|path| path.label.as_str())
                .unwrap_or("?");
            let target = transition
                .to_node_id
                .and_then(|id| graph.node_by_id(id))
                .map(|target| target.key.as_str())
                .unwrap_or("<end>");
            println!("  {}. {label} -> {target}", transition.ordering + 1);
        }
    }
}
