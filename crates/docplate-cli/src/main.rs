use clap::{Parser, Subcommand};
use docplate::{EngineOptions, Escape, PathParser, Scope, Templater};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docplate")]
#[command(about = "docplate: fill placeholder templates inside office documents")]
#[command(version)]
struct Cli {
    /// Log rendering progress (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template document with JSON data
    Render {
        /// Template document (.xlsx)
        input: PathBuf,

        /// Output file [default: <input>-rendered.<ext> next to the input]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document type, when the input has no usable extension
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Template data as a JSON object
        #[arg(short, long, conflicts_with = "data_file")]
        data: Option<String>,

        /// Read template data from a JSON file
        #[arg(long)]
        data_file: Option<PathBuf>,

        /// Custom placeholder pattern; capture group 1 is the expression
        #[arg(long)]
        tag_finder: Option<String>,
    },

    /// List the supported document types
    Types,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Render {
            input,
            output,
            kind,
            data,
            data_file,
            tag_finder,
        } => cmd_render(
            &input,
            output,
            kind.as_deref(),
            read_data(data, data_file),
            tag_finder.as_deref(),
        ),
        Command::Types => {
            for kind in docplate::supported_types() {
                println!("{kind}");
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_data(data: Option<String>, data_file: Option<PathBuf>) -> Scope {
    let text = match (data, data_file) {
        (Some(text), _) => text,
        (None, Some(path)) => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        (None, None) => return Scope::new(),
    };

    let value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Invalid data: {e}");
            std::process::exit(1);
        }
    };
    match Scope::from_value(value) {
        Some(scope) => scope,
        None => {
            eprintln!("Invalid data: expected a JSON object");
            std::process::exit(1);
        }
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}-rendered.{}", ext.to_string_lossy()),
        None => format!("{stem}-rendered"),
    };
    input.with_file_name(name)
}

fn cmd_render(
    input: &Path,
    output: Option<PathBuf>,
    kind: Option<&str>,
    scope: Scope,
    tag_finder: Option<&str>,
) {
    let mut options = EngineOptions::new().with_escape(Escape::Xml);
    if let Some(pattern) = tag_finder {
        options = match options.with_tag_finder(pattern) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        };
    }

    tracing::debug!(input = %input.display(), vars = scope.len(), "cmd_render: rendering");
    let templater = Templater::with_options(PathParser, options);
    let bytes = match futures::executor::block_on(templater.render_with_scope(input, kind, &scope))
    {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Render error: {e}");
            std::process::exit(1);
        }
    };

    let output = output.unwrap_or_else(|| default_output(input));
    if let Err(e) = std::fs::write(&output, &bytes) {
        eprintln!("Error writing {}: {e}", output.display());
        std::process::exit(1);
    }

    eprintln!("Rendered: {}", output.display());
}
