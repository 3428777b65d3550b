use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use capsula_core::{
    Callable, Capsule, CaptureConfig, DEFAULT_GROUP, Dynamic, Literal, Map, PositionalPolicy,
    decode,
};
use capsula_store::{DataItem, container_sandbox};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "capsula", about = "Save script functions into a container and run them later")]
struct Cli {
    /// Container file (falls back to CAPSULA_CONTAINER)
    #[arg(long, global = true)]
    container: Option<PathBuf>,

    /// Group holding capsules
    #[arg(long, global = true, default_value = DEFAULT_GROUP)]
    group: String,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a function from a script file and save it
    Attach {
        /// Script file defining the function
        file: PathBuf,

        /// Function to capture when the file defines several
        #[arg(long)]
        function: Option<String>,

        /// Slot name (defaults to the function name)
        #[arg(long)]
        slot: Option<String>,

        /// Text prepended to the function's doc comments
        #[arg(long)]
        description: Option<String>,

        /// Default positional argument as JSON; a bare word is a string (repeatable)
        #[arg(long = "arg", value_name = "JSON")]
        args: Vec<String>,

        /// Default keyword argument; a bare word value is a string (repeatable)
        #[arg(long = "kwarg", value_name = "KEY=JSON")]
        kwargs: Vec<String>,
    },

    /// Load a saved function and call it
    Run {
        /// Slot to run
        slot: String,

        /// Positional argument as JSON or a bare word, replacing the stored ones (requires --replace-args)
        #[arg(long = "arg", value_name = "JSON")]
        args: Vec<String>,

        /// Keyword argument overriding the stored default; a bare word value is a string (repeatable)
        #[arg(long = "kwarg", value_name = "KEY=JSON")]
        kwargs: Vec<String>,

        /// Allow --arg to replace the stored positional arguments
        #[arg(long)]
        replace_args: bool,
    },

    /// List saved functions
    List,

    /// Show one saved function with its source
    Show {
        slot: String,
    },

    /// Plain data groups
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Write a data group, replacing any existing one
    Add {
        /// Group name, e.g. simulations/ExampleData
        name: String,

        /// Group docstring
        #[arg(long, default_value = "")]
        doc: String,

        /// Series as a JSON number array (repeatable)
        #[arg(long = "item", value_name = "NAME=JSON", required = true)]
        items: Vec<String>,
    },

    /// List data groups
    List,
}

fn container_path(cli: &Cli) -> Result<PathBuf> {
    cli.container
        .clone()
        .or_else(|| std::env::var("CAPSULA_CONTAINER").ok().map(PathBuf::from))
        .context("no container given; pass --container or set CAPSULA_CONTAINER")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Attach {
            file,
            function,
            slot,
            description,
            args,
            kwargs,
        } => cmd_attach(
            &cli,
            file,
            function.as_deref(),
            slot.as_deref(),
            description.as_deref(),
            args,
            kwargs,
        ),
        Commands::Run {
            slot,
            args,
            kwargs,
            replace_args,
        } => cmd_run(&cli, slot, args, kwargs, *replace_args),
        Commands::List => cmd_list(&cli),
        Commands::Show { slot } => cmd_show(&cli, slot),
        Commands::Data { command } => match command {
            DataCommands::Add { name, doc, items } => cmd_data_add(&cli, name, doc, items),
            DataCommands::List => cmd_data_list(&cli),
        },
    }
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// JSON text as a script value.
///
/// Text that does not look like JSON (a bare word such as `distance`) is
/// taken as a string. Text that looks like JSON must decode.
fn parse_value(text: &str) -> Result<Dynamic> {
    let trimmed = text.trim();
    let json_shaped = matches!(trimmed, "true" | "false" | "null")
        || trimmed
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '"' | '[' | '{'));
    if !json_shaped {
        return Ok(Dynamic::from(text.to_string()));
    }
    let literal = decode(trimmed).with_context(|| format!("`{text}` is not a valid JSON value"))?;
    Ok(literal.to_dynamic())
}

fn parse_keyword(text: &str) -> Result<(String, Dynamic)> {
    let (key, value) = text
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got `{text}`"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("empty keyword name in `{text}`");
    }
    Ok((key.to_string(), parse_value(value)?))
}

fn parse_series(text: &str) -> Result<DataItem> {
    let (name, values) = text
        .split_once('=')
        .with_context(|| format!("expected NAME=[numbers], got `{text}`"))?;
    let literal = decode(values).with_context(|| format!("series `{name}` is not JSON"))?;
    let Literal::Array(items) = literal else {
        bail!("series `{name}` must be a JSON array");
    };
    let values = items
        .into_iter()
        .map(|item| match item {
            Literal::Int(i) => Ok(i as f64),
            Literal::Float(f) => Ok(f),
            other => bail!("series `{name}` holds a {} value", other.kind()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DataItem::new(name, values))
}

/// Script values print as their JSON literal when they have one.
fn render(value: Dynamic) -> String {
    let fallback = value.to_string();
    Literal::from_dynamic(value)
        .map(|literal| literal.to_string())
        .unwrap_or(fallback)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_attach(
    cli: &Cli,
    file: &Path,
    function: Option<&str>,
    slot: Option<&str>,
    description: Option<&str>,
    args: &[String],
    kwargs: &[String],
) -> Result<()> {
    let path = container_path(cli)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let callable = match function {
        Some(name) => Callable::script_named(name, text),
        None => Callable::script(text),
    };

    let mut config = CaptureConfig::default().group(cli.group.as_str());
    if let Some(slot) = slot {
        config = config.slot(slot);
    }
    if let Some(description) = description {
        config = config.description(description);
    }
    for arg in args {
        config = config.arg(parse_value(arg)?);
    }
    for kwarg in kwargs {
        let (key, value) = parse_keyword(kwarg)?;
        config = config.kwarg(key, value);
    }

    let capsule = capsula_store::attach_function(&path, &callable, &config)
        .with_context(|| format!("failed to attach {}", file.display()))?;
    println!("saved {}", capsule.record());
    Ok(())
}

fn cmd_run(
    cli: &Cli,
    slot: &str,
    args: &[String],
    kwargs: &[String],
    replace_args: bool,
) -> Result<()> {
    let path = container_path(cli)?;
    let record = capsula_store::load(&path, &cli.group, slot)
        .with_context(|| format!("failed to load `{slot}`"))?;

    let policy = if replace_args {
        PositionalPolicy::Overridable
    } else {
        PositionalPolicy::Locked
    };
    let options = container_sandbox().positional(policy);
    let capsule = Capsule::build_with(&record, path.to_string_lossy(), &options)
        .with_context(|| format!("failed to rebuild `{slot}`"))?;

    let positional = args
        .iter()
        .map(|a| parse_value(a))
        .collect::<Result<Vec<_>>>()?;
    let mut overrides = Map::new();
    for kwarg in kwargs {
        let (key, value) = parse_keyword(kwarg)?;
        overrides.insert(key.into(), value);
    }

    let result = capsule
        .invoke(positional, overrides)
        .with_context(|| format!("`{slot}` failed"))?;
    println!("{}", render(result));
    Ok(())
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let path = container_path(cli)?;
    let records = capsula_store::list_all_saved_functions(&path, &cli.group)
        .context("failed to list saved functions")?;

    if records.is_empty() {
        println!("(no saved functions in {})", cli.group);
    }
    for record in &records {
        println!("{record}");
    }
    Ok(())
}

fn cmd_show(cli: &Cli, slot: &str) -> Result<()> {
    let path = container_path(cli)?;
    let record = capsula_store::load(&path, &cli.group, slot)
        .with_context(|| format!("failed to load `{slot}`"))?;

    println!("{record}");
    println!();
    println!("{}", record.source());
    Ok(())
}

fn cmd_data_add(cli: &Cli, name: &str, doc: &str, items: &[String]) -> Result<()> {
    let path = container_path(cli)?;
    let items = items
        .iter()
        .map(|item| parse_series(item))
        .collect::<Result<Vec<_>>>()?;

    capsula_store::add_data(&path, name, doc, &items)
        .with_context(|| format!("failed to write data group `{name}`"))?;
    println!("saved {} series into {name}", items.len());
    Ok(())
}

fn cmd_data_list(cli: &Cli) -> Result<()> {
    let path = container_path(cli)?;
    let groups =
        capsula_store::list_all_saved_data(&path).context("failed to list data groups")?;

    if groups.is_empty() {
        println!("(no data groups)");
    }
    for group in &groups {
        println!("{}: {}", group.name, group.slots.join(", "));
        if !group.docstring.is_empty() {
            println!("    {}", group.docstring);
        }
    }
    Ok(())
}
