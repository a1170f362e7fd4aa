use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sdkreg::classpath::{MirrorJobs, MirrorOutcome};
use sdkreg::config::ConfigLoader;
use sdkreg::sdk::{FileStore, LayoutSdkFactory, SdkFactory, UpdateReport};
use sdkreg::{ContainerPath, PathResolver, SdkManager};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Registry of installed development kits
///
/// Registers kit installations per namespace and resolves build-path
/// container paths against them.
#[derive(Parser, Debug)]
#[command(name = "sdkreg")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Registry namespace (defaults to the configured namespace, then "gwt")
    #[arg(short, long)]
    namespace: Option<String>,

    /// Kit layout used to build and validate entries (defaults to the namespace)
    #[arg(long)]
    layout: Option<String>,

    /// Log level (trace, debug, info, warn, error); defaults to the
    /// configured level, then warn
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered SDKs
    List {
        #[arg(long)]
        json: bool,
    },
    /// Register an SDK, replacing any SDK with the same name
    Add {
        name: String,
        path: PathBuf,
        /// Make it the default SDK
        #[arg(long)]
        default: bool,
        /// Register even if the installation does not validate
        #[arg(long)]
        force: bool,
    },
    /// Unregister an SDK
    Remove { name: String },
    /// Make a registered SDK the default
    Default { name: String },
    /// Resolve a container path to its build-path entries
    Resolve {
        path: String,
        /// Copy the resolved libraries into this folder
        #[arg(long)]
        mirror_to: Option<PathBuf>,
    },
    /// Validate every registered SDK
    Validate,
    /// List known kit layouts
    Layouts,
}

#[derive(Serialize)]
struct SdkRow {
    name: String,
    location: PathBuf,
    default: bool,
    problem: Option<String>,
}

fn setup_logging(log_level: &str, log_file: Option<PathBuf>) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    Ok(())
}

fn print_report(report: &UpdateReport) -> Result<()> {
    for update in report.event.updates() {
        println!("{}: {}", update.kind, update.sdk);
    }
    if !report.persisted {
        bail!("The SDK registry could not be saved; see the log for details");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new().context("Failed to load configuration")?;

    let log_level = args
        .log_level
        .or(config.settings().log_level)
        .unwrap_or_else(|| "warn".to_string());
    setup_logging(&log_level, args.log_file)?;
    debug!("Starting sdkreg v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Layouts = args.command {
        for layout in config.list_layouts() {
            println!("{}\t{}\t{}", layout.name, layout.container_id, layout.description);
        }
        return Ok(());
    }

    let namespace = args.namespace.unwrap_or_else(|| config.namespace());
    let layout_name = args.layout.unwrap_or_else(|| namespace.clone());
    let layout = config.get_layout(&layout_name)?;
    let container_id = layout.container_id.clone();
    let factory = LayoutSdkFactory::new(layout);

    let data_dir = config.data_dir()?;
    info!("Namespace '{}' stored under {}", namespace, data_dir.display());

    let manager = Arc::new(SdkManager::new(
        namespace,
        Arc::new(FileStore::new(data_dir)),
        Arc::new(factory.clone()),
    ));

    match args.command {
        Command::List { json } => {
            let sdks = manager.get_sdks();
            let default = sdks.default_sdk().map(|s| s.name().to_string());
            let rows: Vec<SdkRow> = sdks
                .iter()
                .map(|sdk| SdkRow {
                    name: sdk.name().to_string(),
                    location: sdk.install_path().to_path_buf(),
                    default: default.as_deref() == Some(sdk.name()),
                    problem: sdk.validate().message().map(str::to_string),
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No SDKs registered in '{}'", manager.namespace());
            } else {
                for row in rows {
                    let marker = if row.default { "*" } else { " " };
                    let problem = row.problem.map(|p| format!("  ({})", p)).unwrap_or_default();
                    println!("{} {}\t{}{}", marker, row.name, row.location.display(), problem);
                }
            }
        }
        Command::Add {
            name,
            path,
            default,
            force,
        } => {
            let path = std::path::absolute(&path)
                .with_context(|| format!("Invalid install path {}", path.display()))?;
            let sdk = factory.new_instance(&name, &path);

            if let Some(problem) = sdk.validate().message() {
                if !force {
                    bail!("{} (use --force to register it anyway)", problem);
                }
                eprintln!("warning: {}", problem);
            }

            let mut sdks = manager.get_sdks();
            sdks.add(sdk.clone());
            if default {
                sdks.set_default(&sdk);
            }
            print_report(&manager.set_sdks(sdks)?)?;
        }
        Command::Remove { name } => {
            let mut sdks = manager.get_sdks();
            if sdks.remove_name(&name).is_none() {
                bail!("No SDK named '{}' is registered", name);
            }
            print_report(&manager.set_sdks(sdks)?)?;
        }
        Command::Default { name } => {
            let mut sdks = manager.get_sdks();
            let Some(sdk) = sdks.find_by_name(&name).cloned() else {
                bail!("No SDK named '{}' is registered", name);
            };
            sdks.set_default(&sdk);
            print_report(&manager.set_sdks(sdks)?)?;
        }
        Command::Resolve { path, mirror_to } => {
            let path = ContainerPath::parse(&path)?;
            let resolver = PathResolver::new(Arc::clone(&manager), container_id);
            let container = resolver.resolve(&path);

            println!("{}", serde_json::to_string_pretty(&container)?);

            if let Some(problem) = container.problem() {
                bail!("{}", problem);
            }

            if let Some(dest) = mirror_to {
                let jobs = MirrorJobs::new(tokio::runtime::Handle::current());
                let files = container.entries.iter().map(|e| e.path.clone()).collect();
                if let MirrorOutcome::Copied(count) = jobs.spawn("cli", dest.clone(), files).await?? {
                    eprintln!("Copied {} file(s) to {}", count, dest.display());
                }
            }
        }
        Command::Validate => {
            let sdks = manager.get_sdks();
            let mut invalid = 0;
            for sdk in &sdks {
                match sdk.validate().message() {
                    None => println!("ok\t{}", sdk),
                    Some(problem) => {
                        invalid += 1;
                        println!("error\t{}\t{}", sdk, problem);
                    }
                }
            }
            if invalid > 0 {
                bail!("{} of {} SDK(s) failed validation", invalid, sdks.len());
            }
        }
        Command::Layouts => unreachable!("handled before the registry is opened"),
    }

    Ok(())
}
