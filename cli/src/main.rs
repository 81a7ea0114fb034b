use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use forage_cli::journal::{SharedJournal, spawn_journal_printer};
use forage_cli::{commands, readline};
use forage_core::gateway::{HttpDiscoveryGateway, LocalDiscoveryGateway};
use forage_core::{
    AppConfig, DiscoveryGateway, FileCatalogProvider, GatherHandle, GatherService,
    GatherSessionController, Journal,
};
use forage_types::CharacterId;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Resource gathering minigame")]
struct Args {
    /// Character to gather as (overrides the stored config)
    #[arg(long)]
    character: Option<String>,
    /// Catalog TOML file
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Base URL of the discovery service; discoveries stay local when unset
    #[arg(long)]
    discovery_url: Option<String>,
    /// Store the overrides above in the config file
    #[arg(long)]
    save: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_logging();

    let args = Args::parse();
    let mut config = AppConfig::load();
    if let Some(character) = args.character {
        config.character_id = CharacterId::from(character);
    }
    if let Some(catalog) = args.catalog {
        config.catalog_path = catalog;
    }
    if args.discovery_url.is_some() {
        config.discovery_url = args.discovery_url;
    }
    if args.save {
        config.save().map_err(|e| e.to_string())?;
        tracing::info!("Config saved");
    }

    let provider = FileCatalogProvider::new(&config.catalog_path);
    let controller = GatherSessionController::from_provider(
        &provider,
        config.character_id.clone(),
        config.timing.clone(),
    );
    tracing::info!(
        character = %config.character_id,
        catalog = %config.catalog_path.display(),
        resources = controller.catalog().resources().len(),
        "Catalog loaded"
    );

    let handle = match &config.discovery_url {
        Some(url) => {
            tracing::info!(%url, "Recording discoveries remotely");
            start(controller, HttpDiscoveryGateway::new(url.clone()))
        }
        None => start(controller, LocalDiscoveryGateway::new()),
    };

    let journal: SharedJournal = Arc::new(Mutex::new(Journal::default()));
    spawn_journal_printer(handle.subscribe(), Arc::clone(&journal));

    loop {
        let Some(line) = readline()? else {
            commands::exit(&handle).await;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &handle, &journal, &config).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

fn start<G: DiscoveryGateway>(controller: GatherSessionController, gateway: G) -> GatherHandle {
    let (handle, _task) = GatherService::spawn(controller, Arc::new(gateway));
    handle
}

/// Log to `FORAGE_LOG_PATH` if set, otherwise stderr. Level comes from
/// `RUST_LOG`, defaulting to info.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Ok(path) = std::env::var("FORAGE_LOG_PATH") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser)]
#[command(about = "forage")]
struct Repl {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources ([x] discovered, * in the auto-gather set)
    Resources,
    /// List elements
    Elements,
    /// Select a resource, or deselect it if already selected
    Select { resource: String },
    /// Add an element, or remove it if already selected
    Toggle { element: String },
    /// Add an element even if it is already selected
    Add { element: String },
    /// Remove one occurrence of an element
    Remove { element: String },
    /// Clear the element selection
    Clear,
    /// Add or remove a discovered resource from the auto-gather set
    AutoMember { resource: String },
    /// Start auto-gather, or stop it if running
    Auto,
    Status,
    Journal,
    /// Show the active configuration and where it is stored
    Config,
    Exit,
}

async fn respond(
    line: &str,
    handle: &GatherHandle,
    journal: &SharedJournal,
    config: &AppConfig,
) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting\n")?;
    args.insert(0, "forage".to_string());
    let repl = Repl::try_parse_from(args).map_err(|e| e.to_string())?;

    match &repl.command {
        Some(Commands::Resources) => commands::list_resources(handle).await?,
        Some(Commands::Elements) => commands::list_elements(handle).await?,
        Some(Commands::Select { resource }) => commands::select(handle, resource, &config.timing).await?,
        Some(Commands::Toggle { element }) => commands::toggle(handle, element).await?,
        Some(Commands::Add { element }) => commands::add(handle, element).await?,
        Some(Commands::Remove { element }) => commands::remove(handle, element).await?,
        Some(Commands::Clear) => commands::clear(handle).await?,
        Some(Commands::AutoMember { resource }) => commands::auto_member(handle, resource).await?,
        Some(Commands::Auto) => commands::toggle_auto(handle).await?,
        Some(Commands::Status) => commands::show_status(handle, &config.timing).await?,
        Some(Commands::Journal) => commands::show_journal(journal)?,
        Some(Commands::Config) => commands::show_config(config),
        Some(Commands::Exit) => {
            commands::exit(handle).await;
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
