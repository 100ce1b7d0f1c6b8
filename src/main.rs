//! Prefs CLI - merge and resolve scoped preferences.

use clap::Parser;
use prefs::cli::{Cli, Commands, ConfigCommands};
use prefs::commands::{self, ListFilter, Lookup, Output};
use prefs::config::{ConfigOverrides, ResolvedSettings, resolve_settings};
use prefs::definitions::FileSource;
use prefs::events::EventBus;
use prefs::merge::MergeEngine;
use prefs::service::PreferencesService;
use prefs::storage::open_store;
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let result = resolve(&cli).and_then(|settings| {
        init_tracing(&settings.log_level.value);
        run_command(cli.command, &settings, human)
    });

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            if human {
                eprintln!("Error: {}", e);
            } else {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
            }
            process::exit(1);
        }
    }
}

/// Resolve settings from flags, environment and config.kdl.
fn resolve(cli: &Cli) -> Result<ResolvedSettings, prefs::Error> {
    let mut overrides = ConfigOverrides::new().with_definitions(cli.definitions.clone());
    if let Some(ref path) = cli.config {
        overrides = overrides.with_config_path(path);
    }
    if let Some(ref db) = cli.database {
        overrides = overrides.with_database(db);
    }
    match cli.verbose {
        0 => {}
        1 => overrides = overrides.with_log_level("info"),
        _ => overrides = overrides.with_log_level("debug"),
    }
    resolve_settings(&overrides)
}

/// Install the stderr log subscriber. stdout carries command output only.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Open the store and wire the merge engine and service.
fn build_service(settings: &ResolvedSettings) -> Result<PreferencesService, prefs::Error> {
    let store = open_store(&settings.database.value)?;
    let events = EventBus::new();
    let source = FileSource::new(settings.definitions.value.clone());
    let engine = MergeEngine::new(Box::new(source), store.clone(), events.clone());
    tracing::debug!(
        store = %store.location(),
        backend = store.backend_type(),
        definitions = %engine.source(),
        "service ready"
    );
    Ok(PreferencesService::new(store, Arc::new(engine), events))
}

/// Run a command. Returns `Ok(false)` when the command reported a failure
/// in its own output.
fn run_command(
    command: Commands,
    settings: &ResolvedSettings,
    human: bool,
) -> Result<bool, prefs::Error> {
    // Commands that never touch the store
    match command {
        Commands::Check { ref files } => {
            let result = commands::check(files);
            output(&result, human);
            return Ok(result.valid);
        }
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            output(&commands::config_show(settings), human);
            return Ok(true);
        }
        _ => {}
    }

    let service = build_service(settings)?;

    if settings.merge_on_startup.value && !matches!(command, Commands::Merge { .. }) {
        service.reload_initial_preferences()?;
    }

    match command {
        Commands::Merge { no_wait } => {
            let result = commands::merge(&service, !no_wait)?;
            output(&result, human);
            Ok(result.is_clean())
        }
        Commands::List {
            scope,
            owner,
            group,
            pref_type,
        } => {
            let filter = ListFilter {
                scope,
                owner,
                group,
                pref_type,
            };
            output(&commands::list(&service, &filter)?, human);
            Ok(true)
        }
        Commands::Get {
            full_key,
            scope,
            owner,
            key,
        } => {
            let lookup = match (full_key, scope, key) {
                (Some(full_key), _, _) => Lookup::FullKey(full_key),
                (None, Some(scope), Some(key)) => Lookup::Parts { scope, owner, key },
                _ => {
                    return Err(prefs::Error::InvalidKey(
                        "give a full key or --scope and --key".to_string(),
                    ));
                }
            };
            output(&commands::get(&service, &lookup)?, human);
            Ok(true)
        }
        Commands::Set(args) => {
            output(
                &commands::set(&service, &args.full_key, &args.to_change())?,
                human,
            );
            Ok(true)
        }
        Commands::Create(args) => {
            output(
                &commands::create(&service, &args.full_key, &args.to_change())?,
                human,
            );
            Ok(true)
        }
        Commands::Delete { full_key } => {
            output(&commands::delete(&service, &full_key)?, human);
            Ok(true)
        }
        Commands::Export { output: Some(path) } => {
            output(&commands::export_to(&service, &path)?, human);
            Ok(true)
        }
        Commands::Export { output: None } => {
            let text = commands::export(&service)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(true)
        }
        Commands::Check { .. } | Commands::Config { .. } => Ok(true),
    }
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
