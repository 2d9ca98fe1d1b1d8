//! Sangraha daemon - centralized map-aggregation server.
//!
//! Loads configuration, builds the reference engine and the map server,
//! starts the merge worker, and runs until a shutdown signal arrives. A
//! periodic backup thread saves the merged map at the configured interval.
//!
//! Transport wiring (notification subscription, lookup and save-map RPC) is
//! deployment-specific and lives outside this binary; adapters receive the
//! server handle and call [`sangraha::SubmapNotifier`] / the query service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sangraha::{Config, MapServer, TrajectoryMapEngine};

struct Args {
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut result = Args { config_path: None };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    result.config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    result
}

fn print_help() {
    println!("sangraha - centralized map-aggregation server");
    println!();
    println!("USAGE:");
    println!("    sangraha [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>     Configuration file (default: sangraha.toml)");
    println!("    -h, --help              Print help information");
    println!();
    println!("CONFIGURATION:");
    println!("    All settings are configured via the TOML config file:");
    println!("    - [server] merged_map_folder, resource_folder, backup_interval_s");
    println!("    - [pipeline] submap_commands, global_map_commands (required)");
}

/// Resolve and load the daemon configuration.
///
/// A malformed or missing configuration is fatal: the server must not start
/// with a guessed pipeline.
fn load_config(args: &Args) -> Config {
    let candidates: Vec<String> = match &args.config_path {
        Some(path) => vec![path.clone()],
        None => vec![
            "sangraha.toml".to_string(),
            "/etc/sangraha.toml".to_string(),
        ],
    };

    for path in &candidates {
        match Config::from_file(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path);
                return config;
            }
            Err(e) => {
                log::warn!("Failed to load config {}: {}", path, e);
            }
        }
    }

    log::error!("No usable configuration found, aborting");
    std::process::exit(1);
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args();
    let config = load_config(&args);

    log::info!("sangraha starting");
    log::info!(
        "  Merged map folder: {}",
        config.server.merged_map_folder.display()
    );
    log::info!(
        "  Resource folder: {}",
        config.server.resource_folder.display()
    );
    log::info!("  Notification topic: {}", config.server.notification_topic);
    log::info!(
        "  Submap commands: {:?}",
        config.pipeline.submap_commands
    );
    log::info!(
        "  Global map commands: {:?}",
        config.pipeline.global_map_commands
    );
    if config.server.backup_interval_s > 0 {
        log::info!("  Backup interval: {}s", config.server.backup_interval_s);
    } else {
        log::info!("  Backups: disabled");
    }

    // Setup signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .expect("Error setting Ctrl-C handler");

    // Build engine and server
    let engine = TrajectoryMapEngine::new(config.server.resource_folder.clone());
    let server = Arc::new(MapServer::new(
        config.server.clone(),
        config.pipeline.clone(),
        engine,
    ));

    server.start();

    // Periodic backup thread: saves the merged map into the configured
    // folder while the daemon runs.
    let backup_thread = if config.server.backup_interval_s > 0 {
        let interval = Duration::from_secs(config.server.backup_interval_s);
        let backup_server = Arc::clone(&server);
        let backup_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("backup".into())
            .spawn(move || {
                let mut last_backup = Instant::now();
                while backup_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                    if last_backup.elapsed() >= interval {
                        if !backup_server.save_map(None) {
                            log::warn!("Periodic backup failed");
                        }
                        last_backup = Instant::now();
                    }
                }
            })
            .expect("Failed to spawn backup thread");
        Some(handle)
    } else {
        None
    };

    log::info!("Map server running");

    // Wait for shutdown signal (main thread just monitors)
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down...");
    server.shutdown();

    if let Some(handle) = backup_thread
        && let Err(e) = handle.join()
    {
        log::error!("Backup thread panicked: {:?}", e);
    }

    log::info!("sangraha shutdown complete");
}
