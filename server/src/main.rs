use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber;

use clap::{Arg, Command as ClapApp};

use terteryan_server::catalog::CatalogHandle;
use terteryan_server::derived::{spawn_worker, WorkerContext};
use terteryan_server::maintenance;
use terteryan_server::startup::{
    build_cors, build_router, load_config, log_startup_info, prepare_public_dirs,
};
use terteryan_server::state::AppState;
use terteryan_server::upload::FileStore;

fn main() {
    let matches = ClapApp::new("Terteryan Media Server")
        .version("1.0")
        .about("Catalog and upload server for the M. B. Terteryan memorial site")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE.json")
                .help("Path to config JSON file (overrides search)")
                .num_args(1),
        )
        .subcommand(
            ClapApp::new("sweep")
                .about("Delete uploaded files no catalog record references, past the grace period"),
        )
        .subcommand(
            ClapApp::new("clean-derived")
                .about("Blank derived photo files (thumbnails/medium/large), keeping .gitkeep"),
        )
        .subcommand(
            ClapApp::new("fix-derived")
                .about("Copy originals over missing or empty thumbnail files"),
        )
        .subcommand(
            ClapApp::new("update-durations")
                .about("Probe and persist missing audio track durations"),
        )
        .subcommand(
            ClapApp::new("warm")
                .about("Prefetch catalog images against a running server")
                .arg(Arg::new("base-url").required(true).help("e.g. http://127.0.0.1:8080")),
        )
        .get_matches();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        // initialize tracing subscriber (reads RUST_LOG env)
        tracing_subscriber::fmt::init();

        // warm needs no local configuration, only a server to talk to
        if let Some(sub) = matches.subcommand_matches("warm") {
            let base_url = sub
                .get_one::<String>("base-url")
                .map(String::as_str)
                .unwrap_or_default();
            if let Err(e) = maintenance::warm_cache(base_url).await {
                eprintln!("warm failed: {}", e);
                std::process::exit(1);
            }
            return;
        }

        let config = match load_config(matches.get_one::<String>("config").map(|s| s.into())) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading configuration: {}", e);
                std::process::exit(1);
            }
        };

        let public_dir = PathBuf::from(&config.public_dir);
        let catalog = CatalogHandle::spawn(config.catalog_path());

        if matches.subcommand_matches("sweep").is_some() {
            let grace = Duration::from_secs(
                config
                    .sweep_grace_hours
                    .unwrap_or(maintenance::DEFAULT_SWEEP_GRACE_HOURS)
                    * 3600,
            );
            match maintenance::sweep_orphans(&catalog, &public_dir, grace).await {
                Ok(report) => {
                    println!("scanned {} files, removed {}", report.scanned, report.deleted)
                }
                Err(e) => {
                    eprintln!("sweep failed: {}", e);
                    std::process::exit(1);
                }
            }
            return;
        }
        if matches.subcommand_matches("clean-derived").is_some() {
            if let Err(e) = maintenance::clean_derived(&public_dir) {
                eprintln!("clean-derived failed: {}", e);
                std::process::exit(1);
            }
            return;
        }
        if matches.subcommand_matches("fix-derived").is_some() {
            if let Err(e) = maintenance::fix_derived(&public_dir) {
                eprintln!("fix-derived failed: {}", e);
                std::process::exit(1);
            }
            return;
        }
        if matches.subcommand_matches("update-durations").is_some() {
            let ffprobe = config.ffprobe_path.clone().unwrap_or_else(|| "ffprobe".to_string());
            if let Err(e) = maintenance::update_durations(&catalog, &public_dir, &ffprobe).await {
                eprintln!("update-durations failed: {}", e);
                std::process::exit(1);
            }
            return;
        }

        prepare_public_dirs(&public_dir);

        let ffmpeg_enabled = config.ffmpeg_enabled.unwrap_or(false);
        let jobs = spawn_worker(WorkerContext {
            catalog: catalog.clone(),
            public_dir: public_dir.clone(),
            ffmpeg_enabled,
            ffmpeg_path: config.ffmpeg_path.clone().unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: config.ffprobe_path.clone().unwrap_or_else(|| "ffprobe".to_string()),
        });

        let state = Arc::new(AppState {
            catalog: catalog.clone(),
            jobs,
            store: FileStore::new(public_dir.clone()),
            http: reqwest::Client::new(),
            ffmpeg_enabled,
        });

        // periodic orphan sweep, when configured
        if let Some(mins) = config.sweep_interval_minutes {
            let sweep_catalog = catalog.clone();
            let sweep_dir = public_dir.clone();
            let grace = Duration::from_secs(
                config
                    .sweep_grace_hours
                    .unwrap_or(maintenance::DEFAULT_SWEEP_GRACE_HOURS)
                    * 3600,
            );
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(mins * 60));
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    match maintenance::sweep_orphans(&sweep_catalog, &sweep_dir, grace).await {
                        Ok(report) => tracing::info!(
                            "sweep: scanned {}, removed {}",
                            report.scanned,
                            report.deleted
                        ),
                        Err(e) => tracing::error!("sweep failed: {}", e),
                    }
                }
            });
        }

        let app = build_router(state, public_dir).layer(build_cors(&config));

        log_startup_info(&config);

        let host = config.host.unwrap_or_else(|| "127.0.0.1".to_string());
        let port = config.port.unwrap_or(8080);
        let bind_addr = format!("{}:{}", host, port);
        tracing::info!("listening on {}", bind_addr);

        axum::Server::bind(&bind_addr.parse().expect("Invalid bind address"))
            .serve(app.into_make_service())
            .await
            .expect("server error");
    });
}
