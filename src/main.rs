//! MindMeld native
//!
//! Records a browsing session as a graph of pages and navigations and shows it
//! as an interactive mind map. The browser side feeds tab and navigation events
//! as JSON lines on stdin.

mod app;
mod graph;
mod host;
mod interaction;
mod session;
mod settings;
mod store;
mod theme;

use eframe::egui;
use session::{Dispatcher, SessionLifecycle};
use settings::Settings;
use std::sync::{mpsc, Arc};
use store::{FileStore, KeyValueStore, MemoryStore};

fn main() -> eframe::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = Settings::load();
    let (store, store_label) = open_store(&settings);

    match SessionLifecycle::new(store.clone()).install_defaults() {
        Ok(true) => tracing::info!("Initialized an empty session"),
        Ok(false) => {}
        Err(e) => tracing::error!("Failed to initialize session defaults: {}", e),
    }

    // Browser events: stdin -> channel -> dispatcher
    let (tx, rx) = mpsc::channel();
    if let Err(e) = host::spawn_stdin_reader(tx) {
        tracing::error!("Failed to start host reader: {}", e);
    }
    let dispatcher = Dispatcher::new(store.clone());
    if let Err(e) = std::thread::Builder::new()
        .name("dispatcher".into())
        .spawn(move || dispatcher.run(rx))
    {
        tracing::error!("Failed to start dispatcher: {}", e);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("MindMeld Research Map"),
        persist_window: true,
        ..Default::default()
    };

    eframe::run_native(
        "MindMeld Research Map",
        options,
        Box::new(move |cc| Ok(Box::new(app::MindMapApp::new(cc, store, store_label, settings)))),
    )
}

/// Open the session file, or fall back to memory so the app still runs
fn open_store(settings: &Settings) -> (Arc<dyn KeyValueStore>, String) {
    let path = settings
        .data_dir
        .as_ref()
        .map(|dir| dir.join("session.json"))
        .or_else(FileStore::default_path);

    let Some(path) = path else {
        tracing::warn!("No data directory available, session will not be persisted");
        return (Arc::new(MemoryStore::new()), "in memory".to_string());
    };

    match FileStore::open(path.clone()) {
        Ok(store) => {
            tracing::info!("Session store at {:?}", path);
            (Arc::new(store), path.display().to_string())
        }
        Err(e) => {
            tracing::error!("Failed to open {:?}: {}; keeping this session in memory", path, e);
            (Arc::new(MemoryStore::new()), "in memory (store unreadable)".to_string())
        }
    }
}
