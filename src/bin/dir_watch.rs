use dirpick::directory_loader::{DirectoryLoader, FsScanner, LoadSubscriber, NotifyWatcher};
use dirpick::log::init_stderr_tracing;
use dirpick::{LoadEvent, PickerConfig};
use mimalloc::MiMalloc;
use std::sync::mpsc;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

enum Message {
    Load(LoadEvent),
    Shutdown,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let show_hidden = args.iter().any(|arg| arg == "--hidden");
    let path = args
        .iter()
        .find(|arg| !arg.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| ".".to_string());

    if let Err(e) = init_stderr_tracing(Some("info")) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let config = PickerConfig::new(&path).with_show_hidden(show_hidden);
    let loader = DirectoryLoader::new(
        Arc::new(FsScanner::from_config(&config)),
        Arc::new(NotifyWatcher::from_config(&config)),
    );

    let (tx, rx) = mpsc::channel();
    let ctrlc_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Message::Shutdown);
    }) {
        eprintln!("Failed to install Ctrl-C handler: {e}");
        std::process::exit(1);
    }

    let subscriber: Arc<dyn LoadSubscriber> = Arc::new(move |event: LoadEvent| {
        let _ = tx.send(Message::Load(event));
    });
    if let Err(e) = loader.start(&config.root, subscriber) {
        eprintln!("Cannot watch {path}: {e}");
        std::process::exit(1);
    }

    println!("Watching {path} (Ctrl-C to stop)");
    for message in rx {
        match message {
            Message::Load(LoadEvent::Snapshot(snapshot)) => {
                println!(
                    "--- {} (generation {}, {} entries)",
                    snapshot.path.display(),
                    snapshot.generation,
                    snapshot.len()
                );
                for entry in &snapshot.entries {
                    let marker = if entry.is_directory { "/" } else { "" };
                    match entry.size {
                        Some(size) => println!("  {}{}  {} bytes", entry.name, marker, size),
                        None => println!("  {}{}", entry.name, marker),
                    }
                }
            }
            Message::Load(LoadEvent::DirectoryGone { path, error }) => {
                println!("--- {} is gone: {}", path.display(), error);
            }
            Message::Shutdown => break,
        }
    }

    loader.shutdown();
    println!("Stopped");
}
