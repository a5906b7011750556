//! Quill demo — two in-process replicas editing one document.
//!
//! Runs two sessions on a single-threaded tokio runtime, relays document
//! and presence updates between them by hand, and logs what each side
//! sees. Set `RUST_LOG=debug` (or `trace`) for the library's own logging.
//!
//! ```text
//! quill-demo [options.json]
//! ```
//!
//! The optional file holds binding options, e.g.
//! `{"preserveUndoStack": false, "cursorWidth": 3}`.

mod session;

use std::error::Error;
use std::time::Duration;

use log::info;
use quill_collab::{AwarenessConfig, BindingOptions, ExpiryMonitor, Position};
use session::Session;
use tokio::task::LocalSet;

/// Short enough that the demo shows an eviction in a few seconds.
const DEMO_TIMEOUT: Duration = Duration::from_secs(2);

fn load_options() -> Result<BindingOptions, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading binding options from {path}");
            Ok(BindingOptions::from_json(&std::fs::read_to_string(path)?)?)
        }
        None => Ok(BindingOptions::default()),
    }
}

async fn run(options: BindingOptions) -> Result<(), Box<dyn Error>> {
    let config = AwarenessConfig {
        outdated_timeout: DEMO_TIMEOUT,
    };
    let alice = Session::new("Alice", 1, config, options.clone());
    let bob = Session::new("Bob", 2, config, options);
    let monitors = [
        ExpiryMonitor::spawn_local(&alice.awareness),
        ExpiryMonitor::spawn_local(&bob.awareness),
    ];

    // ── Text ────────────────────────────────────────────────────
    alice.type_text("Hello from Alice.\n");
    bob.pull_document(&alice)?;
    info!("[{}] sees {:?}", bob.name, bob.text());

    bob.move_to_end();
    bob.type_text("Bob says hi.");
    alice.type_text("Shared line: ");
    alice.pull_document(&bob)?;
    bob.pull_document(&alice)?;
    info!("[{}] sees {:?}", alice.name, alice.text());
    info!("[{}] sees {:?}", bob.name, bob.text());
    if alice.text() != bob.text() {
        return Err("replicas diverged".into());
    }

    // ── Presence ────────────────────────────────────────────────
    bob.select(Position::new(1, 0), Position::new(1, 3));
    alice.pull_presence(&bob)?;
    bob.pull_presence(&alice)?;
    alice.log_cursors();
    bob.log_cursors();

    // ── Expiry ──────────────────────────────────────────────────
    // Nobody relays presence any more, so each side evicts the other.
    info!("Both go quiet for {:?}", DEMO_TIMEOUT * 2);
    tokio::time::sleep(DEMO_TIMEOUT * 2).await;
    alice.log_cursors();
    bob.log_cursors();

    alice.leave();
    bob.leave();
    for monitor in monitors {
        monitor.await?;
    }
    info!("Done");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    info!("Starting Quill demo...");
    let options = load_options()?;
    LocalSet::new().run_until(run(options)).await
}
