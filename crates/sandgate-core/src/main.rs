//! Sandgate - print the Privacy Sandbox state of a profile
//!
//! Usage: `sandgate [config.json]`. Without a path the default configuration
//! and data directory are used.

use sandgate_core::{init_logging, Config, Profile, Result};

fn main() {
    init_logging();

    if let Err(err) = run() {
        tracing::error!(error = %err, "sandgate failed");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let profile = Profile::new(config)?;
    let status = profile.privacy_sandbox_status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
