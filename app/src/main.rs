// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # FlexSave Terminal Front End
//!
//! Entry point for the `flexsave` binary. Parses CLI arguments, initializes
//! logging, restores the stored session and runs one command.
//!
//! Startup order:
//!
//! 1. `version` is answered before anything touches the network.
//! 2. Ledger client and identity provider are built from flags/env.
//! 3. [`SessionContext::restore`] revalidates the stored credentials.
//! 4. The command runs through the route guard, then against the ledger.
//! 5. The session context is shut down; credentials stay on disk.

mod cli;
mod commands;
mod logging;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flexsave_core::auth::{
    FileCredentialStore, FirebaseConfig, FirebaseIdentity, RestoreOutcome, SessionContext,
};
use flexsave_core::config::{IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL};
use flexsave_core::ledger::{LedgerClient, LedgerConfig};

use cli::{Commands, FlexSaveCli, GlobalArgs};
use commands::App;
use render::Output;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = FlexSaveCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging("flexsave=warn,flexsave_core=warn", cli.global.log_format);

    let session = start_session(&cli.global).await?;
    let app = App::new(session, cli.global.locale, Output::new(cli.global.json));
    let result = app.run(cli.command).await;
    app.shutdown();
    result
}

/// Builds the clients and restores the stored session.
async fn start_session(args: &GlobalArgs) -> Result<SessionContext> {
    let ledger_config = LedgerConfig::new(&args.api_url)
        .with_context(|| format!("invalid ledger URL: {}", args.api_url))?
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let ledger = LedgerClient::new(ledger_config).context("failed to build ledger client")?;

    let api_key = args
        .firebase_api_key
        .clone()
        .context("FLEXSAVE_FIREBASE_API_KEY is not set (or pass --firebase-api-key)")?;
    let firebase_config = FirebaseConfig::with_endpoints(
        api_key,
        args.firebase_identity_url
            .as_deref()
            .unwrap_or(IDENTITY_TOOLKIT_URL),
        args.firebase_token_url.as_deref().unwrap_or(SECURE_TOKEN_URL),
    )
    .context("invalid identity provider configuration")?;
    let identity =
        FirebaseIdentity::new(firebase_config).context("failed to build identity client")?;

    let session_path = match &args.session_file {
        Some(path) => path.clone(),
        None => default_session_file()?,
    };
    let store = FileCredentialStore::new(session_path);

    tracing::debug!(
        api_url = %ledger.base_url(),
        session_file = %store.path().display(),
        "starting flexsave"
    );

    let session = SessionContext::restore(Arc::new(identity), ledger, Arc::new(store))
        .await
        .context("failed to restore session")?;

    match session.restore_outcome() {
        RestoreOutcome::Expired => eprintln!("Your session has expired. Please sign in again."),
        RestoreOutcome::Disabled => eprintln!("This account has been disabled."),
        RestoreOutcome::Offline(reason) => {
            tracing::warn!(%reason, "could not reach FlexSave services; continuing signed out");
        }
        RestoreOutcome::Anonymous | RestoreOutcome::Restored => {}
    }
    Ok(session)
}

/// `~/.flexsave/session.json`.
fn default_session_file() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .context("cannot locate the home directory; pass --session-file")?;
    Ok(PathBuf::from(home).join(".flexsave").join("session.json"))
}

/// Prints version information to stdout.
fn print_version() {
    println!("flexsave {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
