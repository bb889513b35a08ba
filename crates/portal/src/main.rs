#![forbid(unsafe_code)]

mod commands;
mod terminal;

use std::{future::Future, path::PathBuf, process, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::warn;
use portal_bin_utils::completions_command::CompletionsCommand;
use portal_gateway::{FileStore, GatewayConfig, RequestGateway, SessionStore};
use url::Url;

use crate::{
    commands::{
        download::DownloadCommand,
        request::{BodyCommand, BodyVerb, QueryCommand},
        session::{LocaleCommand, LoginCommand, LogoutCommand},
    },
    terminal::TerminalNotifier,
};

/// Exit status after Ctrl-C, as a shell reports death by SIGINT.
const INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "portal")]
struct Cli {
    /// Base URL of the backend API.
    #[clap(long, env = "PORTAL_API_URL")]
    api_url: Option<Url>,
    /// File holding the token, user profile and locale preference.
    #[clap(long, env = "PORTAL_STORAGE")]
    storage: Option<PathBuf>,
    /// Give up on a request after this many milliseconds.
    #[clap(long, env = "PORTAL_API_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn exec(self) -> anyhow::Result<()> {
        let Self {
            api_url,
            storage,
            timeout_ms,
            command,
        } = self;
        let store: Arc<dyn SessionStore> = Arc::new(match storage {
            Some(path) => FileStore::open(path),
            None => FileStore::open_default()?,
        });
        let connect = || gateway(api_url.clone(), timeout_ms, store.clone());
        match command {
            Commands::Login(cmd) => cmd.exec(store.as_ref())?,
            Commands::Logout(cmd) => cmd.exec(store.as_ref())?,
            Commands::Locale(cmd) => cmd.exec(store.as_ref())?,
            Commands::Get(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway, false)).await?
            }
            Commands::GetJson(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway, true)).await?
            }
            Commands::Post(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway, BodyVerb::Post)).await?
            }
            Commands::PostJson(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway, BodyVerb::PostJson)).await?
            }
            Commands::Put(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway, BodyVerb::Put)).await?
            }
            Commands::Delete(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway, BodyVerb::Delete)).await?
            }
            Commands::Download(cmd) => {
                let gateway = connect()?;
                interruptible(&gateway, cmd.exec(&gateway)).await?
            }
            Commands::Completions(cmd) => cmd.exec::<Self>()?,
        }
        Ok(())
    }
}

fn gateway(
    api_url: Option<Url>,
    timeout_ms: Option<u64>,
    store: Arc<dyn SessionStore>,
) -> anyhow::Result<RequestGateway> {
    let Some(api_url) = api_url else {
        bail!("No API URL, pass --api-url or set PORTAL_API_URL");
    };
    let mut config = GatewayConfig::new(api_url);
    if let Some(ms) = timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    RequestGateway::builder(config)
        .store(store)
        .notifier(Arc::new(TerminalNotifier))
        .build()
        .context("Failed to create gateway")
}

/// Run `f`, aborting every pending request and exiting on Ctrl-C.
///
/// The signal is watched from a task of its own so that it is honored even while an alert is
/// waiting for Enter.
async fn interruptible(
    gateway: &RequestGateway,
    f: impl Future<Output = anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let watcher = tokio::spawn({
        let gateway = gateway.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    gateway.cancel_all();
                    eprintln!("Interrupted");
                    process::exit(INTERRUPTED);
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
            }
        }
    });
    let result = f.await;
    watcher.abort();
    result
}

#[derive(Subcommand)]
enum Commands {
    /// Store the token issued by the backend
    Login(LoginCommand),
    /// Forget the stored token and user profile
    Logout(LogoutCommand),
    /// Store the preferred locale; `en` selects English, anything else the default
    Locale(LocaleCommand),
    /// GET a path and print the response body
    Get(QueryCommand),
    /// GET a path and print the `data` of the response envelope
    GetJson(QueryCommand),
    /// POST a JSON body and print the response envelope
    Post(BodyCommand),
    /// POST a JSON body and print the `data` of the response envelope
    PostJson(BodyCommand),
    /// PUT a JSON body and print the response envelope
    Put(BodyCommand),
    /// DELETE with a JSON body and print the response envelope
    Delete(BodyCommand),
    /// Save a binary response to a file
    Download(DownloadCommand),
    /// Print a completion file for the given shell.
    ///
    /// Example: `portal completions zsh | source /dev/stdin`.
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut guard = portal_bin_utils::logger::init("portal");
    Cli::parse().exec().await?;
    guard.disarm();
    Ok(())
}
