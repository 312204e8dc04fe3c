//! `adastra dev` command implementation.
//!
//! ```text
//! config + .env ─▶ dev snippet ─▶ snippets/<snippetFile>
//!                       │
//!                       ▼
//!         RefreshScheduler ─┬─ AssetDevServer (host:asset_port)
//!                           └─ theme serve (re-authenticated every 110 min)
//! ```

use adastra_core::assets::{dev_snippet, write_snippet};
use adastra_core::dev::{
    load_env_files, theme_vars, LiveReload, PasswordAuthenticator, ProcessRunner,
    RefreshScheduler, SchedulerOptions, ThemeServeOptions,
};
use miette::{IntoDiagnostic, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{find_binary, Project};
use crate::asset_server::{AssetDevServer, DEFAULT_ASSET_PORT};

pub(super) const DEFAULT_HOST: &str = "localhost";

/// Dev command action.
#[derive(Debug, Clone)]
pub struct DevAction {
    pub cwd: PathBuf,
    /// Overrides the configured theme root.
    pub theme_path: Option<PathBuf>,
    pub store: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub live_reload: String,
    pub poll: bool,
    pub theme_editor_sync: bool,
    pub port: u16,
    pub theme: Option<String>,
    pub only: Vec<String>,
    pub ignore: Vec<String>,
    pub stable: bool,
    pub force: bool,
    pub mode: String,
    pub asset_port: Option<u16>,
    pub config: Option<PathBuf>,
    pub cli_path: PathBuf,
}

/// Run the dev loop until Ctrl+C.
pub fn run(action: DevAction) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime.block_on(serve(action))
}

async fn serve(action: DevAction) -> Result<()> {
    let project = Project::load(&action.cwd, action.config.as_deref())?;

    let dot_env = load_env_files(&project.root, &action.mode);
    if !dot_env.is_empty() {
        info!(mode = %action.mode, vars = dot_env.len(), "loaded env files");
    }
    let vars = theme_vars(action.store.as_deref(), action.password.as_deref(), &dot_env);
    let store = vars
        .store
        .ok_or_else(|| miette::miette!("No store given. Pass --store or set SHOPIFY_FLAG_STORE"))?;

    let live_reload: LiveReload = action.live_reload.parse().into_diagnostic()?;
    let host = action
        .host
        .clone()
        .or_else(|| project.config.server.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let asset_port = action
        .asset_port
        .or(project.config.server.port)
        .unwrap_or(DEFAULT_ASSET_PORT);
    let addr = bind_addr(&host, asset_port)?;
    let asset_host = format!("http://{}:{asset_port}", url_host(&host));

    let theme_root = match &action.theme_path {
        Some(path) => project.root.join(path),
        None => project.theme_root(),
    };
    let snippet_file = &project.config.adastra.snippet_file;
    let (snippet_path, changed) = write_snippet(
        &theme_root,
        snippet_file,
        &dev_snippet(&asset_host, &project.entrypoints_dir()),
    )
    .into_diagnostic()?;
    if changed {
        println!("  Wrote {}", snippet_path.display());
    }

    let theme_options = ThemeServeOptions {
        path: theme_root,
        source_code_dir: project.config.adastra.source_code_dir.clone(),
        host: action.host.clone(),
        live_reload,
        poll: action.poll,
        theme_editor_sync: action.theme_editor_sync,
        port: action.port,
        theme: action.theme.clone(),
        only: action.only.clone(),
        ignore: action.ignore.clone(),
        stable: action.stable,
        force: action.force,
    };

    let program = match action.cli_path.to_str() {
        Some(name) if action.cli_path.components().count() == 1 => {
            find_binary(&project.root, name).unwrap_or_else(|| {
                warn!(program = %name, "theme CLI not found in node_modules or PATH");
                action.cli_path.clone()
            })
        }
        _ => project.root.join(&action.cli_path),
    };

    let server = AssetDevServer::new(addr, project.root.clone(), live_reload, store.clone());
    let options = SchedulerOptions::new(store, vars.password, theme_options.argv());
    let (scheduler, handle) = RefreshScheduler::new(
        PasswordAuthenticator,
        ProcessRunner::new(program),
        server,
        options,
    );

    println!();
    println!("  Asset server running at {asset_host}");
    println!("  Theme preview at http://127.0.0.1:{}", action.port);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            handle.shutdown();
        }
    });

    let result = scheduler.run().await;
    interrupt.abort();
    result.into_diagnostic()
}

/// Socket address for the asset server.
fn bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    if host == DEFAULT_HOST {
        return Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .into_diagnostic()?
        .next()
        .ok_or_else(|| miette::miette!("Host '{}' did not resolve to an address", host))
}

/// Host part of the asset URL the theme loads from.
pub(super) fn url_host(host: &str) -> String {
    match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => DEFAULT_HOST.to_string(),
        Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
        _ => host.to_string(),
    }
}
