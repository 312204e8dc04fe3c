#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod asset_server;
mod commands;
mod logging;

use adastra_core::dev::env::{DEFAULT_MODE, PASSWORD_ENV, STORE_ENV};
use adastra_core::dev::DEFAULT_THEME_PORT;
use adastra_core::Config;
use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "adastra")]
#[command(author, version, about = "Vite-backed Shopify theme development", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted logs
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Start the asset dev server and preview the theme
    Dev(DevArgs),

    /// Build for production and write the asset snippet
    Build {
        /// Minify the output
        #[arg(long, env = "ADASTRA_MINIFY", default_value_t = true, action = clap::ArgAction::Set)]
        minify: bool,

        /// Emit source maps
        #[arg(long, env = "ADASTRA_SOURCEMAP")]
        sourcemap: bool,

        /// Bundler log level
        #[arg(long, env = "ADASTRA_LOG_LEVEL", default_value = "info", value_parser = ["info", "silent", "error", "warn"])]
        log_level: String,

        /// Mode forwarded to the bundler
        #[arg(short, long, env = "NODE_ENV", default_value = "production")]
        mode: String,

        /// Explicit config file (overrides auto-discovery)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Regenerate the asset snippet without running anything
    Snippet {
        /// Write the development snippet instead of the production one
        #[arg(long)]
        dev: bool,

        /// Asset host for the development snippet
        #[arg(long, requires = "dev", value_name = "URL")]
        asset_host: Option<String>,

        /// Explicit config file (overrides auto-discovery)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct DevArgs {
    /// Theme directory (defaults to the configured theme root)
    path: Option<PathBuf>,

    /// Store URL, e.g. your-store.myshopify.com or your-store
    #[arg(short, long, env = STORE_ENV)]
    store: Option<String>,

    /// Theme Access app password
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Interface the servers bind to
    #[arg(long, env = "SHOPIFY_FLAG_HOST")]
    host: Option<String>,

    /// Browser behavior when files change
    #[arg(long, env = "SHOPIFY_FLAG_LIVE_RELOAD", default_value = "hot-reload", value_parser = ["hot-reload", "full-page", "off"])]
    live_reload: String,

    /// Force polling to detect file changes
    #[arg(long, env = "SHOPIFY_FLAG_POLL")]
    poll: bool,

    /// Sync theme editor changes back to local files
    #[arg(short = 'e', long, env = "SHOPIFY_FLAG_THEME_EDITOR_SYNC")]
    theme_editor_sync: bool,

    /// Theme preview port
    #[arg(long, env = "SHOPIFY_FLAG_PORT", default_value_t = DEFAULT_THEME_PORT)]
    port: u16,

    /// Theme ID or name of the remote theme
    #[arg(short, long, env = "SHOPIFY_FLAG_THEME_ID")]
    theme: Option<String>,

    /// Hot reload only files matching the pattern
    #[arg(short, long, env = "SHOPIFY_FLAG_ONLY", value_delimiter = ',')]
    only: Vec<String>,

    /// Skip hot reloading files matching the pattern
    #[arg(short = 'x', long, env = "SHOPIFY_FLAG_IGNORE", value_delimiter = ',')]
    ignore: Vec<String>,

    /// Use the legacy upload approach
    #[arg(long, env = "SHOPIFY_FLAG_STABLE", hide = true)]
    stable: bool,

    /// Proceed without confirmation
    #[arg(short, long, env = "SHOPIFY_FLAG_FORCE", hide = true)]
    force: bool,

    /// Mode selecting the .env files to load
    #[arg(short, long, env = "NODE_ENV", default_value = DEFAULT_MODE)]
    mode: String,

    /// Asset dev server port (defaults to server.port from the config, then 5173)
    #[arg(long, env = "ADASTRA_ASSET_PORT")]
    asset_port: Option<u16>,

    /// Explicit config file (overrides auto-discovery)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Theme CLI binary
    #[arg(long, env = "ADASTRA_CLI_PATH", default_value = "shopify")]
    cli_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(config.json_logs),
        Some(Commands::Dev(args)) => {
            let action = commands::dev::DevAction {
                cwd: cwd.clone(),
                theme_path: args.path,
                store: args.store,
                password: args.password,
                host: args.host,
                live_reload: args.live_reload,
                poll: args.poll,
                theme_editor_sync: args.theme_editor_sync,
                port: args.port,
                theme: args.theme,
                only: args.only,
                ignore: args.ignore,
                stable: args.stable,
                force: args.force,
                mode: args.mode,
                asset_port: args.asset_port,
                config: args.config,
                cli_path: args.cli_path,
            };
            let span = tracing::info_span!("dev", cmd = "dev", cwd = %cwd.display());
            let _guard = span.enter();
            commands::dev::run(action)
        }
        Some(Commands::Build {
            minify,
            sourcemap,
            log_level,
            mode,
            config,
        }) => {
            let action = commands::build::BuildAction {
                cwd,
                minify,
                sourcemap,
                log_level,
                mode,
                config,
            };
            commands::build::run(action)
        }
        Some(Commands::Snippet {
            dev,
            asset_host,
            config,
        }) => commands::snippet::run(&commands::snippet::SnippetAction {
            cwd,
            dev,
            asset_host,
            config,
        }),
    }
}
