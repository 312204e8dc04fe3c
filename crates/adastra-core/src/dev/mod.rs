//! Development loop.
//!
//! Runs the delegated `theme serve` command next to the asset dev server and
//! keeps its session fresh. Project configuration and credentials are loaded
//! here too.

pub mod config;
pub mod env;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod theme;

pub use config::{find_config_file, load_config, AdastraConfig, AdastraOptions};
pub use env::{load_env_files, theme_vars, ThemeVars};
pub use scheduler::{
    RefreshScheduler, SchedulerHandle, SchedulerOptions, SchedulerState, SESSION_REFRESH_INTERVAL,
};
pub use server::AssetServer;
pub use session::{authenticate, AdminSession, Authenticator, PasswordAuthenticator, Session};
pub use theme::{LiveReload, ProcessRunner, ThemeRunner, ThemeServeOptions, DEFAULT_THEME_PORT};
