//! The delegated `theme serve` command.
//!
//! [`ThemeServeOptions::argv`] turns the dev flags into the command line,
//! and a [`ThemeRunner`] executes it with a session until the session's
//! token is cancelled.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::scheduler::DEFAULT_SETTLE_DELAY;
use super::session::Session;
use crate::error::{Error, Result};

/// Default theme preview port.
pub const DEFAULT_THEME_PORT: u16 = 9292;

/// Project files `theme serve` never uploads.
const IGNORED_CONFIG_FILES: &[&str] = &["package.json", "jsconfig.*", "tsconfig.*"];
const IGNORED_TOOLING_DIRS: &[&str] = &[".vscode", "node_modules"];

/// Env vars carrying the session into the theme CLI.
pub const SHOP_ENV: &str = "SHOPIFY_SHOP";
pub const ADMIN_TOKEN_ENV: &str = "SHOPIFY_CLI_ADMIN_AUTH_TOKEN";
pub const STOREFRONT_TOKEN_ENV: &str = "SHOPIFY_CLI_STOREFRONT_RENDERER_AUTH_TOKEN";

/// What happens in the browser when a file changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveReload {
    /// Hot reload CSS and sections.
    #[default]
    HotReload,
    /// Always refresh the whole page.
    FullPage,
    Off,
}

impl LiveReload {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HotReload => "hot-reload",
            Self::FullPage => "full-page",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for LiveReload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LiveReload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hot-reload" => Ok(Self::HotReload),
            "full-page" => Ok(Self::FullPage),
            "off" => Ok(Self::Off),
            other => Err(Error::other(format!(
                "invalid live reload mode '{other}' (expected hot-reload, full-page or off)"
            ))),
        }
    }
}

/// Options forwarded to `theme serve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeServeOptions {
    /// Theme directory.
    pub path: PathBuf,
    /// Frontend sources, added to the ignore list.
    pub source_code_dir: PathBuf,
    pub host: Option<String>,
    pub live_reload: LiveReload,
    pub poll: bool,
    pub theme_editor_sync: bool,
    pub port: u16,
    /// Theme ID or name.
    pub theme: Option<String>,
    pub only: Vec<String>,
    pub ignore: Vec<String>,
    /// Legacy upload approach.
    pub stable: bool,
    pub force: bool,
}

impl Default for ThemeServeOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            source_code_dir: PathBuf::from("src"),
            host: None,
            live_reload: LiveReload::default(),
            poll: false,
            theme_editor_sync: false,
            port: DEFAULT_THEME_PORT,
            theme: None,
            only: Vec::new(),
            ignore: Vec::new(),
            stable: false,
            force: false,
        }
    }
}

impl ThemeServeOptions {
    /// `theme serve <path> --ignore <fixed...> <flags...> --port <port>`.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![
            "theme".to_string(),
            "serve".to_string(),
            self.path.to_string_lossy().into_owned(),
            "--ignore".to_string(),
        ];
        argv.extend(IGNORED_CONFIG_FILES.iter().map(|s| (*s).to_string()));
        argv.push(format!(
            "{}/",
            self.source_code_dir.to_string_lossy().trim_end_matches('/')
        ));
        argv.extend(IGNORED_TOOLING_DIRS.iter().map(|s| (*s).to_string()));

        if let Some(host) = &self.host {
            argv.extend(["--host".to_string(), host.clone()]);
        }
        argv.extend(["--live-reload".to_string(), self.live_reload.to_string()]);
        for (flag, on) in [
            ("--poll", self.poll),
            ("--theme-editor-sync", self.theme_editor_sync),
        ] {
            if on {
                argv.push(flag.to_string());
            }
        }
        if let Some(theme) = &self.theme {
            argv.extend(["--theme".to_string(), theme.clone()]);
        }
        for pattern in &self.only {
            argv.extend(["--only".to_string(), pattern.clone()]);
        }
        for pattern in &self.ignore {
            argv.extend(["--ignore".to_string(), pattern.clone()]);
        }
        for (flag, on) in [("--stable", self.stable), ("--force", self.force)] {
            if on {
                argv.push(flag.to_string());
            }
        }

        argv.extend(["--port".to_string(), self.port.to_string()]);
        argv
    }
}

/// Runs the long-lived theme command.
#[async_trait]
pub trait ThemeRunner: Send + Sync + 'static {
    /// Run `argv` with `session` until it exits or `session.cancel` fires.
    /// `started` is fired once the command is running; dropping it means
    /// the command never started.
    ///
    /// Returning after cancellation is `Ok`.
    async fn run(
        &self,
        argv: &[String],
        session: &Session,
        started: oneshot::Sender<()>,
    ) -> Result<()>;
}

/// Spawns the theme CLI binary as a child process.
///
/// On cancellation the child gets SIGTERM and is killed if it is still
/// running after the grace period.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    grace: Duration,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            grace: DEFAULT_SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn command(&self, argv: &[String], session: &Session) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(argv)
            .env(SHOP_ENV, &session.admin.store_fqdn)
            .env(ADMIN_TOKEN_ENV, &session.admin.token)
            .env(STOREFRONT_TOKEN_ENV, &session.storefront_token)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ThemeRunner for ProcessRunner {
    async fn run(
        &self,
        argv: &[String],
        session: &Session,
        started: oneshot::Sender<()>,
    ) -> Result<()> {
        let program = self.program.display().to_string();
        let mut child = self
            .command(argv, session)
            .spawn()
            .map_err(|source| Error::Launch {
                program: program.clone(),
                source,
            })?;
        info!(pid = child.id().unwrap_or(0), program = %program, "theme command started");
        let _ = started.send(());

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    debug!(%status, "theme command exited");
                    Ok(())
                } else {
                    Err(Error::CommandFailed { status })
                }
            }
            () = session.cancel.cancelled() => {
                debug!(pid = child.id().unwrap_or(0), "session superseded, stopping theme command");
                stop_child(&mut child, self.grace).await;
                Ok(())
            }
        }
    }
}

/// Ask the child to exit, then kill it once `grace` runs out.
async fn stop_child(child: &mut Child, grace: Duration) {
    if terminate(child) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "theme command exited after SIGTERM");
                return;
            }
            Ok(Err(e)) => warn!(error = %e, "failed to wait for theme command"),
            Err(_) => warn!(grace = ?grace, "theme command still running, killing it"),
        }
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill theme command");
    }
}

#[cfg(unix)]
fn terminate(child: &Child) -> bool {
    let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return false;
    };
    // SAFETY: `pid` is our own child and has not been reaped yet.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::session::AdminSession;
    use tokio_util::sync::CancellationToken;

    fn session(cancel: CancellationToken) -> Session {
        Session::new(
            AdminSession {
                token: "admin".to_string(),
                store_fqdn: "s.myshopify.com".to_string(),
            },
            "storefront".to_string(),
            cancel,
        )
    }

    #[test]
    fn test_argv_defaults() {
        let argv = ThemeServeOptions::default().argv();
        assert_eq!(
            argv,
            vec![
                "theme",
                "serve",
                ".",
                "--ignore",
                "package.json",
                "jsconfig.*",
                "tsconfig.*",
                "src/",
                ".vscode",
                "node_modules",
                "--live-reload",
                "hot-reload",
                "--port",
                "9292",
            ]
        );
    }

    #[test]
    fn test_argv_passes_flags_through() {
        let options = ThemeServeOptions {
            path: PathBuf::from("theme"),
            source_code_dir: PathBuf::from("frontend/"),
            host: Some("0.0.0.0".to_string()),
            live_reload: LiveReload::Off,
            poll: true,
            theme_editor_sync: true,
            port: 9393,
            theme: Some("123".to_string()),
            only: vec!["sections/*".to_string(), "templates/*".to_string()],
            ignore: vec!["config/*".to_string()],
            stable: true,
            force: true,
        };
        let argv = options.argv().join(" ");

        assert!(argv.starts_with("theme serve theme --ignore package.json jsconfig.* tsconfig.* frontend/ .vscode node_modules "));
        assert!(argv.contains("--host 0.0.0.0"));
        assert!(argv.contains("--live-reload off"));
        assert!(argv.contains("--poll --theme-editor-sync"));
        assert!(argv.contains("--theme 123"));
        assert!(argv.contains("--only sections/* --only templates/*"));
        assert!(argv.contains("--ignore config/*"));
        assert!(argv.contains("--stable --force"));
        assert!(argv.ends_with("--port 9393"));
        assert_eq!(argv.matches("--port").count(), 1);
    }

    #[test]
    fn test_live_reload_round_trips_names() {
        for mode in [LiveReload::HotReload, LiveReload::FullPage, LiveReload::Off] {
            assert_eq!(mode.as_str().parse::<LiveReload>().unwrap(), mode);
        }
        assert!("sometimes".parse::<LiveReload>().is_err());
    }

    #[tokio::test]
    async fn test_process_runner_missing_binary() {
        let runner = ProcessRunner::new("adastra-definitely-not-a-binary");
        let (started_tx, started_rx) = oneshot::channel();
        let err = runner
            .run(&["theme".to_string()], &session(CancellationToken::new()), started_tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert!(started_rx.await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let runner = ProcessRunner::new("sleep");
        let session = session(cancel.clone());

        let (started_tx, started_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            runner.run(&["30".to_string()], &session, started_tx).await
        });
        started_rx.await.unwrap();
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runner should stop after cancellation")
            .unwrap();
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_reports_failure_status() {
        let runner = ProcessRunner::new("false");
        let (started_tx, _started_rx) = oneshot::channel();
        let err = runner
            .run(&[], &session(CancellationToken::new()), started_tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    /// Runs `script` under `sh`, cancels it once started, and returns how
    /// long the runner took to return.
    #[cfg(unix)]
    async fn cancel_script(script: &str, marker: &std::path::Path, grace: Duration) -> Duration {
        let cancel = CancellationToken::new();
        let runner = ProcessRunner::new("sh").with_grace(grace);
        let session = session(cancel.clone());
        let argv = vec![
            "-c".to_string(),
            script.to_string(),
            marker.display().to_string(),
        ];
        let (started_tx, started_rx) = oneshot::channel();

        let handle = tokio::spawn(async move { runner.run(&argv, &session, started_tx).await });
        started_rx.await.unwrap();
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let begin = std::time::Instant::now();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("runner should stop after cancellation")
            .unwrap()
            .unwrap();
        begin.elapsed()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_terminates_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("terminated");

        cancel_script(
            r#"trap 'touch "$0"; exit 0' TERM; while true; do sleep 0.05; done"#,
            &marker,
            Duration::from_secs(30),
        )
        .await;

        assert!(marker.exists(), "command should handle SIGTERM before being killed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_kills_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("terminated");

        let elapsed = cancel_script(
            r"trap '' TERM; while true; do sleep 0.05; done",
            &marker,
            Duration::from_millis(300),
        )
        .await;

        assert!(elapsed >= Duration::from_millis(300));
        assert!(!marker.exists());
    }
}
