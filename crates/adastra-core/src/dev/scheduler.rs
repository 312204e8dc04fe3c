//! Periodic theme session refresh.
//!
//! Theme sessions expire after a few hours, so the dev loop periodically
//! discards the running `theme serve` command, re-authenticates, launches a
//! fresh command and restarts the asset server. Exactly one cancellation
//! token is active at a time: the swap to a new token and the cancellation of
//! the old one happen together, before any await point.
//!
//! ```text
//! Starting ──listen+auth+launch──▶ Serving ◀──────────────┐
//!                                    │  timer / refresh()  │
//!                                    ▼                     │
//!                               Refreshing ──auth failed───┤
//!                                    │ relaunch + restart  │
//!                                    └─────────────────────┘
//! any state ──shutdown / restart failure──▶ Stopped
//! ```
//!
//! Shutdown is observed at every await point, including a hung
//! authentication.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::server::AssetServer;
use super::session::{authenticate, Authenticator, Session};
use super::theme::ThemeRunner;
use crate::error::{Error, Result};

/// Refresh period, kept under the session lifetime.
pub const SESSION_REFRESH_INTERVAL: Duration = Duration::from_secs(110 * 60);

/// Pause after cancelling a command so it can release its port.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Lifecycle of the dev loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Starting,
    Serving,
    Refreshing,
    Stopped,
}

/// Static inputs of the loop.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub store: String,
    pub password: Option<String>,
    /// Full argv of the theme command.
    pub argv: Vec<String>,
    pub interval: Duration,
    pub settle_delay: Duration,
}

impl SchedulerOptions {
    #[must_use]
    pub fn new(store: impl Into<String>, password: Option<String>, argv: Vec<String>) -> Self {
        Self {
            store: store.into(),
            password,
            argv,
            interval: SESSION_REFRESH_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Cloneable remote for a running scheduler.
///
/// Dropping every handle is treated as a shutdown request.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    refresh: mpsc::Sender<()>,
    shutdown: CancellationToken,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    /// Run a refresh cycle now. The timer restarts from this cycle.
    pub async fn refresh(&self) -> Result<()> {
        self.refresh
            .send(())
            .await
            .map_err(|_| Error::other("scheduler is not running"))
    }

    /// Stop the loop, interrupting a cycle in progress. A no-op once the
    /// scheduler has stopped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }
}

/// Drives the theme command and the asset server through session refreshes.
pub struct RefreshScheduler<A, R, S> {
    auth: Arc<A>,
    runner: Arc<R>,
    server: S,
    options: SchedulerOptions,
    active: CancellationToken,
    commands: JoinSet<()>,
    state: watch::Sender<SchedulerState>,
    refresh: mpsc::Receiver<()>,
    shutdown: CancellationToken,
    cycle: u64,
}

impl<A, R, S> RefreshScheduler<A, R, S>
where
    A: Authenticator,
    R: ThemeRunner,
    S: AssetServer,
{
    pub fn new(auth: A, runner: R, server: S, options: SchedulerOptions) -> (Self, SchedulerHandle) {
        let (refresh_tx, refresh_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Starting);
        let shutdown = CancellationToken::new();

        let scheduler = Self {
            auth: Arc::new(auth),
            runner: Arc::new(runner),
            server,
            options,
            active: CancellationToken::new(),
            commands: JoinSet::new(),
            state: state_tx,
            refresh: refresh_rx,
            shutdown: shutdown.clone(),
            cycle: 0,
        };
        let handle = SchedulerHandle {
            refresh: refresh_tx,
            shutdown,
            state: state_rx,
        };
        (scheduler, handle)
    }

    /// Run until shutdown.
    ///
    /// Startup failures and asset server restart failures end the loop with
    /// an error. A failed re-authentication only skips that cycle.
    pub async fn run(mut self) -> Result<()> {
        let result = self.serve().await;
        if let Err(e) = &result {
            error!(error = %e, "dev loop stopped");
        }
        self.stop().await;
        result
    }

    async fn serve(&mut self) -> Result<()> {
        self.set_state(SchedulerState::Starting);
        let shutdown = self.shutdown.clone();

        let Some(addr) = or_shutdown(&shutdown, self.server.listen()).await else {
            return Ok(());
        };
        let addr = addr?;
        info!(%addr, "asset server listening");

        let Some(session) = or_shutdown(&shutdown, self.acquire_session(self.active.clone())).await
        else {
            return Ok(());
        };
        let started = self.launch(session?);
        if or_shutdown(&shutdown, started).await.is_none() {
            return Ok(());
        }
        self.set_state(SchedulerState::Serving);

        let interval = self.options.interval;
        let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                request = self.refresh.recv() => match request {
                    Some(()) => {
                        self.refresh().await?;
                        timer.reset();
                    }
                    None => break,
                },
                _ = timer.tick() => self.refresh().await?,
                Some(joined) = self.commands.join_next() => reap(joined),
            }
        }
        info!("shutting down dev loop");
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.cycle += 1;
        let cycle = self.cycle;
        self.set_state(SchedulerState::Refreshing);
        info!(cycle, "refreshing theme session and restarting theme server");

        let shutdown = self.shutdown.clone();
        let cancel = self.rotate_token();
        if !self.options.settle_delay.is_zero()
            && or_shutdown(&shutdown, tokio::time::sleep(self.options.settle_delay))
                .await
                .is_none()
        {
            return Ok(());
        }

        let Some(session) = or_shutdown(&shutdown, self.acquire_session(cancel)).await else {
            return Ok(());
        };
        match session {
            Ok(session) => {
                // The asset server restarts only once the new command runs.
                let started = self.launch(session);
                if or_shutdown(&shutdown, started).await.is_none() {
                    return Ok(());
                }
                match or_shutdown(&shutdown, self.server.restart()).await {
                    Some(restarted) => restarted?,
                    None => return Ok(()),
                }
                info!(cycle, "theme session refreshed");
            }
            Err(e) => {
                warn!(cycle, error = %e, "re-authentication failed, retrying next cycle");
            }
        }

        self.set_state(SchedulerState::Serving);
        Ok(())
    }

    /// Replace the active token and cancel the previous one without yielding.
    fn rotate_token(&mut self) -> CancellationToken {
        let previous = std::mem::replace(&mut self.active, CancellationToken::new());
        previous.cancel();
        self.active.clone()
    }

    async fn acquire_session(&self, cancel: CancellationToken) -> Result<Session> {
        authenticate(
            self.auth.as_ref(),
            &self.options.store,
            self.options.password.as_deref(),
            cancel,
        )
        .await
    }

    /// Spawn the command. The returned receiver resolves once it is running,
    /// or fails if the command could not start.
    fn launch(&mut self, session: Session) -> oneshot::Receiver<()> {
        let runner = Arc::clone(&self.runner);
        let argv = self.options.argv.clone();
        let cycle = self.cycle;
        let (started_tx, started_rx) = oneshot::channel();

        debug!(cycle, ?session, "launching theme command");
        self.commands.spawn(async move {
            match runner.run(&argv, &session, started_tx).await {
                Ok(()) if session.is_cancelled() => debug!(cycle, "theme command stopped"),
                Ok(()) => warn!(cycle, "theme command exited before its session was replaced"),
                Err(e) => error!(cycle, error = %e, "theme command failed"),
            }
        });
        started_rx
    }

    async fn stop(&mut self) {
        self.active.cancel();
        if let Err(e) = self.server.close().await {
            warn!(error = %e, "failed to close asset server");
        }
        while let Some(joined) = self.commands.join_next().await {
            reap(joined);
        }
        self.set_state(SchedulerState::Stopped);
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }
}

/// Await `fut` unless `shutdown` fires first.
async fn or_shutdown<F: Future>(shutdown: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => None,
        out = fut => Some(out),
    }
}

fn reap(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "theme command task panicked");
        }
    }
}
