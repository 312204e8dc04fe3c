//! Theme sessions and credential acquisition.
//!
//! A [`Session`] pairs the admin and storefront credentials with the
//! cancellation token of the one `theme serve` run it belongs to. Sessions
//! are never refreshed in place; the scheduler builds a new one per cycle.

use async_trait::async_trait;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Admin API credentials for a store.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub token: String,
    /// Normalized `*.myshopify.com` domain.
    pub store_fqdn: String,
}

impl fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSession")
            .field("token", &"<redacted>")
            .field("store_fqdn", &self.store_fqdn)
            .finish()
    }
}

/// Credentials plus the cancellation signal of the command using them.
#[derive(Clone)]
pub struct Session {
    pub admin: AdminSession,
    pub storefront_token: String,
    pub cancel: CancellationToken,
}

impl Session {
    #[must_use]
    pub fn new(admin: AdminSession, storefront_token: String, cancel: CancellationToken) -> Self {
        Self {
            admin,
            storefront_token,
            cancel,
        }
    }

    /// Whether the session has been superseded or shut down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("admin", &self.admin)
            .field("storefront_token", &"<redacted>")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Source of theme credentials.
///
/// The two acquisitions are independent and may run concurrently.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Admin session for uploading theme files.
    async fn admin_session(&self, store: &str, password: Option<&str>) -> Result<AdminSession>;

    /// Token for the storefront renderer used by the preview.
    async fn storefront_token(&self, store: &str, password: Option<&str>) -> Result<String>;
}

/// Acquire both credentials and bind them to `cancel`.
pub async fn authenticate<A: Authenticator + ?Sized>(
    auth: &A,
    store: &str,
    password: Option<&str>,
    cancel: CancellationToken,
) -> Result<Session> {
    let (admin, storefront_token) = tokio::try_join!(
        auth.admin_session(store, password),
        auth.storefront_token(store, password)
    )?;
    Ok(Session::new(admin, storefront_token, cancel))
}

/// Theme Access app password flow: the password is the token for both APIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordAuthenticator;

impl PasswordAuthenticator {
    fn password<'a>(store: &str, password: Option<&'a str>) -> Result<&'a str> {
        password.filter(|p| !p.is_empty()).ok_or_else(|| Error::Authentication {
            store: store.to_string(),
            message: "no theme access password; pass --password or set SHOPIFY_CLI_THEME_TOKEN"
                .to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn admin_session(&self, store: &str, password: Option<&str>) -> Result<AdminSession> {
        let token = Self::password(store, password)?;
        Ok(AdminSession {
            token: token.to_string(),
            store_fqdn: normalize_store_fqdn(store),
        })
    }

    async fn storefront_token(&self, store: &str, password: Option<&str>) -> Result<String> {
        Self::password(store, password).map(str::to_string)
    }
}

/// `my-shop`, `https://my-shop.myshopify.com/` → `my-shop.myshopify.com`.
#[must_use]
pub fn normalize_store_fqdn(store: &str) -> String {
    let store = store.trim();
    let store = store
        .strip_prefix("https://")
        .or_else(|| store.strip_prefix("http://"))
        .unwrap_or(store)
        .trim_end_matches('/');

    if store.contains('.') {
        store.to_string()
    } else {
        format!("{store}.myshopify.com")
    }
}
