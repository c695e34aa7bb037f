//! "Navigate to login" signal emitted when a session cannot be renewed.
//!
//! The gateway only raises the signal; what navigation means (a router call,
//! a CLI message, a re-prompt) belongs to the application.

use tokio::sync::watch;

use crate::error::RenewalError;

/// Route the web portal sends users to when their session ends.
pub const LOGIN_ROUTE: &str = "/login";

/// Receiver of the login-redirect signal.
///
/// Called at most once per request, after both tokens have been cleared.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, reason: &RenewalError);
}

/// Ignores the signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoginRedirect;

impl LoginRedirect for NoopLoginRedirect {
    fn redirect_to_login(&self, _reason: &RenewalError) {}
}

impl<F> LoginRedirect for F
where
    F: Fn(&RenewalError) + Send + Sync,
{
    fn redirect_to_login(&self, reason: &RenewalError) {
        self(reason);
    }
}

/// Payload published by [`ChannelLoginRedirect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequired {
    /// Where to send the user, [`LOGIN_ROUTE`] unless overridden.
    pub route: String,
    /// Display form of the renewal failure.
    pub reason: String,
}

/// Publishes session expiry on a `tokio::sync::watch` channel.
///
/// ```ignore
/// let (redirect, mut expired) = ChannelLoginRedirect::new();
/// tokio::spawn(async move {
///     while expired.changed().await.is_ok() {
///         if let Some(signal) = expired.borrow_and_update().clone() {
///             router.navigate(&signal.route);
///         }
///     }
/// });
/// ```
#[derive(Debug, Clone)]
pub struct ChannelLoginRedirect {
    route: String,
    tx: watch::Sender<Option<LoginRequired>>,
}

impl ChannelLoginRedirect {
    /// Channel pointing at [`LOGIN_ROUTE`].
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<Option<LoginRequired>>) {
        Self::with_route(LOGIN_ROUTE)
    }

    #[must_use]
    pub fn with_route(route: impl Into<String>) -> (Self, watch::Receiver<Option<LoginRequired>>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                route: route.into(),
                tx,
            },
            rx,
        )
    }

    /// Another receiver for the same signal.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<LoginRequired>> {
        self.tx.subscribe()
    }
}

impl LoginRedirect for ChannelLoginRedirect {
    fn redirect_to_login(&self, reason: &RenewalError) {
        // send_replace keeps the latest value even with no live receivers
        self.tx.send_replace(Some(LoginRequired {
            route: self.route.clone(),
            reason: reason.to_string(),
        }));
    }
}
