//! Sign-in orchestration: provider → backend → session → navigation.
//!
//! One attempt runs strictly in order and either completes every step or
//! leaves the session untouched. Nothing is retried; the user starts a new
//! attempt instead.

use std::fmt;

use reqwest::StatusCode;

use super::{IdentityProvider, IdentityProviderError, ProviderRequest};
use crate::backend::{BackendClient, BackendError, BackendSignInRequest};
use crate::session::{SessionPayload, SessionStore};

/// Notice shown for every failed attempt. Details go to the log only.
pub const SIGN_IN_FAILED_NOTICE: &str = "Google sign-in failed. Check the log for details.";

/// Route shown after a successful sign-in.
pub const HOME_ROUTE: &str = "/";

/// Moves the user to another view.
pub trait Navigator {
    fn navigate_to(&self, path: &str);
}

/// Shows a message the user must see.
pub trait Notifier {
    fn alert(&self, message: &str);
}

/// Why a sign-in attempt stopped.
#[derive(Debug)]
pub enum SignInError {
    /// The interactive provider step failed or was cancelled.
    IdentityProvider(IdentityProviderError),
    /// The backend answered with a non-success status.
    BackendRejection { status: StatusCode, body: String },
    /// The backend answered 2xx with a body that is not a session payload.
    BackendProtocol(String),
    /// The backend request could not be sent or its response not read.
    BackendTransport(String),
    /// The session store refused the new session.
    SessionCommit(String),
}

impl SignInError {
    /// Text written to the log for this failure.
    ///
    /// For backend rejections this is the raw response body.
    pub fn diagnostic(&self) -> String {
        match self {
            SignInError::IdentityProvider(err) => err.to_string(),
            SignInError::BackendRejection { body, .. } => body.clone(),
            SignInError::BackendProtocol(msg)
            | SignInError::BackendTransport(msg)
            | SignInError::SessionCommit(msg) => msg.clone(),
        }
    }

    /// Stable short name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SignInError::IdentityProvider(_) => "identity_provider",
            SignInError::BackendRejection { .. } => "backend_rejection",
            SignInError::BackendProtocol(_) => "backend_protocol",
            SignInError::BackendTransport(_) => "backend_transport",
            SignInError::SessionCommit(_) => "session_commit",
        }
    }
}

impl fmt::Display for SignInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignInError::IdentityProvider(err) => write!(f, "{err}"),
            SignInError::BackendRejection { status, body } => {
                write!(f, "backend rejected sign-in (HTTP {}): {body}", status.as_u16())
            }
            SignInError::BackendProtocol(msg) => {
                write!(f, "backend sent an unexpected sign-in response: {msg}")
            }
            SignInError::BackendTransport(msg) => write!(f, "backend unreachable: {msg}"),
            SignInError::SessionCommit(msg) => write!(f, "could not store session: {msg}"),
        }
    }
}

impl std::error::Error for SignInError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignInError::IdentityProvider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdentityProviderError> for SignInError {
    fn from(err: IdentityProviderError) -> Self {
        SignInError::IdentityProvider(err)
    }
}

impl From<BackendError> for SignInError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, body } => SignInError::BackendRejection { status, body },
            BackendError::Malformed(msg) => SignInError::BackendProtocol(msg),
            BackendError::Transport(err) => SignInError::BackendTransport(err.to_string()),
        }
    }
}

/// Result of one attempt. The side effects are the contract; this only tells
/// the caller which way it went.
#[derive(Debug)]
pub enum SignInOutcome {
    SignedIn(SessionPayload),
    Failed(SignInError),
}

impl SignInOutcome {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SignInOutcome::SignedIn(_))
    }
}

/// Drives sign-in attempts against one set of collaborators.
pub struct SignInFlow<P, S, N, A> {
    provider: P,
    backend: BackendClient,
    session: S,
    navigator: N,
    notifier: A,
}

impl<P, S, N, A> SignInFlow<P, S, N, A>
where
    P: IdentityProvider,
    S: SessionStore,
    N: Navigator,
    A: Notifier,
{
    pub fn new(provider: P, backend: BackendClient, session: S, navigator: N, notifier: A) -> Self {
        Self {
            provider,
            backend,
            session,
            navigator,
            notifier,
        }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Runs one sign-in attempt end to end.
    ///
    /// On success the session is committed once and the user is sent to
    /// [`HOME_ROUTE`]. On any failure the diagnostic is logged, the generic
    /// notice is shown, and neither session nor navigation is touched.
    pub async fn attempt_sign_in(&self) -> SignInOutcome {
        let payload = match self.exchange().await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(
                    kind = err.kind(),
                    diagnostic = %err.diagnostic(),
                    "google sign-in failed"
                );
                self.notifier.alert(SIGN_IN_FAILED_NOTICE);
                return SignInOutcome::Failed(err);
            }
        };

        tracing::info!(user = payload.id(), "sign-in succeeded");
        self.navigator.navigate_to(HOME_ROUTE);
        SignInOutcome::SignedIn(payload)
    }

    async fn exchange(&self) -> Result<SessionPayload, SignInError> {
        let request = ProviderRequest::select_account();
        let assertion = self.provider.sign_in_interactive(&request).await?;

        let body = BackendSignInRequest::from(assertion);
        tracing::debug!(backend = self.backend.base_url(), "forwarding identity to backend");
        let payload = self.backend.sign_in_google(&body).await?;

        self.session
            .commit_identity(payload.clone())
            .map_err(|e| SignInError::SessionCommit(format!("{e:#}")))?;
        Ok(payload)
    }
}
