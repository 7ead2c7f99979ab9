//! Sign-in: identity providers and the exchange with the backend.

use std::fmt;
use std::future::Future;

pub mod callback;
pub mod exchange;
pub mod google;

pub use exchange::{Navigator, Notifier, SignInError, SignInFlow, SignInOutcome};

/// Identity claims returned by a provider after an interactive sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentityAssertion {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Options for one interactive sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderRequest {
    /// Always show the account chooser instead of reusing a provider session.
    pub force_account_selection: bool,
}

impl ProviderRequest {
    pub fn select_account() -> Self {
        Self {
            force_account_selection: true,
        }
    }
}

/// Failure of the interactive provider step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProviderError {
    /// Provider is not configured or cannot be reached.
    Unavailable(String),
    /// The user dismissed the sign-in.
    Cancelled,
    /// The provider refused the sign-in or returned something unusable.
    Rejected(String),
}

impl fmt::Display for IdentityProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityProviderError::Unavailable(msg) => {
                write!(f, "identity provider unavailable: {msg}")
            }
            IdentityProviderError::Cancelled => write!(f, "sign-in cancelled by user"),
            IdentityProviderError::Rejected(msg) => {
                write!(f, "identity provider rejected sign-in: {msg}")
            }
        }
    }
}

impl std::error::Error for IdentityProviderError {}

/// Interactive identity provider.
///
/// `sign_in_interactive` may suspend for as long as the user takes.
pub trait IdentityProvider {
    fn sign_in_interactive(
        &self,
        request: &ProviderRequest,
    ) -> impl Future<Output = Result<IdentityAssertion, IdentityProviderError>> + Send;
}
