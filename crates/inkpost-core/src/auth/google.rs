//! Google sign-in via OAuth 2.0 authorization code + PKCE.
//!
//! The flow: build the authorization URL, let the [`AuthorizationChannel`]
//! collect the code, exchange it at the token endpoint, then read the
//! OpenID userinfo claims. Tokens are used once and never stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::callback::{self, AuthorizationChannel};
use super::{IdentityAssertion, IdentityProvider, IdentityProviderError, ProviderRequest};
use crate::backend::USER_AGENT;
use crate::config::GoogleConfig;

const SCOPES: &str = "openid email profile";

/// PKCE code verifier and challenge
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

/// Generate PKCE code verifier and challenge
pub fn generate_pkce() -> Pkce {
    // Two v4 UUIDs give 32 random bytes
    let uuid1 = uuid::Uuid::new_v4();
    let uuid2 = uuid::Uuid::new_v4();
    let mut verifier_bytes = [0u8; 32];
    verifier_bytes[..16].copy_from_slice(uuid1.as_bytes());
    verifier_bytes[16..].copy_from_slice(uuid2.as_bytes());
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    Pkce {
        verifier,
        challenge,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl From<UserInfo> for IdentityAssertion {
    fn from(info: UserInfo) -> Self {
        Self {
            display_name: info.name,
            email: info.email,
            photo_url: info.picture,
        }
    }
}

/// Google identity provider.
pub struct GoogleProvider<C> {
    config: GoogleConfig,
    channel: C,
    http: reqwest::Client,
}

impl<C: AuthorizationChannel + Sync> GoogleProvider<C> {
    pub fn new(config: GoogleConfig, channel: C) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            channel,
            http,
        }
    }

    pub fn redirect_uri(&self) -> String {
        callback::redirect_uri(self.config.redirect_port)
    }

    /// Build the authorization URL for Google OAuth
    pub fn build_auth_url(
        &self,
        client_id: &str,
        pkce: &Pkce,
        state: &str,
        request: &ProviderRequest,
    ) -> String {
        let redirect_uri = self.redirect_uri();
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", SCOPES),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", state),
        ];
        if request.force_account_selection {
            params.push(("prompt", "select_account"));
        }

        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        format!("{}?{query}", self.config.authorize_url)
    }

    async fn exchange_code(
        &self,
        client_id: &str,
        code: &str,
        pkce: &Pkce,
    ) -> Result<String, IdentityProviderError> {
        let redirect_uri = self.redirect_uri();
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "authorization_code")
                .append_pair("client_id", client_id)
                .append_pair("code", code)
                .append_pair("code_verifier", &pkce.verifier)
                .append_pair("redirect_uri", &redirect_uri);
            if let Some(secret) = self.config.effective_client_secret() {
                form.append_pair("client_secret", secret);
            }
            form.finish()
        };

        let response = self
            .http
            .post(&self.config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                IdentityProviderError::Unavailable(format!("token request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityProviderError::Rejected(format!(
                "token exchange failed (HTTP {status}): {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            IdentityProviderError::Rejected(format!("failed to parse token response: {e}"))
        })?;
        Ok(token.access_token)
    }

    async fn fetch_userinfo(
        &self,
        access_token: &str,
    ) -> Result<IdentityAssertion, IdentityProviderError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                IdentityProviderError::Unavailable(format!("userinfo request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityProviderError::Rejected(format!(
                "userinfo failed (HTTP {status}): {body}"
            )));
        }

        let info: UserInfo = response.json().await.map_err(|e| {
            IdentityProviderError::Rejected(format!("failed to parse userinfo: {e}"))
        })?;
        Ok(info.into())
    }
}

impl<C: AuthorizationChannel + Sync> IdentityProvider for GoogleProvider<C> {
    async fn sign_in_interactive(
        &self,
        request: &ProviderRequest,
    ) -> Result<IdentityAssertion, IdentityProviderError> {
        let client_id = self
            .config
            .effective_client_id()
            .ok_or_else(|| {
                IdentityProviderError::Unavailable(
                    "google.client_id is not configured".to_string(),
                )
            })?
            .to_string();

        let pkce = generate_pkce();
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = self.build_auth_url(&client_id, &pkce, &state, request);

        tracing::debug!(
            force_account_selection = request.force_account_selection,
            "starting google authorization"
        );
        let code = self
            .channel
            .authorize(&auth_url, &self.redirect_uri(), &state)
            .await?;

        let access_token = self.exchange_code(&client_id, &code, &pkce).await?;
        let assertion = self.fetch_userinfo(&access_token).await?;
        tracing::debug!(
            has_email = assertion.email.is_some(),
            "google identity received"
        );
        Ok(assertion)
    }
}
