//! Authorization code delivery: loopback redirect listener and pasted input.

use std::future::Future;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::{Duration, Instant};

use super::IdentityProviderError;

/// Path Google redirects to on the loopback listener.
pub const CALLBACK_PATH: &str = "/oauth2callback";

/// Delivers the authorization code for a prepared authorization URL.
///
/// Implementations show `auth_url` to the user and resolve once a code for
/// `expected_state` is available. Dismissal resolves to
/// [`IdentityProviderError::Cancelled`].
pub trait AuthorizationChannel {
    fn authorize(
        &self,
        auth_url: &str,
        redirect_uri: &str,
        expected_state: &str,
    ) -> impl Future<Output = Result<String, IdentityProviderError>> + Send;
}

/// Builds the redirect URI for a loopback port.
pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{port}{CALLBACK_PATH}")
}

/// What arrived on the loopback listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    /// The provider redirected with `error=...` (e.g. `access_denied`).
    Denied(String),
}

impl CallbackOutcome {
    /// Maps the redirect to the code, or to the provider error it stands for.
    ///
    /// `access_denied` means the user dismissed the consent screen.
    ///
    /// # Errors
    /// `Cancelled` for `access_denied`, `Rejected` for any other error code.
    pub fn into_code(self) -> Result<String, IdentityProviderError> {
        match self {
            CallbackOutcome::Code(code) => Ok(code),
            CallbackOutcome::Denied(reason) if reason == "access_denied" => {
                Err(IdentityProviderError::Cancelled)
            }
            CallbackOutcome::Denied(reason) => Err(IdentityProviderError::Rejected(reason)),
        }
    }
}

/// Waits for one redirect on `listener`.
///
/// Returns `None` on timeout, on accept errors and for requests that do not
/// match the callback path or `expected_state`. Blocks the calling thread.
pub fn wait_for_callback(
    listener: &TcpListener,
    expected_state: &str,
    timeout: Duration,
) -> Option<CallbackOutcome> {
    if listener.set_nonblocking(true).is_err() {
        return None;
    }

    let start = Instant::now();
    loop {
        match listener.accept() {
            Ok((mut stream, _)) => {
                // A silent connection must not outlive the overall deadline.
                let remaining = timeout
                    .saturating_sub(start.elapsed())
                    .max(Duration::from_millis(10));
                let _ = stream.set_nonblocking(false);
                let _ = stream.set_read_timeout(Some(remaining));
                let _ = stream.set_write_timeout(Some(remaining));
                let mut buffer = [0u8; 4096];
                let read = stream.read(&mut buffer).unwrap_or(0);
                let request = String::from_utf8_lossy(&buffer[..read]);
                let outcome = parse_callback_request(&request, expected_state);
                let response = match &outcome {
                    Some(CallbackOutcome::Code(_)) => success_response(),
                    Some(CallbackOutcome::Denied(_)) => denied_response(),
                    None => error_response(),
                };
                let _ = stream.write_all(response.as_bytes());
                // Browsers also probe /favicon.ico; keep waiting for the real redirect.
                if outcome.is_some() {
                    return outcome;
                }
                if start.elapsed() > timeout {
                    return None;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                if start.elapsed() > timeout {
                    return None;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(_) => return None,
        }
    }
}

/// Extracts the outcome from a raw HTTP request line.
pub fn parse_callback_request(request: &str, expected_state: &str) -> Option<CallbackOutcome> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let _method = parts.next()?;
    let path = parts.next()?;

    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_string())
    };

    if query("state")? != expected_state {
        return None;
    }
    if let Some(error) = query("error") {
        return Some(CallbackOutcome::Denied(error));
    }
    query("code")
        .filter(|c| !c.is_empty())
        .map(CallbackOutcome::Code)
}

/// Extracts the code from pasted input, checking the state when one is given.
///
/// # Errors
/// `Rejected` on a state mismatch, `Cancelled` when no code was pasted.
pub fn code_from_input(
    input: &str,
    expected_state: &str,
) -> Result<String, IdentityProviderError> {
    let (code, provided_state) = parse_authorization_input(input);
    if let Some(provided) = provided_state
        && provided != expected_state
    {
        return Err(IdentityProviderError::Rejected("state mismatch".to_string()));
    }
    code.ok_or(IdentityProviderError::Cancelled)
}

/// Parses a pasted authorization input into code + optional state.
///
/// Accepts a full redirect URL, a `code=...&state=...` query string, or the
/// bare code.
pub fn parse_authorization_input(input: &str) -> (Option<String>, Option<String>) {
    let value = input.trim();
    if value.is_empty() {
        return (None, None);
    }

    if let Ok(url) = url::Url::parse(value) {
        let code = url.query_pairs().find(|(k, _)| k == "code").map(|(_, v)| v);
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v);
        return (code.map(|v| v.to_string()), state.map(|v| v.to_string()));
    }

    if value.contains("code=") {
        let params = url::form_urlencoded::parse(value.as_bytes()).collect::<Vec<_>>();
        let code = params.iter().find(|(k, _)| k == "code").map(|(_, v)| v);
        let state = params.iter().find(|(k, _)| k == "state").map(|(_, v)| v);
        return (
            code.map(std::string::ToString::to_string),
            state.map(std::string::ToString::to_string),
        );
    }

    (Some(value.to_string()), None)
}

fn html_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn success_response() -> String {
    html_response(
        "200 OK",
        "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Signed in</title></head><body><p>Sign-in complete. Return to your terminal to continue.</p></body></html>",
    )
}

fn denied_response() -> String {
    html_response(
        "200 OK",
        "<!doctype html><html><head><meta charset=\"utf-8\" /><title>Sign-in cancelled</title></head><body><p>Sign-in was cancelled. You can close this tab.</p></body></html>",
    )
}

fn error_response() -> String {
    html_response("400 Bad Request", "Invalid OAuth callback")
}
