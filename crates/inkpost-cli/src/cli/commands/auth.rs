//! Auth command handlers.

use std::cell::RefCell;
use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};
use std::net::TcpListener;
use std::time::Duration;

use anyhow::Result;
use inkpost_core::auth::callback::{self, AuthorizationChannel, CallbackOutcome};
use inkpost_core::auth::exchange::HOME_ROUTE;
use inkpost_core::auth::google::GoogleProvider;
use inkpost_core::auth::{IdentityProviderError, Navigator, Notifier, SignInFlow, SignInOutcome};
use inkpost_core::backend::BackendClient;
use inkpost_core::config::{Config, GoogleConfig, paths};
use inkpost_core::logging;
use inkpost_core::posts::{self, PostCard};
use inkpost_core::session::{FileSessionStore, SessionStore};

use super::posts::print_recent;

/// Env var that keeps the browser closed (tests, headless machines).
const NO_BROWSER_ENV: &str = "INKPOST_NO_BROWSER";

/// Collects the authorization code in a terminal: opens the browser, waits
/// on the loopback redirect when interactive, otherwise asks for a paste.
struct TerminalChannel {
    port: u16,
    timeout: Duration,
    open_browser: bool,
}

impl TerminalChannel {
    fn from_config(config: &GoogleConfig) -> Self {
        Self {
            port: config.redirect_port,
            timeout: config.callback_timeout(),
            open_browser: std::env::var(NO_BROWSER_ENV).is_err(),
        }
    }
}

impl AuthorizationChannel for TerminalChannel {
    fn authorize(
        &self,
        auth_url: &str,
        _redirect_uri: &str,
        expected_state: &str,
    ) -> impl Future<Output = Result<String, IdentityProviderError>> + Send {
        let auth_url = auth_url.to_string();
        let expected_state = expected_state.to_string();
        let port = self.port;
        let timeout = self.timeout;
        let open_browser = self.open_browser;

        async move {
            println!("To sign in with Google:");
            println!();
            println!("  1. A browser window will open (or visit the URL below)");
            println!("  2. Choose your Google account and allow access");
            println!("  3. If redirected to localhost, return here to continue");
            println!("  4. Otherwise, paste the authorization code or URL");
            println!();
            println!("Authorization URL:");
            println!("  {auth_url}");
            println!();

            if open_browser {
                let _ = open::that(&auth_url);
            }

            // Prefer the local redirect in interactive sessions, fall back to manual paste.
            if io::stdin().is_terminal()
                && let Some(outcome) = wait_for_redirect(port, &expected_state, timeout).await
            {
                return outcome.into_code();
            }

            let input = read_pasted_code().await.map_err(|e| {
                IdentityProviderError::Unavailable(format!("cannot read from stdin: {e}"))
            })?;
            callback::code_from_input(&input, &expected_state)
        }
    }
}

async fn wait_for_redirect(
    port: u16,
    expected_state: &str,
    timeout: Duration,
) -> Option<CallbackOutcome> {
    let listener = match TcpListener::bind(("127.0.0.1", port)) {
        Ok(listener) => listener,
        Err(err) => {
            tracing::warn!(port, error = %err, "cannot listen for OAuth redirect");
            return None;
        }
    };
    let state = expected_state.to_string();
    let wait =
        tokio::task::spawn_blocking(move || callback::wait_for_callback(&listener, &state, timeout));
    match tokio::time::timeout(timeout + Duration::from_secs(1), wait).await {
        Ok(joined) => joined.ok().flatten(),
        Err(_) => {
            tracing::warn!(port, "OAuth redirect wait exceeded its deadline");
            None
        }
    }
}

async fn read_pasted_code() -> io::Result<String> {
    tokio::task::spawn_blocking(|| -> io::Result<String> {
        print!("Paste authorization code (or full redirect URL): ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(input)
    })
    .await
    .map_err(io::Error::other)?
}

/// Remembers where the flow sent the user.
#[derive(Default)]
struct TerminalNavigator {
    route: RefCell<Option<String>>,
}

impl Navigator for TerminalNavigator {
    fn navigate_to(&self, path: &str) {
        tracing::debug!(path, "navigate");
        *self.route.borrow_mut() = Some(path.to_string());
    }
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

pub async fn login(config: &Config) -> Result<()> {
    let store = FileSessionStore::open(paths::session_path())?;

    if let Some(existing) = store.current() {
        println!("Already signed in as {}", existing.label());
        print!("Do you want to sign in again? [y/N] ");
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().lock().read_line(&mut response)?;
        if !response.trim().eq_ignore_ascii_case("y") {
            println!("Login cancelled.");
            return Ok(());
        }
    }

    let backend = BackendClient::new(config.backend_url()?);
    let provider = GoogleProvider::new(
        config.google.clone(),
        TerminalChannel::from_config(&config.google),
    );
    let flow = SignInFlow::new(
        provider,
        backend.clone(),
        store,
        TerminalNavigator::default(),
        TerminalNotifier,
    );

    match flow.attempt_sign_in().await {
        SignInOutcome::SignedIn(session) => {
            println!();
            println!("✓ Signed in as {}", session.label());
            println!("  Session saved to: {}", paths::session_path().display());

            if flow.navigator().route.borrow().as_deref() == Some(HOME_ROUTE) {
                println!();
                let recent = posts::fetch_recent(&backend, config.posts.recent_limit).await;
                let cards: Vec<PostCard> = recent.iter().map(PostCard::from).collect();
                print_recent(&cards);
            }
            Ok(())
        }
        SignInOutcome::Failed(_) => anyhow::bail!(
            "Sign-in did not complete (log: {})",
            logging::log_file(&paths::logs_dir()).display()
        ),
    }
}

pub fn logout() -> Result<()> {
    let store = FileSessionStore::open(paths::session_path())?;

    if store.clear()? {
        println!("✓ Signed out");
        println!("  Session removed from: {}", store.path().display());
    } else {
        println!("Not signed in (no session found).");
    }

    Ok(())
}

pub fn whoami() -> Result<()> {
    let store = FileSessionStore::open(paths::session_path())?;

    match store.current() {
        Some(session) => {
            println!("{}", session.label());
            if let Some(email) = session.email() {
                println!("  email: {email}");
            }
            println!("  id: {}", session.id());
        }
        None => println!("Not signed in."),
    }

    Ok(())
}
