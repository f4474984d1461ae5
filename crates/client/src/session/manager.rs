//! Session manager: login protocol and single-flight reauthentication
//!
//! Manages the authenticated-session lifecycle:
//! - Login protocol (anti-forgery fetch, credential submission, token
//!   capture)
//! - Single-flight login for concurrent callers
//! - Generation-counted invalidation, safe against reauth races

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use md5::{Digest, Md5};
use reqwest::Method;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use envoyweb_domain::constants::{LOGIN_PATH, XSRF_COOKIE_NAMES};
use envoyweb_domain::{AuthFailureReason, EnvoyWebConfig, EnvoyWebError, Result};

use super::cookies::CookieJar;
use super::login::{extract_auth_token, parse_login_page, LoginPage};
use crate::http::HttpClient;

/// One authenticated logical connection to the provider.
///
/// Either absent (held by the manager) or complete: anti-forgery
/// token, auth token, and cookie bag all present. Never partially
/// updated; a new login replaces it wholesale under a fresh
/// generation.
#[derive(Clone)]
pub struct Session {
    pub(crate) xsrf_token: String,
    pub(crate) auth_token: String,
    pub(crate) cookies: CookieJar,
    generation: u64,
}

impl Session {
    /// Generation this session was published under. Pass it back to
    /// [`SessionManager::invalidate`] when the session proves stale.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Anti-forgery token echoed on authenticated requests.
    #[must_use]
    pub fn xsrf_token(&self) -> &str {
        &self.xsrf_token
    }

    /// Auth token attached to authenticated requests.
    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("xsrf_token", &"<redacted>")
            .field("auth_token", &"<redacted>")
            .field("cookies", &self.cookies.len())
            .field("generation", &self.generation)
            .finish()
    }
}

struct SessionState {
    current: Option<Session>,
    generation: u64,
    /// Attempt number and error of the most recent failed login, kept
    /// so waiters queued behind that attempt share its outcome.
    last_failure: Option<(u64, EnvoyWebError)>,
}

/// Owns the authenticated session and the login protocol.
///
/// The session state sits behind a `tokio::sync::Mutex` that is held
/// across the login round trips: when N callers concurrently find the
/// session absent, exactly one login executes and the rest observe its
/// result — the published session on success, a clone of the error on
/// failure. Only a caller arriving after the failed attempt completed
/// triggers a fresh login. Login is never retried here — the manager
/// cannot tell a transient network failure from bad credentials, so
/// retry policy belongs to the API client.
pub struct SessionManager {
    http: HttpClient,
    config: Arc<EnvoyWebConfig>,
    state: Mutex<SessionState>,
    /// Count of completed login attempts; read before queueing on the
    /// mutex to tell waiters from genuinely later callers.
    attempts: AtomicU64,
}

impl SessionManager {
    #[must_use]
    pub fn new(http: HttpClient, config: Arc<EnvoyWebConfig>) -> Self {
        Self {
            http,
            config,
            state: Mutex::new(SessionState {
                current: None,
                generation: 0,
                last_failure: None,
            }),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the current complete session, logging in first if none
    /// exists.
    ///
    /// # Errors
    /// - `Auth{CredentialsRejected}` if the provider refuses the login
    /// - `Auth{ProtocolChanged}` if an expected token cannot be located
    /// - `Timeout` / `Network` / `UnexpectedResponse` on transport or
    ///   login-page failures
    pub async fn ensure_session(&self) -> Result<Session> {
        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.state.lock().await;
        if let Some(session) = &state.current {
            return Ok(session.clone());
        }
        // An attempt that completed after this caller started waiting
        // answers for it: one wave of callers, one login attempt.
        if let Some((attempt, error)) = &state.last_failure {
            if *attempt > observed {
                return Err(error.clone());
            }
        }

        let attempt = self.attempts.load(Ordering::Acquire) + 1;
        match self.login(state.generation + 1).await {
            Ok(session) => {
                state.generation = session.generation();
                state.current = Some(session.clone());
                state.last_failure = None;
                self.attempts.store(attempt, Ordering::Release);
                info!(generation = session.generation(), "published new session");
                Ok(session)
            }
            Err(error) => {
                state.last_failure = Some((attempt, error.clone()));
                self.attempts.store(attempt, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Drop the current session if it still belongs to `generation`.
    ///
    /// A stale generation is a no-op: a slow caller must not clobber a
    /// session that a concurrent reauthentication already replaced.
    pub async fn invalidate(&self, generation: u64) {
        let mut state = self.state.lock().await;
        match &state.current {
            Some(session) if session.generation() == generation => {
                state.current = None;
                info!(generation, "session invalidated");
            }
            Some(session) => {
                debug!(
                    stale = generation,
                    current = session.generation(),
                    "ignoring invalidate for superseded session"
                );
            }
            None => {}
        }
    }

    /// Whether a complete session is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.current.is_some()
    }

    /// Run the full login protocol and assemble a complete session.
    async fn login(&self, generation: u64) -> Result<Session> {
        let mut cookies = CookieJar::new();

        let page = self.fetch_login_page(&mut cookies).await?;
        let authenticity_token = page.authenticity_token.clone().ok_or_else(|| {
            EnvoyWebError::auth(
                AuthFailureReason::ProtocolChanged,
                "login page carries no authenticity token (form input or csrf-token meta tag)",
            )
        })?;

        let auth_token =
            self.submit_credentials(&mut cookies, &authenticity_token, &page.form_defaults).await?;

        let xsrf_token = XSRF_COOKIE_NAMES
            .iter()
            .find_map(|name| cookies.get(name))
            .map(str::to_string)
            .ok_or_else(|| {
                EnvoyWebError::auth(
                    AuthFailureReason::ProtocolChanged,
                    "no anti-forgery cookie present after login",
                )
            })?;

        debug!(cookies = cookies.len(), "login protocol complete");
        Ok(Session { xsrf_token, auth_token, cookies, generation })
    }

    /// Step 1: fetch the login page, collecting cookies and the
    /// anti-forgery token.
    async fn fetch_login_page(&self, cookies: &mut CookieJar) -> Result<LoginPage> {
        let request = self
            .http
            .request(Method::GET, self.config.base_url.clone())
            .header("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("accept-language", "en-US,en;q=0.7")
            .header("upgrade-insecure-requests", "1");

        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnvoyWebError::UnexpectedResponse {
                status: Some(status.as_u16()),
                detail: "login page fetch failed".into(),
            });
        }

        cookies.absorb(response.headers());
        let html = response
            .text()
            .await
            .map_err(|err| EnvoyWebError::Network(format!("failed to read login page: {err}")))?;
        Ok(parse_login_page(&html))
    }

    /// Steps 2-3: submit credentials and capture the auth token.
    async fn submit_credentials(
        &self,
        cookies: &mut CookieJar,
        authenticity_token: &str,
        defaults: &BTreeMap<String, String>,
    ) -> Result<String> {
        let creds = &self.config.credentials;
        // The web UI submits an MD5 digest of the password, never the
        // plaintext.
        let password_digest = format!("{:x}", Md5::digest(creds.password().as_bytes()));

        let default = |name: &str, fallback: &str| {
            defaults
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        let form: Vec<(&str, String)> = vec![
            ("utf8", default("utf8", "\u{2713}")),
            ("authenticity_token", authenticity_token.to_string()),
            ("user[email]", creds.email().to_string()),
            ("user[password]", password_digest),
            ("secured_user", default("secured_user", "true")),
            ("locale", default("locale", "en")),
            ("commit", default("commit", "Sign In")),
        ];

        let mut url = self.config.base_url.clone();
        url.set_path(LOGIN_PATH);
        let origin = self.config.base_url.origin().ascii_serialization();

        let mut request = self
            .http
            .request(Method::POST, url)
            .header("origin", origin.clone())
            .header("referer", format!("{origin}/"))
            .header("cache-control", "max-age=0")
            .form(&form);
        if !cookies.is_empty() {
            request = request.header("cookie", cookies.header_value());
        }

        let response = self.http.send(request).await?;
        let status = response.status();
        // 302/303 is the normal post-login redirect; redirects are not
        // followed, so it surfaces here.
        if !matches!(status.as_u16(), 200 | 302 | 303) {
            warn!(%status, "login rejected by provider");
            return Err(EnvoyWebError::auth(
                AuthFailureReason::CredentialsRejected,
                format!("login failed with HTTP {status}"),
            ));
        }

        let headers = response.headers().clone();
        cookies.absorb(&headers);
        let body = response.text().await.unwrap_or_default();

        extract_auth_token(&headers, &body).ok_or_else(|| {
            EnvoyWebError::auth(
                AuthFailureReason::ProtocolChanged,
                "login response carries no auth token (cookie, header, or body)",
            )
        })
    }
}
