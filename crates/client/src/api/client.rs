//! API client for the battery-profile resource
//!
//! Exposes the two business operations (read and write the profile)
//! and hides session acquisition and recovery. The one retry policy
//! lives here: an auth-failure signal invalidates the session and the
//! whole operation is retried through a fresh login exactly once.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use envoyweb_domain::constants::{
    AUTH_TOKEN_HEADER, BODY_SNIPPET_MAX_LEN, LOGIN_USER_AGENT, PROFILE_API_PATH, UI_ORIGIN,
    XSRF_HEADER,
};
use envoyweb_domain::{
    AuthFailureReason, BatteryProfile, EnvoyWebConfig, EnvoyWebError, ProfileState, Result,
};

use crate::http::HttpClient;
use crate::session::{Session, SessionManager};

/// Response envelope the profile endpoints wrap their payload in.
#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    data: ProfileState,
}

/// Client for the Enlighten battery-profile web API.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and are
/// safe to call from concurrent tasks without external
/// synchronization.
pub struct EnvoyWebClient {
    http: HttpClient,
    config: Arc<EnvoyWebConfig>,
    sessions: SessionManager,
}

impl EnvoyWebClient {
    /// Create a client for the configured account and battery.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: EnvoyWebConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(LOGIN_USER_AGENT)
            .build()?;
        let config = Arc::new(config);
        let sessions = SessionManager::new(http.clone(), Arc::clone(&config));
        Ok(Self { http, config, sessions })
    }

    /// The session manager backing this client. Exposed so a host can
    /// force a fresh login after replacing credentials.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Fetch the battery's current operating profile and backup
    /// reserve.
    pub async fn get_profile(&self) -> Result<ProfileState> {
        let value = self.request_json(Method::GET, self.profile_read_url(), None).await?;
        let envelope: ProfileEnvelope = serde_json::from_value(value).map_err(|err| {
            EnvoyWebError::UnexpectedResponse {
                status: Some(StatusCode::OK.as_u16()),
                detail: format!("profile response shape mismatch: {err}"),
            }
        })?;
        debug!(profile = %envelope.data.profile, "fetched battery profile");
        Ok(envelope.data)
    }

    /// Change the battery's operating profile and backup reserve.
    ///
    /// Validated locally before any network call: the percentage must
    /// be 0-100, and `backup_only` requires 100 (the provider rejects
    /// anything else).
    pub async fn set_profile(
        &self,
        profile: BatteryProfile,
        battery_backup_percentage: u8,
    ) -> Result<()> {
        if battery_backup_percentage > 100 {
            return Err(EnvoyWebError::Validation(format!(
                "battery backup percentage must be 0-100, got {battery_backup_percentage}"
            )));
        }
        if profile == BatteryProfile::BackupOnly && battery_backup_percentage != 100 {
            return Err(EnvoyWebError::Validation(
                "backup_only requires a battery backup percentage of 100".into(),
            ));
        }

        let body = serde_json::json!({
            "profile": profile,
            "batteryBackupPercentage": battery_backup_percentage,
        });
        self.request_json(Method::PUT, self.profile_write_url(), Some(body)).await?;
        info!(%profile, battery_backup_percentage, "battery profile updated");
        Ok(())
    }

    fn profile_read_url(&self) -> Url {
        let mut url = self.profile_write_url();
        url.query_pairs_mut().append_pair("source", "enho").append_pair("locale", "en");
        url
    }

    fn profile_write_url(&self) -> Url {
        let creds = &self.config.credentials;
        let mut url = self.config.base_url.clone();
        url.set_path(&format!("{PROFILE_API_PATH}/{}", creds.battery_id()));
        url.query_pairs_mut().append_pair("userId", &creds.user_id().to_string());
        url
    }

    /// Issue an authenticated request, recovering from session expiry
    /// at most once.
    ///
    /// Expiry is discovered reactively — the provider gives no notice
    /// — via an auth-failure signal: 401, 403, or a redirect back to
    /// the login page. On the signal the session is invalidated by
    /// generation and the operation retried through a fresh login
    /// exactly once; a second signal surfaces `Auth{ReauthFailed}`.
    /// Every other failure propagates immediately (a retried PUT could
    /// write twice).
    async fn request_json(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut reauth_attempted = false;
        loop {
            let session = self.sessions.ensure_session().await?;
            let response = self.send_authenticated(&method, &url, body.as_ref(), &session).await?;

            if is_auth_failure(&response) {
                self.sessions.invalidate(session.generation()).await;
                if reauth_attempted {
                    warn!(%method, "auth failure persisted after reauthentication");
                    return Err(EnvoyWebError::auth(
                        AuthFailureReason::ReauthFailed,
                        format!("authenticated request failed with HTTP {}", response.status()),
                    ));
                }
                debug!(%method, status = %response.status(), "session stale, reauthenticating");
                reauth_attempted = true;
                continue;
            }

            let status = response.status();
            if !status.is_success() {
                let detail = body_snippet(response).await;
                return Err(EnvoyWebError::UnexpectedResponse {
                    status: Some(status.as_u16()),
                    detail,
                });
            }

            let payload: serde_json::Value = response.json().await.map_err(|err| {
                EnvoyWebError::UnexpectedResponse {
                    status: Some(status.as_u16()),
                    detail: format!("malformed JSON body: {err}"),
                }
            })?;
            if !payload.is_object() {
                return Err(EnvoyWebError::UnexpectedResponse {
                    status: Some(status.as_u16()),
                    detail: "expected a JSON object".into(),
                });
            }
            return Ok(payload);
        }
    }

    async fn send_authenticated(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        session: &Session,
    ) -> Result<Response> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTH_TOKEN_HEADER, session.auth_token())
            .header(XSRF_HEADER, session.xsrf_token())
            .header("username", self.config.credentials.user_id().to_string())
            .header("content-type", "application/json")
            .header("origin", UI_ORIGIN)
            .header("referer", format!("{UI_ORIGIN}/"))
            .header("requestid", uuid::Uuid::new_v4().to_string())
            .header("cookie", session.cookies.header_value());
        if let Some(body) = body {
            request = request.json(body);
        }
        self.http.send(request).await
    }
}

/// Auth-failure signal: 401/403, or a redirect back to the login page.
fn is_auth_failure(response: &Response) -> bool {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return true;
    }
    if status.is_redirection() {
        return response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .is_some_and(|location| location.contains("/login"));
    }
    false
}

/// Bounded excerpt of a response body for error details.
async fn body_snippet(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    let mut snippet: String = body.chars().take(BODY_SNIPPET_MAX_LEN).collect();
    if snippet.len() < body.len() {
        snippet.push_str("...");
    }
    snippet
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use envoyweb_domain::Credentials;

    use super::*;

    const LOGIN_HTML: &str = r#"<html><body><form action="/login/login" method="post">
<input type="hidden" name="authenticity_token" value="form-token-123">
</form></body></html>"#;

    const PROFILE_PATH: &str = "/service/batteryConfig/api/v1/profile/42";

    fn test_client(uri: &str) -> EnvoyWebClient {
        let config = EnvoyWebConfig::new(Credentials::new("user@example.com", "hunter2", 42, 7))
            .with_base_url(uri.parse().unwrap())
            .with_timeout(Duration::from_secs(5));
        EnvoyWebClient::new(config).unwrap()
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "XSRF-TOKEN=xsrf-abc; Path=/")
                    .append_header("set-cookie", "_enlighten_4_session=sess-1; Path=/; HttpOnly")
                    .set_body_string(LOGIN_HTML),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/login"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/web/42/today")
                    .append_header(
                        "set-cookie",
                        "enlighten_manager_token_production=tok-1; Path=/; HttpOnly",
                    ),
            )
            .mount(server)
            .await;
    }

    fn profile_body(profile: &str, percentage: u8) -> serde_json::Value {
        serde_json::json!({
            "data": { "profile": profile, "batteryBackupPercentage": percentage },
            "message": "success",
        })
    }

    async fn count(server: &MockServer, method_name: &str, path_name: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == method_name && r.url.path() == path_name)
            .count()
    }

    #[tokio::test]
    async fn get_profile_returns_state() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .and(query_param("userId", "7"))
            .and(query_param("source", "enho"))
            .and(header("e-auth-token", "tok-1"))
            .and(header("x-xsrf-token", "xsrf-abc"))
            .and(header("username", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body("backup_only", 100)))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let state = client.get_profile().await.unwrap();
        assert_eq!(
            state,
            ProfileState {
                profile: BatteryProfile::BackupOnly,
                battery_backup_percentage: 100
            }
        );
    }

    #[tokio::test]
    async fn session_cookies_ride_on_profile_calls() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(profile_body("self-consumption", 20)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.get_profile().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let profile_get = requests
            .iter()
            .find(|r| r.url.path() == PROFILE_PATH)
            .expect("profile GET was sent");
        let cookie = profile_get.headers.get("cookie").unwrap().to_str().unwrap();
        assert!(cookie.contains("_enlighten_4_session=sess-1"));
        assert!(cookie.contains("enlighten_manager_token_production=tok-1"));
        assert!(profile_get.headers.get("requestid").is_some());
    }

    #[tokio::test]
    async fn stale_session_recovers_with_one_relogin() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        // First profile call hits an expired session; the retry after
        // relogin succeeds.
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(profile_body("self-consumption", 20)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let state = client.get_profile().await.unwrap();
        assert_eq!(state.profile, BatteryProfile::SelfConsumption);
        assert_eq!(count(&server, "POST", "/login/login").await, 2);
        assert_eq!(count(&server, "GET", PROFILE_PATH).await, 2);
    }

    #[tokio::test]
    async fn persistent_auth_failure_stops_after_one_retry() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.get_profile().await.unwrap_err();
        assert_eq!(err.auth_reason(), Some(AuthFailureReason::ReauthFailed));
        assert!(err.requires_reauthentication());
        // Exactly two logins and two profile attempts, never more.
        assert_eq!(count(&server, "POST", "/login/login").await, 2);
        assert_eq!(count(&server, "GET", PROFILE_PATH).await, 2);
    }

    #[tokio::test]
    async fn redirect_to_login_is_an_auth_failure_signal() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/login/login"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.get_profile().await.unwrap_err();
        assert_eq!(err.auth_reason(), Some(AuthFailureReason::ReauthFailed));
        assert_eq!(count(&server, "POST", "/login/login").await, 2);
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.get_profile().await.unwrap_err();
        match err {
            EnvoyWebError::UnexpectedResponse { status: Some(500), detail } => {
                assert!(detail.contains("internal error"));
            }
            other => panic!("expected unexpected-response error, got {other:?}"),
        }
        assert_eq!(count(&server, "POST", "/login/login").await, 1);
        assert_eq!(count(&server, "GET", PROFILE_PATH).await, 1);
    }

    #[tokio::test]
    async fn malformed_body_is_not_retried() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.get_profile().await.unwrap_err();
        assert!(matches!(err, EnvoyWebError::UnexpectedResponse { .. }));
        assert_eq!(count(&server, "GET", PROFILE_PATH).await, 1);
    }

    #[tokio::test]
    async fn timeout_keeps_the_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(profile_body("self-consumption", 20))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = EnvoyWebConfig::new(Credentials::new("user@example.com", "hunter2", 42, 7))
            .with_base_url(server.uri().parse().unwrap())
            .with_timeout(Duration::from_millis(250));
        let client = EnvoyWebClient::new(config).unwrap();

        let err = client.get_profile().await.unwrap_err();
        assert!(matches!(err, EnvoyWebError::Timeout(_)));
        assert!(err.is_transient());

        // A timeout says nothing about the credentials: the session
        // survives and no second login happens.
        assert!(client.sessions().is_authenticated().await);
        assert_eq!(count(&server, "POST", "/login/login").await, 1);
    }

    #[tokio::test]
    async fn set_profile_validates_before_any_network_call() {
        let server = MockServer::start().await;
        let client = test_client(&server.uri());

        let err = client.set_profile(BatteryProfile::SelfConsumption, 150).await.unwrap_err();
        assert!(matches!(err, EnvoyWebError::Validation(_)));

        let err = client.set_profile(BatteryProfile::BackupOnly, 50).await.unwrap_err();
        assert!(matches!(err, EnvoyWebError::Validation(_)));

        // The string form of an unknown mode is rejected at parse time.
        let err = "invalid-mode".parse::<BatteryProfile>().unwrap_err();
        assert!(matches!(err, EnvoyWebError::Validation(_)));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_profile_sends_wire_body() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("PUT"))
            .and(path(PROFILE_PATH))
            .and(query_param("userId", "7"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(profile_body("self-consumption", 20)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client.set_profile(BatteryProfile::SelfConsumption, 20).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let put = requests.iter().find(|r| r.method.as_str() == "PUT").expect("PUT was sent");
        let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "profile": "self-consumption", "batteryBackupPercentage": 20 })
        );
    }
}
