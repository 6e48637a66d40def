//! OAuth 2.0 for installed apps: PKCE login, refresh and revocation.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Bind a local HTTP listener on the first free port of a range
//! 3. Open the browser on Google's consent page
//! 4. Google redirects to the listener with the authorization code
//! 5. Exchange the code (with the verifier) for access and refresh tokens
//!
//! Revoking posts the refresh token (or the access token when there is no
//! refresh token) to Google's revocation endpoint, which invalidates the
//! grant as a whole.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{GoogleError, GoogleResult};

use super::config::OAuthCredentials;
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// PKCE verifier length in bytes, before base64 encoding.
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long to wait for the browser to come back.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_PATH: &str = "/callback";

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>calpost is authorized</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization failed</h1>\
    <p>You can close this window.</p></body></html>";

/// What the revocation endpoint reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    /// The grant was revoked.
    Revoked,
    /// Google no longer knew the token (expired or revoked elsewhere).
    AlreadyInvalid,
}

/// OAuth client for Google APIs.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    revoke_url: String,
}

impl OAuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GoogleError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            http_client,
            revoke_url: GOOGLE_REVOKE_URL.to_string(),
        })
    }

    /// Sends revocations to `url` instead of Google's endpoint.
    pub fn with_revoke_url(mut self, url: impl Into<String>) -> Self {
        self.revoke_url = url.into();
        self
    }

    /// Runs the browser consent flow and returns the obtained tokens.
    ///
    /// # Errors
    ///
    /// Fails when no port in `port_range` is free, when the user denies
    /// access, when the callback does not arrive within five minutes or when
    /// the code exchange is rejected.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> GoogleResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback(port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let auth_url = pkce.auth_url(&self.credentials.client_id, &redirect_uri, scopes)?;

        info!("opening browser for Google consent");
        debug!(%auth_url, "authorization URL");

        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nOpen this URL in your browser to continue:\n\n{}\n", auth_url);
        }

        let callback = tokio::task::spawn_blocking(move || wait_for_callback(listener))
            .await
            .map_err(|e| GoogleError::internal(format!("callback task failed: {}", e)))??;

        if callback.state.as_deref() != Some(pkce.state.as_str()) {
            return Err(GoogleError::authentication(
                "OAuth state mismatch, refusing the authorization code",
            ));
        }

        info!("received authorization code, exchanging for tokens");

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", callback.code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self.post_token_form(&params, "token exchange").await?;

        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            granted_scopes(response.scope.as_deref(), scopes),
        ))
    }

    /// Obtains a new access token from a refresh token.
    ///
    /// Returns the new access token and its lifetime in seconds.
    pub async fn refresh_token(&self, refresh_token: &str) -> GoogleResult<(String, Option<i64>)> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self.post_token_form(&params, "token refresh").await?;

        debug!("refreshed access token");
        Ok((response.access_token, response.expires_in))
    }

    /// Revokes the grant the given token belongs to.
    pub async fn revoke(&self, token: &str) -> GoogleResult<Revocation> {
        let response = self
            .http_client
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| GoogleError::network(format!("revoke request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        revocation_from_response(status, &body)
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> GoogleResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| GoogleError::network(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GoogleError::network(format!("failed to read {} response: {}", what, e)))?;

        token_from_response(status, &body, what)
    }
}

fn token_from_response(status: StatusCode, body: &str, what: &str) -> GoogleResult<TokenResponse> {
    if !status.is_success() {
        let reason = serde_json::from_str::<OAuthErrorBody>(body)
            .map(|e| e.describe())
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(GoogleError::authentication(format!(
            "{} failed ({}): {}",
            what, status, reason
        )));
    }

    serde_json::from_str(body)
        .map_err(|e| GoogleError::invalid_response(format!("invalid {} response: {}", what, e)))
}

fn revocation_from_response(status: StatusCode, body: &str) -> GoogleResult<Revocation> {
    if status.is_success() {
        return Ok(Revocation::Revoked);
    }

    let error = serde_json::from_str::<OAuthErrorBody>(body).ok();
    match error {
        Some(e) if status == StatusCode::BAD_REQUEST && e.error == "invalid_token" => {
            Ok(Revocation::AlreadyInvalid)
        }
        Some(e) => Err(GoogleError::authentication(format!(
            "revocation failed ({}): {}",
            status,
            e.describe()
        ))),
        None if status.is_server_error() => Err(GoogleError::server(format!(
            "revocation failed ({})",
            status
        ))),
        None => Err(GoogleError::authentication(format!(
            "revocation failed ({}): {}",
            status,
            body.trim()
        ))),
    }
}

/// Scopes actually granted, falling back to the requested ones.
fn granted_scopes(granted: Option<&str>, requested: &[String]) -> Vec<String> {
    match granted {
        Some(scope) if !scope.trim().is_empty() => {
            scope.split_whitespace().map(str::to_string).collect()
        }
        _ => requested.to_vec(),
    }
}

fn bind_loopback(port_range: (u16, u16)) -> GoogleResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            debug!("bound loopback listener on port {}", port);
            return Ok((listener, port));
        }
    }
    Err(GoogleError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Authorization code and state delivered to the loopback listener.
#[derive(Debug, PartialEq, Eq)]
struct Callback {
    code: String,
    state: Option<String>,
}

fn wait_for_callback(listener: TcpListener) -> GoogleResult<Callback> {
    let (tx, rx) = mpsc::channel();

    // The accept loop blocks; run it on its own thread so we can time out.
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = answer_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(GoogleError::authentication(
            "timed out waiting for the browser to return",
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(GoogleError::internal("callback listener stopped"))
        }
    }
}

/// Reads one request, answers the browser and returns the parsed callback.
///
/// Returns `None` for requests that are not the OAuth callback (favicon
/// requests and the like) so the listener keeps waiting.
fn answer_callback(mut stream: TcpStream) -> Option<GoogleResult<Callback>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_callback_request(&request_line)?;
    let page = if result.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
    let _ = stream.write_all(page.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses `GET /callback?code=...&state=... HTTP/1.1`.
fn parse_callback_request(request_line: &str) -> Option<GoogleResult<Callback>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let url = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut denied = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => denied = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(match (denied, code) {
        (Some(reason), _) => Err(GoogleError::authentication(format!(
            "authorization denied: {}",
            reason
        ))),
        (None, Some(code)) => Ok(Callback { code, state }),
        (None, None) => Err(GoogleError::authentication(
            "missing authorization code in callback",
        )),
    })
}

/// PKCE (RFC 7636) verifier, challenge and CSRF state for one login.
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 of the verifier, base64url encoded).
    pub challenge: String,
    /// Random state echoed back by Google.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the Google consent page URL.
    ///
    /// Asks for offline access with forced consent so Google always returns
    /// a refresh token.
    pub fn auth_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> GoogleResult<Url> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| GoogleError::internal(format!("failed to build authorization URL: {}", e)))
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Error body returned by the token and revocation endpoints.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthErrorBody {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(desc) => format!("{} ({})", self.error, desc),
            None => self.error.clone(),
        }
    }
}
