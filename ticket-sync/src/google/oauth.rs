//! OAuth 2.0 installed-application flow.
//!
//! Sign-in opens a loopback listener on an ephemeral port, sends the user
//! to the consent page and exchanges the returned code for tokens. Refresh
//! uses the stored refresh token; `invalid_grant` means consent is gone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use axum::Router;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

use super::credentials::{ClientSecrets, StoredToken};
use super::error::AuthError;

/// Scopes requested at sign-in.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar.events.owned",
    "https://www.googleapis.com/auth/drive.file",
];

/// How long to wait for the user to finish signing in.
const DEFAULT_SIGN_IN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Obtains tokens from the authorization server.
pub trait OAuthFlow: Send + Sync {
    /// Exchange a refresh token for a new access token.
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<StoredToken, AuthError>> + Send;

    /// Run the interactive sign-in.
    fn authorize(&self) -> impl Future<Output = Result<StoredToken, AuthError>> + Send;
}

/// Page shown in the browser after the redirect.
#[derive(Template)]
#[template(path = "oauth_complete.html")]
pub struct OAuthCompleteTemplate {
    pub success: bool,
    pub calendar: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Query parameters of the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    calendar: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>,
}

/// The installed-application flow against Google's endpoints.
#[derive(Debug, Clone)]
pub struct InstalledAppFlow {
    secrets: ClientSecrets,
    scopes: Vec<String>,
    calendar: String,
    http: reqwest::Client,
    sign_in_timeout: Duration,
}

impl InstalledAppFlow {
    pub fn new(secrets: ClientSecrets, scopes: Vec<String>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            secrets,
            scopes,
            calendar: "your calendar".to_string(),
            http,
            sign_in_timeout: DEFAULT_SIGN_IN_TIMEOUT,
        })
    }

    /// Name of the calendar shown on the completion page.
    pub fn with_calendar_name(mut self, calendar: impl Into<String>) -> Self {
        self.calendar = calendar.into();
        self
    }

    pub fn with_sign_in_timeout(mut self, timeout: Duration) -> Self {
        self.sign_in_timeout = timeout;
        self
    }

    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
    ) -> Result<reqwest::Url, AuthError> {
        let scope = self.scopes.join(" ");
        reqwest::Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::Secrets {
            path: "auth_uri".into(),
            message: e.to_string(),
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body).ok();
            return Err(match detail {
                Some(d) if d.error == "invalid_grant" => AuthError::Revoked {
                    message: d.error_description.unwrap_or(d.error),
                },
                Some(d) => AuthError::Api {
                    status: status.as_u16(),
                    message: d.error_description.unwrap_or(d.error),
                },
                None => AuthError::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| AuthError::Json {
            message: e.to_string(),
        })
    }

    fn stored(&self, response: TokenResponse, previous_refresh: Option<&str>) -> StoredToken {
        let scopes = match response.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => self.scopes.clone(),
        };
        StoredToken {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in),
            scopes,
        }
    }

    /// Wait for the redirect on `listener` and return the authorization code.
    async fn receive_code(
        &self,
        listener: tokio::net::TcpListener,
        state: String,
    ) -> Result<String, AuthError> {
        let (code_tx, code_rx) = oneshot::channel();
        let app = Router::new()
            .route("/", get(oauth_callback))
            .with_state(CallbackState {
                expected_state: Arc::from(state),
                calendar: Arc::from(self.calendar.as_str()),
                sender: Arc::new(Mutex::new(Some(code_tx))),
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let received = tokio::time::timeout(self.sign_in_timeout, code_rx).await;
        let _ = shutdown_tx.send(());
        if tokio::time::timeout(Duration::from_secs(5), server).await.is_err() {
            warn!("sign-in listener did not shut down in time");
        }

        match received {
            Err(_) => Err(AuthError::SignIn {
                message: "timed out waiting for the browser".to_string(),
            }),
            Ok(Err(_)) => Err(AuthError::SignIn {
                message: "sign-in listener stopped".to_string(),
            }),
            Ok(Ok(result)) => result.map_err(|message| AuthError::SignIn { message }),
        }
    }
}

impl OAuthFlow for InstalledAppFlow {
    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken, AuthError> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .await?;
        info!("refreshed access token");
        Ok(self.stored(response, Some(refresh_token)))
    }

    async fn authorize(&self) -> Result<StoredToken, AuthError> {
        let sign_in_error = |e: std::io::Error| AuthError::SignIn {
            message: e.to_string(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(sign_in_error)?;
        let port = listener.local_addr().map_err(sign_in_error)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let state = sign_in_state();
        let url = self.authorization_url(&redirect_uri, &state)?;

        info!(%url, "waiting for sign-in");
        eprintln!("Open this address in a browser to allow calendar access:\n\n    {url}\n");

        let code = self.receive_code(listener, state).await?;
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .await?;
        info!("signed in");
        Ok(self.stored(response, None))
    }
}

/// Redirect handler: report the outcome to the waiting flow and the browser.
async fn oauth_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let outcome = callback_outcome(&params, &state.expected_state);

    let template = OAuthCompleteTemplate {
        success: outcome.is_ok(),
        calendar: state.calendar.to_string(),
        message: outcome.as_ref().err().cloned().unwrap_or_default(),
    };

    // Requests with a foreign state are answered but otherwise ignored
    if params.state.as_deref() == Some(&*state.expected_state)
        && let Some(sender) = state.sender.lock().await.take()
    {
        let _ = sender.send(outcome);
    }

    Html(
        template
            .render()
            .unwrap_or_else(|e| format!("Template error: {}", e)),
    )
}

fn callback_outcome(params: &CallbackParams, expected_state: &str) -> Result<String, String> {
    if params.state.as_deref() != Some(expected_state) {
        return Err("The sign-in response did not match this request.".to_string());
    }
    if let Some(error) = &params.error {
        return Err(format!("Google reported: {error}"));
    }
    params
        .code
        .clone()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "No authorization code was returned.".to_string())
}

/// An unguessable value tying the redirect to this sign-in.
fn sign_in_state() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use axum::Form;
    use axum::http::StatusCode;
    use axum::routing::post;

    fn secrets(token_uri: &str) -> ClientSecrets {
        ClientSecrets {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            auth_uri: "https://accounts.example.com/o/oauth2/auth".into(),
            token_uri: token_uri.into(),
        }
    }

    /// A token endpoint that revokes the refresh token "revoked".
    async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
        match form.get("refresh_token").map(String::as_str) {
            Some("revoked") => (
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
            ),
            Some(_) => (
                StatusCode::OK,
                r#"{"access_token":"ya29.new","expires_in":3599,"scope":"a b","token_type":"Bearer"}"#,
            ),
            None => (StatusCode::BAD_REQUEST, r#"{"error":"invalid_request"}"#),
        }
    }

    async fn serve_token_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/token", post(token_endpoint));
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}/token")
    }

    fn flow(token_uri: &str) -> InstalledAppFlow {
        let scopes = SCOPES.iter().map(|s| s.to_string()).collect();
        InstalledAppFlow::new(secrets(token_uri), scopes).unwrap()
    }

    #[test]
    fn authorization_url_parameters() {
        let flow = flow("https://oauth2.example.com/token");
        let url = flow.authorization_url("http://127.0.0.1:5555/", "xyz").unwrap();
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(params["client_id"], "client-id");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:5555/");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], "xyz");
        assert!(params["scope"].contains("calendar.events"));
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token() {
        let uri = serve_token_endpoint().await;
        let token = flow(&uri).refresh("1//refresh").await.unwrap();

        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(token.scopes, vec!["a", "b"]);
        assert!(!token.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn invalid_grant_is_revoked() {
        let uri = serve_token_endpoint().await;
        let err = flow(&uri).refresh("revoked").await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked { .. }));
    }

    #[test]
    fn callback_outcomes() {
        let ok = CallbackParams {
            code: Some("4/abc".into()),
            state: Some("s".into()),
            error: None,
        };
        assert_eq!(callback_outcome(&ok, "s"), Ok("4/abc".to_string()));
        assert!(callback_outcome(&ok, "other").is_err());

        let denied = CallbackParams {
            code: None,
            state: Some("s".into()),
            error: Some("access_denied".into()),
        };
        assert_eq!(
            callback_outcome(&denied, "s"),
            Err("Google reported: access_denied".to_string())
        );
    }

    #[test]
    fn completion_page() {
        let page = OAuthCompleteTemplate {
            success: true,
            calendar: "primary".into(),
            message: String::new(),
        }
        .render()
        .unwrap();
        assert!(page.contains("Signed in"));

        let page = OAuthCompleteTemplate {
            success: false,
            calendar: String::new(),
            message: "Google reported: access_denied".into(),
        }
        .render()
        .unwrap();
        assert!(page.contains("access_denied"));
    }

    #[test]
    fn states_differ() {
        assert_ne!(sign_in_state(), sign_in_state());
        assert_eq!(sign_in_state().len(), 32);
    }
}
