pub mod callback;
pub mod token;

use std::net::SocketAddr;
use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use reqwest::blocking::Client;
use thiserror::Error;

use crate::config::{Config, ConfigError};

pub use callback::{CallbackReceiver, CallbackTarget};
pub use token::{Credential, TokenExchanger};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid redirect_uri {0}")]
    InvalidRedirect(String),
    #[error("invalid authorize url: {0}")]
    InvalidAuthUrl(String),
    #[error("failed to bind OAuth callback server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("OAuth callback listener failed: {0}")]
    Listener(#[source] std::io::Error),
    #[error("OAuth callback listener stopped without a result")]
    ListenerClosed,
    #[error("no authorization code received within {0:?}")]
    CallbackTimeout(Duration),
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("OAuth state mismatch in callback")]
    StateMismatch,
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned HTTP {status}")]
    TokenRejected { status: u16, body: String },
    #[error("could not parse token response: {source}")]
    MalformedToken {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AuthError {
    /// Response body worth showing the user, if the server sent one.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            AuthError::TokenRejected { body, .. } | AuthError::MalformedToken { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}

/// Build the SSO authorize URL with a fresh CSRF state.
pub fn authorize_url(cfg: &Config) -> Result<(String, CsrfToken), AuthError> {
    let auth_url = AuthUrl::new(format!(
        "{}/oauth/authorize",
        cfg.login_url.trim_end_matches('/')
    ))
    .map_err(|e| AuthError::InvalidAuthUrl(e.to_string()))?;
    let redirect = RedirectUrl::new(cfg.redirect_uri.clone())
        .map_err(|e| AuthError::InvalidRedirect(format!("'{}': {e}", cfg.redirect_uri)))?;

    let oauth_client = BasicClient::new(ClientId::new(cfg.client_id.clone()), None, auth_url, None)
        .set_redirect_uri(redirect);

    let (url, csrf) = oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(cfg.scope.clone()))
        .url();

    Ok((url.to_string(), csrf))
}

/// Interactive sign-in: listen, send the user to the SSO, exchange the code.
pub fn login(cfg: &Config, http: &Client, open_browser: bool) -> Result<Credential, AuthError> {
    let client_secret = cfg.client_secret()?;
    let target = CallbackTarget::from_redirect_uri(&cfg.redirect_uri)?;
    let (url, csrf) = authorize_url(cfg)?;

    // Listen first so a fast redirect can't beat us to the port.
    let receiver = CallbackReceiver::bind(
        &target,
        Some(csrf.secret().clone()),
        cfg.callback_timeout(),
    )?;

    println!(
        "\nWelcome to the EVE Online mail backup!\n\
         Sign in with the character whose mail you want to keep. Every mail will be\n\
         saved as a markdown text file under {}.\n\n\
         Open this URL in your browser and authorize the application:\n{url}\n",
        cfg.output_dir.display()
    );

    if open_browser && let Err(e) = open::that(&url) {
        log::warn!("could not open browser automatically: {e}");
    }

    let code = receiver.wait()?;
    log::info!("authorization code received, exchanging for tokens");

    TokenExchanger::new(http.clone(), &cfg.login_url, &cfg.client_id, client_secret).exchange(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_authorize_url_carries_client_and_scope() {
        let cfg = Config::default();
        let (url, csrf) = authorize_url(&cfg).unwrap();
        let url = Url::parse(&url).unwrap();

        assert_eq!(url.host_str(), Some("login.eveonline.com"));
        assert_eq!(url.path(), "/oauth/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("client_id"), Some(cfg.client_id.as_str()));
        assert_eq!(get("redirect_uri"), Some("http://localhost:12525/callback"));
        assert_eq!(get("scope"), Some("esi-mail.read_mail.v1"));
        assert_eq!(get("state"), Some(csrf.secret().as_str()));
    }

    #[test]
    fn test_login_requires_secret_before_binding() {
        let cfg = Config::default();
        let err = login(&cfg, &Client::new(), false).unwrap_err();
        assert!(matches!(
            err,
            AuthError::Config(ConfigError::MissingClientSecret)
        ));
    }

    #[test]
    fn test_raw_body_only_for_server_payloads() {
        let err = AuthError::TokenRejected {
            status: 401,
            body: "{\"error\":\"invalid_grant\"}".into(),
        };
        assert_eq!(err.raw_body(), Some("{\"error\":\"invalid_grant\"}"));
        assert!(AuthError::StateMismatch.raw_body().is_none());
    }
}
