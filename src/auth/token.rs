use std::fmt;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Tokens returned by the SSO (in-memory only, never written to disk)
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct CodeGrant<'a> {
    grant_type: &'static str,
    code: &'a str,
}

/// Swaps an authorization code for a [`Credential`] at the SSO token endpoint.
pub struct TokenExchanger {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenExchanger {
    pub fn new(
        http: Client,
        login_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", login_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn exchange(&self, code: &str) -> Result<Credential, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&CodeGrant {
                grant_type: "authorization_code",
                code,
            })
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(AuthError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| AuthError::MalformedToken { body, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let cred = Credential {
            access_token: "very-secret".into(),
            refresh_token: "also-secret".into(),
        };
        let shown = format!("{cred:?}");
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_code_grant_body() {
        let body = serde_json::to_value(CodeGrant {
            grant_type: "authorization_code",
            code: "abc",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"grant_type": "authorization_code", "code": "abc"})
        );
    }

    #[test]
    fn test_token_url_ignores_trailing_slash() {
        let ex = TokenExchanger::new(Client::new(), "https://login.eveonline.com/", "id", "secret");
        assert_eq!(ex.token_url, "https://login.eveonline.com/oauth/token");
    }
}
