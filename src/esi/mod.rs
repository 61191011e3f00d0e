//! ESI HTTP client
//!
//! Bearer-authenticated GETs against the EVE Swagger Interface and the SSO
//! verify endpoint. Synchronous (reqwest blocking), one request at a time.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::auth::Credential;
use crate::config::Config;
use crate::domain::mail::{CharacterId, Identity, MailBody, MailHeader, MailId};
use crate::mail::MailApi;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {url}: {source}")]
    Malformed {
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Raw payload behind a status or parse failure.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } | ApiError::Malformed { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Build the blocking HTTP client shared by the SSO and ESI calls.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
}

pub struct EsiClient {
    http: Client,
    api_base: String,
    login_base: String,
    credential: Credential,
}

impl EsiClient {
    pub fn new(
        http: Client,
        api_base: impl Into<String>,
        login_base: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            login_base: login_base.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn from_config(cfg: &Config, http: Client, credential: Credential) -> Self {
        Self::new(http, &cfg.api_base_url, &cfg.login_url, credential)
    }

    /// GET `url` with the bearer token and return the body bytes.
    pub fn get_raw(&self, url: &Url) -> Result<Vec<u8>, ApiError> {
        let transport = |source: reqwest::Error| ApiError::Transport {
            url: url.to_string(),
            source,
        };

        log::debug!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.credential.access_token)
            .send()
            .map_err(transport)?;

        let status = response.status();
        let bytes = response.bytes().map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApiError> {
        let raw = self.get_raw(url)?;
        serde_json::from_slice(&raw).map_err(|source| ApiError::Malformed {
            url: url.to_string(),
            body: String::from_utf8_lossy(&raw).into_owned(),
            source,
        })
    }

    /// Resolve which character the credential belongs to.
    pub fn verify(&self) -> Result<Identity, ApiError> {
        let url = Url::parse(&format!("{}/oauth/verify", self.login_base))?;
        self.get_json(&url)
    }

    fn mail_list_url(
        &self,
        character_id: CharacterId,
        last_mail_id: Option<MailId>,
    ) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!(
            "{}/characters/{character_id}/mail/",
            self.api_base
        ))?;
        if let Some(last) = last_mail_id {
            url.query_pairs_mut()
                .append_pair("last_mail_id", &last.to_string());
        }
        Ok(url)
    }

    fn mail_url(&self, character_id: CharacterId, mail_id: MailId) -> Result<Url, ApiError> {
        Ok(Url::parse(&format!(
            "{}/characters/{character_id}/mail/{mail_id}/",
            self.api_base
        ))?)
    }
}

impl MailApi for EsiClient {
    fn mail_headers(
        &self,
        character_id: CharacterId,
        last_mail_id: Option<MailId>,
    ) -> Result<Vec<MailHeader>, ApiError> {
        let url = self.mail_list_url(character_id, last_mail_id)?;
        self.get_json(&url)
    }

    fn mail(&self, character_id: CharacterId, mail_id: MailId) -> Result<MailBody, ApiError> {
        let url = self.mail_url(character_id, mail_id)?;
        self.get_json(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> EsiClient {
        EsiClient::new(
            Client::new(),
            "https://esi.evetech.net/latest/",
            "https://login.eveonline.com",
            Credential {
                access_token: "at".into(),
                refresh_token: "rt".into(),
            },
        )
    }

    #[test]
    fn test_first_page_is_unscoped() {
        let url = client().mail_list_url(2112625428, None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://esi.evetech.net/latest/characters/2112625428/mail/"
        );
    }

    #[test]
    fn test_later_pages_carry_cursor() {
        let url = client().mail_list_url(2112625428, Some(331477591)).unwrap();
        assert_eq!(
            url.as_str(),
            "https://esi.evetech.net/latest/characters/2112625428/mail/?last_mail_id=331477591"
        );
    }

    #[test]
    fn test_mail_url() {
        let url = client().mail_url(1, 42).unwrap();
        assert_eq!(url.as_str(), "https://esi.evetech.net/latest/characters/1/mail/42/");
    }
}
