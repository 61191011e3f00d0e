//! Shared test helpers: a canned-response HTTP server and a scripted mail API.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use eve_mail_backup::domain::mail::{CharacterId, MailBody};
use eve_mail_backup::{ApiError, MailApi, MailHeader, MailId};

/// What the mock server saw.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves `responses` in order, one per request, then shuts down.
pub struct MockServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<Recorded>>,
}

impl MockServer {
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let mut request = server.recv().unwrap();

                let mut req_body = String::new();
                request.as_reader().read_to_string(&mut req_body).unwrap();
                seen.push(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect(),
                    body: req_body,
                });

                let header: tiny_http::Header =
                    "Content-Type: application/json".parse().unwrap();
                request
                    .respond(
                        tiny_http::Response::from_string(body)
                            .with_status_code(status)
                            .with_header(header),
                    )
                    .unwrap();
            }
            seen
        });

        Self { addr, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for all canned responses to be served and return the requests.
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().unwrap()
    }
}

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn header(id: MailId, subject: &str, from: i64, timestamp: &str) -> MailHeader {
    MailHeader {
        id,
        subject: subject.to_string(),
        timestamp: Some(ts(timestamp)),
        from,
    }
}

enum Scripted {
    Body(MailBody),
    Garbage(String),
    Status(u16, String),
}

/// In-memory inbox: pages of headers plus bodies by id.
pub struct ScriptedInbox {
    pages: RefCell<VecDeque<Vec<MailHeader>>>,
    bodies: HashMap<MailId, Scripted>,
    pub list_calls: RefCell<Vec<Option<MailId>>>,
    pub fetch_calls: RefCell<Vec<MailId>>,
}

impl ScriptedInbox {
    pub fn new(pages: Vec<Vec<MailHeader>>) -> Self {
        Self {
            pages: RefCell::new(pages.into()),
            bodies: HashMap::new(),
            list_calls: RefCell::new(Vec::new()),
            fetch_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_body(mut self, id: MailId, subject: &str, body: &str) -> Self {
        self.bodies.insert(
            id,
            Scripted::Body(MailBody {
                body: body.to_string(),
                subject: subject.to_string(),
            }),
        );
        self
    }

    /// Make the body endpoint answer `raw` (not a mail) for `id`.
    pub fn with_garbage(mut self, id: MailId, raw: &str) -> Self {
        self.bodies.insert(id, Scripted::Garbage(raw.to_string()));
        self
    }

    /// Make the body endpoint answer `status` with `raw` for `id`.
    pub fn with_status(mut self, id: MailId, status: u16, raw: &str) -> Self {
        self.bodies.insert(id, Scripted::Status(status, raw.to_string()));
        self
    }
}

impl MailApi for ScriptedInbox {
    fn mail_headers(
        &self,
        _character_id: CharacterId,
        last_mail_id: Option<MailId>,
    ) -> Result<Vec<MailHeader>, ApiError> {
        self.list_calls.borrow_mut().push(last_mail_id);
        Ok(self.pages.borrow_mut().pop_front().unwrap_or_default())
    }

    fn mail(&self, character_id: CharacterId, mail_id: MailId) -> Result<MailBody, ApiError> {
        self.fetch_calls.borrow_mut().push(mail_id);
        let url = format!("https://esi.test/characters/{character_id}/mail/{mail_id}/");
        match self.bodies.get(&mail_id) {
            Some(Scripted::Body(body)) => Ok(body.clone()),
            Some(Scripted::Garbage(raw)) => Err(ApiError::Malformed {
                url,
                body: raw.clone(),
                source: serde_json::from_str::<MailBody>(raw).unwrap_err(),
            }),
            Some(Scripted::Status(status, raw)) => Err(ApiError::Status {
                url,
                status: *status,
                body: raw.clone(),
            }),
            None => panic!("no body scripted for mail {mail_id}"),
        }
    }
}
