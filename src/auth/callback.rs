//! One-shot local listener for the OAuth redirect.
//!
//! The listener is bound before the browser is sent to the SSO, runs on its
//! own thread, and hands exactly one outcome back over a capacity-one channel.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tiny_http::{Header, Request, Response, Server};
use url::Url;

use super::AuthError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><script>window.close();</script></head>
<body>Success! You can close this page now.<br/>Your mail is being saved as you read this.</body>
</html>
"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>Sign-in failed. Check the terminal for details and run the backup again.</body>
</html>
"#;

const NO_CODE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>No authorization code found in the redirect. You can close this tab.</body>
</html>
"#;

type Outcome = Result<String, AuthError>;

/// Where to listen, derived from the registered redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub addr: SocketAddr,
    pub path: String,
}

impl CallbackTarget {
    pub fn from_redirect_uri(redirect_uri: &str) -> Result<Self, AuthError> {
        let redirect = Url::parse(redirect_uri)
            .map_err(|e| AuthError::InvalidRedirect(format!("'{redirect_uri}': {e}")))?;

        let host = redirect
            .host_str()
            .ok_or_else(|| AuthError::InvalidRedirect(format!("missing host: {redirect_uri}")))?;

        let port = redirect.port_or_known_default().ok_or_else(|| {
            AuthError::InvalidRedirect(format!("missing/unknown port: {redirect_uri}"))
        })?;

        // Loopback names bind to 127.0.0.1; anything else must be a literal IP.
        let ip: IpAddr = match host {
            "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
            other => other.trim_matches(['[', ']']).parse().map_err(|_| {
                AuthError::InvalidRedirect(format!(
                    "host must be localhost/127.0.0.1 or an IP: {other}"
                ))
            })?,
        };

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            path: redirect.path().to_string(),
        })
    }
}

pub struct CallbackReceiver {
    local_addr: SocketAddr,
    rx: Receiver<Outcome>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CallbackReceiver {
    /// Bind `target` and start serving until a code arrives or `deadline` elapses.
    pub fn bind(
        target: &CallbackTarget,
        expected_state: Option<String>,
        deadline: Duration,
    ) -> Result<Self, AuthError> {
        let server = Server::http(target.addr).map_err(|source| AuthError::Bind {
            addr: target.addr,
            source,
        })?;
        let local_addr = server.server_addr();
        log::debug!("oauth callback listener on {local_addr}{}", target.path);

        let (tx, rx) = mpsc::sync_channel(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let listener = Listener {
            path: target.path.clone(),
            expected_state,
            timeout: deadline,
            deadline: Instant::now() + deadline,
            cancel: cancel.clone(),
        };

        let worker = thread::Builder::new()
            .name("oauth-callback".into())
            .spawn(move || listener.serve(server, tx))
            .map_err(AuthError::Listener)?;

        Ok(Self {
            local_addr,
            rx,
            cancel,
            worker: Some(worker),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until the listener delivers its single outcome.
    pub fn wait(self) -> Result<String, AuthError> {
        self.rx.recv().map_err(|_| AuthError::ListenerClosed)?
    }
}

impl Drop for CallbackReceiver {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::warn!("oauth callback listener panicked");
        }
    }
}

struct Listener {
    path: String,
    expected_state: Option<String>,
    timeout: Duration,
    deadline: Instant,
    cancel: Arc<AtomicBool>,
}

impl Listener {
    // Owns the server: returning drops it and frees the port.
    fn serve(self, server: Server, tx: SyncSender<Outcome>) {
        let outcome = loop {
            if self.cancel.load(Ordering::SeqCst) {
                log::debug!("oauth callback listener cancelled");
                return;
            }
            let now = Instant::now();
            if now >= self.deadline {
                break Err(AuthError::CallbackTimeout(self.timeout));
            }

            let request = match server.recv_timeout((self.deadline - now).min(POLL_INTERVAL)) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => break Err(AuthError::Listener(e)),
            };

            if let Some(outcome) = self.handle(request) {
                break outcome;
            }
        };

        if let Err(e) = &outcome {
            log::debug!("oauth callback listener finished with error: {e}");
        }
        let _ = tx.send(outcome);
    }

    /// `None` means keep listening.
    fn handle(&self, request: Request) -> Option<Outcome> {
        // request.url() is path+query, e.g. "/callback?code=...&state=..."
        let full = format!("http://localhost{}", request.url());
        let Ok(parsed) = Url::parse(&full) else {
            respond(request, 400, "Bad redirect");
            return None;
        };

        if parsed.path() != self.path {
            respond(request, 404, "Not found");
            return None;
        }

        let params = CallbackParams::from_url(&parsed);
        match params.verdict(self.expected_state.as_deref()) {
            Some(Ok(code)) => {
                respond_html(request, 200, SUCCESS_PAGE);
                Some(Ok(code))
            }
            Some(Err(e)) => {
                respond_html(request, 400, FAILURE_PAGE);
                Some(Err(e))
            }
            None => {
                respond_html(request, 400, NO_CODE_PAGE);
                None
            }
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "code" => params.code = Some(v.into_owned()),
                "state" => params.state = Some(v.into_owned()),
                "error" => params.error = Some(v.into_owned()),
                "error_description" => params.error_description = Some(v.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn verdict(self, expected_state: Option<&str>) -> Option<Outcome> {
        if let Some(error) = self.error {
            let detail = match self.error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            };
            return Some(Err(AuthError::Denied(detail)));
        }

        let code = self.code.filter(|c| !c.is_empty())?;
        if let Some(expected) = expected_state
            && self.state.as_deref() != Some(expected)
        {
            return Some(Err(AuthError::StateMismatch));
        }
        Some(Ok(code))
    }
}

fn respond(request: Request, status: u16, body: &str) {
    let _ = request.respond(Response::from_string(body).with_status_code(status));
}

fn respond_html(request: Request, status: u16, body: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = "Content-Type: text/html; charset=utf-8".parse::<Header>() {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}
