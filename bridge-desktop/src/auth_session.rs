//! Browser authorization session backed by a loopback HTTP listener.
//!
//! Implicit-grant providers put the access token in the URL fragment, which
//! browsers never send to a server. The listener therefore answers the first
//! hit on the callback path with a small page that re-requests
//! `/callback/relay?<fragment>`, and reads the parameters from that request.

use async_trait::async_trait;
use bridge_traits::{
    auth_session::{AuthSessionLauncher, AuthSessionRequest, AuthSessionResult},
    error::{BridgeError, Result},
};
use std::io::Cursor;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiny_http::{Header, Response, Server};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default time a user gets to finish the consent page.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(120);

const CALLBACK_PATH: &str = "/callback";
const RELAY_PATH: &str = "/callback/relay";

const RELAY_PAGE: &str = "<!DOCTYPE html><html><body><script>\
window.location.replace('/callback/relay?' + window.location.hash.substring(1));\
</script></body></html>";

const DONE_PAGE: &str = "<!DOCTYPE html><html><body>\
<p>Sign-in complete. You can close this window.</p></body></html>";

type BrowserOpener = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Desktop [`AuthSessionLauncher`] that opens the system browser and waits
/// for the provider to redirect to `http://localhost:<port>/callback`.
///
/// Only one session runs at a time; a concurrent `start` reports
/// [`AuthSessionResult::Locked`].
pub struct LoopbackAuthSession {
    server: Arc<Server>,
    local_addr: SocketAddr,
    timeout: Duration,
    opener: BrowserOpener,
    active: Mutex<()>,
}

impl LoopbackAuthSession {
    /// Bind the loopback listener. Pass `0` to let the OS pick a port.
    pub fn new(port: u16) -> Result<Self> {
        let server = Server::http((Ipv4Addr::LOCALHOST, port)).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to bind loopback listener: {}", e))
        })?;
        let local_addr = server.server_addr().to_ip().ok_or_else(|| {
            BridgeError::OperationFailed("Loopback listener has no IP address".to_string())
        })?;

        let opener: BrowserOpener = Arc::new(|url: &str| webbrowser::open(url));

        Ok(Self {
            server: Arc::new(server),
            local_addr,
            timeout: DEFAULT_SESSION_TIMEOUT,
            opener,
            active: Mutex::new(()),
        })
    }

    /// Give up on the browser after `timeout` and report a dismissal.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the function used to open the authorization URL.
    pub fn with_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.opener = Arc::new(opener);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl AuthSessionLauncher for LoopbackAuthSession {
    fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.local_addr.port(), CALLBACK_PATH)
    }

    #[instrument(skip(self, request), fields(port = self.local_addr.port()))]
    async fn start(&self, request: AuthSessionRequest) -> Result<AuthSessionResult> {
        let Ok(_guard) = self.active.try_lock() else {
            warn!("Authorization session already open");
            return Ok(AuthSessionResult::Locked);
        };

        (self.opener)(&request.auth_url).map_err(|e| {
            BridgeError::NotAvailable(format!("Failed to open system browser: {}", e))
        })?;
        info!("Opened authorization page, waiting for redirect");

        let server = Arc::clone(&self.server);
        let redirect_uri = self.redirect_uri();
        let deadline = Instant::now() + self.timeout;

        let result = tokio::task::spawn_blocking(move || {
            serve_until_redirect(&server, &redirect_uri, deadline)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Loopback listener task failed: {}", e)))?;

        if result == AuthSessionResult::Dismiss {
            warn!(
                timeout_secs = self.timeout.as_secs(),
                "Authorization session timed out"
            );
        }

        Ok(result)
    }
}

/// Answer requests until the redirect parameters arrive or `deadline` passes.
///
/// tiny_http reads every connection on its own worker, so a stalled client
/// never holds up the redirect. Per-request failures are logged and skipped.
fn serve_until_redirect(server: &Server, redirect_uri: &str, deadline: Instant) -> AuthSessionResult {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return AuthSessionResult::Dismiss;
        }

        let request = match server.recv_timeout(remaining) {
            Ok(Some(request)) => request,
            Ok(None) => return AuthSessionResult::Dismiss,
            Err(err) => {
                warn!(error = %err, "Failed to receive loopback request");
                continue;
            }
        };

        debug!(target_url = %request.url(), "Loopback request");
        let (response, outcome) = route(request.url(), redirect_uri);

        if let Err(err) = request.respond(response) {
            warn!(error = %err, "Failed to answer loopback request");
        }

        if let Some(outcome) = outcome {
            return outcome;
        }
    }
}

type Page = Response<Cursor<Vec<u8>>>;

fn route(target: &str, redirect_uri: &str) -> (Page, Option<AuthSessionResult>) {
    let Ok(parsed) = Url::parse(&format!("http://localhost{}", target)) else {
        return (html("").with_status_code(400), None);
    };
    let query = parsed.query().unwrap_or("");

    let redirect = match parsed.path() {
        RELAY_PATH => format!("{}#{}", redirect_uri, query),
        CALLBACK_PATH if query.is_empty() => return (html(RELAY_PAGE), None),
        // Providers report consent errors in the query string.
        CALLBACK_PATH => format!("{}?{}", redirect_uri, query),
        _ => return (html("").with_status_code(404), None),
    };

    match AuthSessionResult::from_redirect_url(&redirect) {
        Ok(outcome) => (html(DONE_PAGE), Some(outcome)),
        Err(err) => {
            warn!(error = %err, "Unreadable redirect parameters");
            (html("").with_status_code(400), None)
        }
    }
}

fn html(body: &str) -> Page {
    let response = Response::from_data(body.as_bytes().to_vec());
    match Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    async fn fetch(addr: SocketAddr, target: &str) -> String {
        reqwest::get(format!("http://{}{}", addr, target))
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    fn authorize_request(session: &LoopbackAuthSession) -> AuthSessionRequest {
        AuthSessionRequest::new(
            "https://id.twitch.tv/oauth2/authorize",
            session.redirect_uri(),
        )
    }

    #[tokio::test]
    async fn test_redirect_uri_uses_bound_port() {
        let session = LoopbackAuthSession::new(0).unwrap();
        let port = session.local_addr().port();

        assert_ne!(port, 0);
        assert_eq!(
            session.redirect_uri(),
            format!("http://localhost:{}/callback", port)
        );
    }

    #[test]
    fn test_route_pages() {
        let redirect_uri = "http://localhost:3000/callback";

        let (page, outcome) = route("/callback", redirect_uri);
        assert_eq!(page.status_code().0, 200);
        assert!(outcome.is_none());

        let (page, outcome) = route("/favicon.ico", redirect_uri);
        assert_eq!(page.status_code().0, 404);
        assert!(outcome.is_none());

        let (_, outcome) = route("/callback/relay?access_token=tok1&state=abc", redirect_uri);
        assert!(matches!(outcome, Some(AuthSessionResult::Success { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fragment_relay_yields_success() {
        let session = LoopbackAuthSession::new(0).unwrap();
        let addr = session.local_addr();
        let session = session
            .with_timeout(Duration::from_secs(5))
            .with_opener(move |_url| {
                tokio::spawn(async move {
                    let page = fetch(addr, "/callback").await;
                    assert!(page.contains("/callback/relay"));
                    fetch(addr, "/favicon.ico").await;
                    fetch(addr, "/callback/relay?access_token=tok1&state=abc").await;
                });
                Ok(())
            });

        let result = session.start(authorize_request(&session)).await.unwrap();

        match result {
            AuthSessionResult::Success { params, .. } => {
                assert_eq!(params.get("access_token"), Some(&"tok1".to_string()));
                assert_eq!(params.get("state"), Some(&"abc".to_string()));
            }
            other => panic!("Expected success, got {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_idle_and_reset_connections_do_not_block_redirect() {
        let session = LoopbackAuthSession::new(0).unwrap();
        let addr = session.local_addr();
        let session = session
            .with_timeout(Duration::from_secs(3))
            .with_opener(move |_url| {
                tokio::spawn(async move {
                    // A preconnected socket that never sends a request.
                    let _idle = TcpStream::connect(addr).await.unwrap();
                    drop(TcpStream::connect(addr).await.unwrap());

                    fetch(addr, "/callback/relay?access_token=tok1&state=abc").await;
                });
                Ok(())
            });

        let result = session.start(authorize_request(&session)).await.unwrap();

        assert!(
            matches!(result, AuthSessionResult::Success { ref params, .. } if params["access_token"] == "tok1"),
            "expected success, got {result}"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_query_error_yields_error_result() {
        let session = LoopbackAuthSession::new(0).unwrap();
        let addr = session.local_addr();
        let session = session
            .with_timeout(Duration::from_secs(5))
            .with_opener(move |_url| {
                tokio::spawn(async move {
                    fetch(addr, "/callback?error=access_denied&state=abc").await;
                });
                Ok(())
            });

        let result = session.start(authorize_request(&session)).await.unwrap();

        assert!(matches!(
            result,
            AuthSessionResult::Error { error_code: Some(ref code), .. } if code == "access_denied"
        ));
    }

    #[tokio::test]
    async fn test_timeout_yields_dismiss() {
        let session = LoopbackAuthSession::new(0)
            .unwrap()
            .with_timeout(Duration::from_millis(50))
            .with_opener(|_url| Ok(()));

        let result = session.start(authorize_request(&session)).await.unwrap();

        assert_eq!(result, AuthSessionResult::Dismiss);
    }

    #[tokio::test]
    async fn test_opener_failure_is_an_error() {
        let session = LoopbackAuthSession::new(0).unwrap().with_opener(|_url| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"))
        });

        let result = session.start(authorize_request(&session)).await;

        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }
}
