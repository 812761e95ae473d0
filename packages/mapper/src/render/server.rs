//! Disposable HTTP server for the spliced page
//!
//! This server is NOT a daemon. It:
//! - Starts on a random port
//! - Serves one document at `/`, answering anything else with 404
//! - Exits once the document was served, the timeout passed, or its
//!   [`DisposableServer`] handle was dropped

use crate::error::{RenderError, RenderResult};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Response, Server};
use tracing::debug;

/// How long a disposable server waits for the browser
pub const SERVE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DocumentServer {
    server: Arc<Server>,
    port: u16,
    html: String,
}

impl DocumentServer {
    /// Create a new server on a random available port
    pub fn new(html: String) -> RenderResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let server = Server::from_listener(listener, None)
            .map_err(|e| RenderError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

        Ok(Self {
            server: Arc::new(server),
            port,
            html,
        })
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Answer requests until the document has been served once or `timeout`
    /// passes. Returns whether the document was served.
    pub fn serve_document(&self, timeout: Duration) -> RenderResult<bool> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let Some(request) = self.server.recv_timeout(remaining)? else {
                return Ok(false);
            };

            let path = request.url().split('?').next().unwrap_or("").to_string();
            if path == "/" {
                let mut response = Response::from_string(self.html.as_str());
                if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=UTF-8"[..]) {
                    response = response.with_header(header);
                }
                request.respond(response)?;
                return Ok(true);
            }

            debug!(path = %path, "Disposable server: not found");
            request.respond(Response::from_string("").with_status_code(404))?;
        }
    }
}

/// Handle to a server thread started by [`start_disposable_server`]
///
/// Dropping the handle unblocks the thread and joins it.
pub struct DisposableServer {
    url: String,
    server: Arc<Server>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DisposableServer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the thread to finish on its own
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DisposableServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.server.unblock();
            let _ = thread.join();
            debug!(url = %self.url, "Disposable server released");
        }
    }
}

/// Start a disposable server in a background thread
///
/// The thread runs until it has served the document, [`SERVE_TIMEOUT`]
/// passes, or the returned handle is dropped.
pub fn start_disposable_server(html: String) -> RenderResult<DisposableServer> {
    let document_server = DocumentServer::new(html)?;
    let url = document_server.url();
    let server = Arc::clone(&document_server.server);

    let thread = thread::spawn(move || {
        if let Err(e) = document_server.serve_document(SERVE_TIMEOUT) {
            debug!(error = %e, "Disposable server stopped");
        }
    });

    Ok(DisposableServer {
        url,
        server,
        thread: Some(thread),
    })
}
