// src/reload/server.rs

//! Development server: static files over HTTP plus live-reload over
//! WebSocket.
//!
//! - HTTP (`tiny_http`) on `server_port` serves the output root. HTML
//!   responses get the reload client injected before `</body>`.
//! - WebSocket (`tungstenite`) on the next free port from `server_port + 1`
//!   forwards every [`ReloadNotice`] to each connected client.
//!
//! Both loops run on plain threads and poll a shared shutdown flag.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message;
use tungstenite::WebSocket;

use crate::reload::broadcaster::ReloadBroadcaster;
use crate::reload::notice::ReloadNotice;

const MAX_PORT_RETRIES: u16 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const CLIENT_SCRIPT: &str = r#"<script>
(function () {
  var cssInjection = __CSS_INJECTION__;
  var ws = new WebSocket("ws://" + location.hostname + ":__WS_PORT__");
  function bust(url) {
    var u = new URL(url, location.href);
    u.searchParams.set("_sitepipe", Date.now());
    return u.toString();
  }
  ws.onmessage = function (event) {
    var notice = JSON.parse(event.data);
    if (notice.kind === "css" && cssInjection) {
      var links = document.querySelectorAll('link[rel="stylesheet"]');
      for (var i = 0; i < links.length; i++) {
        var href = new URL(links[i].href, location.href).pathname;
        if (href === notice.path) { links[i].href = bust(links[i].href); return; }
      }
      return;
    }
    if (notice.kind === "asset") {
      var imgs = document.querySelectorAll("img");
      var swapped = false;
      for (var j = 0; j < imgs.length; j++) {
        if (new URL(imgs[j].src, location.href).pathname === notice.path) {
          imgs[j].src = bust(imgs[j].src);
          swapped = true;
        }
      }
      if (swapped) { return; }
    }
    location.reload();
  };
})();
</script>"#;

/// Running dev server. Dropping it does not stop the threads; call
/// [`DevServer::stop`].
#[derive(Debug)]
pub struct DevServer {
    http_addr: SocketAddr,
    ws_port: u16,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl DevServer {
    /// Bind both listeners and start serving `root`.
    pub fn start(root: PathBuf, port: u16, broadcaster: ReloadBroadcaster) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));

        let (server, http_addr) = bind_with_retry(port)?;
        let (listener, ws_port) = try_bind_port(http_addr.port().saturating_add(1), MAX_PORT_RETRIES)?;
        listener
            .set_nonblocking(true)
            .context("setting live-reload listener non-blocking")?;

        let script = CLIENT_SCRIPT
            .replace("__WS_PORT__", &ws_port.to_string())
            .replace(
                "__CSS_INJECTION__",
                if broadcaster.supports_css_injection() { "true" } else { "false" },
            );

        let http_thread = {
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || serve_http(server, root, script, shutdown))
        };
        let ws_thread = {
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || accept_clients(listener, broadcaster, shutdown))
        };

        info!(%http_addr, ws_port, "dev server listening");

        Ok(Self {
            http_addr,
            ws_port,
            shutdown,
            threads: vec![http_thread, ws_thread],
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn ws_port(&self) -> u16 {
        self.ws_port
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}/", self.http_addr.port())
    }

    /// Signal all threads and wait for the HTTP and accept loops to exit.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.threads {
            if handle.join().is_err() {
                warn!("dev server thread panicked");
            }
        }
        info!("dev server stopped");
    }
}

/// Open the served site in the user's browser. Failures are only logged.
pub fn open_browser(url: &str) {
    if let Err(err) = webbrowser::open(url) {
        warn!(%url, error = %err, "could not open browser");
    }
}

fn bind_with_retry(base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    info!(base_port, port, "port in use; serving on the next free one");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    Err(anyhow!(
        "failed to bind HTTP server after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.unwrap_or_default()
    ))
}

fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                let actual = listener.local_addr()?.port();
                return Ok((listener, actual));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "failed to bind live-reload server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

fn serve_http(server: Server, root: PathBuf, script: String, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                if let Err(err) = handle_request(request, &root, &script) {
                    debug!(error = %err, "request failed");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "HTTP server error; stopping");
                break;
            }
        }
    }
}

fn handle_request(request: Request, root: &Path, script: &str) -> Result<()> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        return send(request, 405, "text/plain; charset=utf-8", b"405 Method Not Allowed".to_vec());
    }

    let Some(path) = resolve_path(request.url(), root) else {
        return send(request, 404, "text/plain; charset=utf-8", b"404 Not Found".to_vec());
    };

    let content_type = content_type(&path);
    let body = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let body = if content_type.starts_with("text/html") {
        inject_client(&body, script)
    } else {
        body
    };
    send(request, 200, content_type, body)
}

fn send(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
        response = response.with_header(header);
    }
    if let Ok(header) = Header::from_bytes("Cache-Control", "no-store") {
        response = response.with_header(header);
    }
    request.respond(response)?;
    Ok(())
}

/// Map a request URL onto a file under `root`.
///
/// The path is percent-decoded after the query is cut off. Directories
/// resolve to their `index.html`; anything that escapes the root or is not
/// UTF-8 once decoded resolves to nothing.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let clean = decoded.trim_matches('/');
    if clean.split('/').any(|seg| seg == "..") {
        return None;
    }

    let local = root.join(clean);
    let canonical = local.canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_client(content: &[u8], script: &str) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";
    let script = script.as_bytes();

    let mut out = Vec::with_capacity(content.len() + script.len());
    match content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            out.extend_from_slice(&content[..pos]);
            out.extend_from_slice(script);
            out.extend_from_slice(&content[pos..]);
        }
        None => {
            out.extend_from_slice(content);
            out.extend_from_slice(script);
        }
    }
    out
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

fn accept_clients(listener: TcpListener, broadcaster: ReloadBroadcaster, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "live-reload client connecting");
                // Handshake runs in blocking mode.
                let _ = stream.set_nonblocking(false);
                let broadcaster = broadcaster.clone();
                let shutdown = Arc::clone(&shutdown);
                std::thread::spawn(move || serve_client(stream, broadcaster, shutdown));
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "live-reload accept error");
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn serve_client(stream: TcpStream, broadcaster: ReloadBroadcaster, shutdown: Arc<AtomicBool>) {
    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            debug!(error = %e, "live-reload handshake failed");
            return;
        }
    };
    if let Err(e) = ws.get_ref().set_nonblocking(true) {
        debug!(error = %e, "could not switch client socket to non-blocking");
        return;
    }

    let mut rx = broadcaster.subscribe();
    info!(clients = broadcaster.client_count(), "live-reload client connected");

    while !shutdown.load(Ordering::SeqCst) {
        loop {
            match rx.try_recv() {
                Ok(notice) => {
                    if !forward(&mut ws, &notice) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "live-reload client lagged; notices dropped");
                }
                Err(TryRecvError::Closed) => return,
            }
        }

        match ws.read() {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => break,
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    let _ = ws.close(None);
    debug!("live-reload client disconnected");
}

/// Push one notice; `false` when the client is gone.
fn forward(ws: &mut WebSocket<TcpStream>, notice: &ReloadNotice) -> bool {
    match ws.send(Message::Text(notice.to_json().into())) {
        Ok(()) => true,
        // Queued in the write buffer; flushed on the next send.
        Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
        Err(e) => {
            debug!(error = %e, "live-reload send failed");
            false
        }
    }
}
