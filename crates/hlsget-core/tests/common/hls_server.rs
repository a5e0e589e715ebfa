//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves scripted responses keyed by request path: manifests, segments,
//! per-path failure injection (500s for the first N requests), and per-path
//! response delay. Unknown paths get a 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Route {
    status: u16,
    body: Vec<u8>,
    /// Respond 500 to this many requests before the scripted response applies.
    fail_first: u32,
    delay: Duration,
    hits: u32,
}

/// Scripted test server. Runs in a background thread until the process exits.
pub struct HlsServer {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    base: String,
}

impl HlsServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(HashMap::new()));
        let handler_routes = Arc::clone(&routes);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&handler_routes);
                thread::spawn(move || handle(stream, &routes));
            }
        });
        HlsServer {
            routes,
            base: format!("http://127.0.0.1:{port}"),
        }
    }

    /// Absolute URL for a path like "/show/index.m3u8".
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn route_bytes(&self, path: &str, body: Vec<u8>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status: 200,
                body,
                ..Route::default()
            },
        );
    }

    pub fn route_text(&self, path: &str, text: &str) {
        self.route_bytes(path, text.as_bytes().to_vec());
    }

    /// Make the first `n` requests for `path` fail with a 500.
    pub fn fail_first(&self, path: &str, n: u32) {
        if let Some(r) = self.routes.lock().unwrap().get_mut(path) {
            r.fail_first = n;
        }
    }

    /// Delay every response for `path` (for pause/cancel timing tests).
    pub fn delay(&self, path: &str, delay: Duration) {
        if let Some(r) = self.routes.lock().unwrap().get_mut(path) {
            r.delay = delay;
        }
    }

    /// Number of requests observed for `path`.
    pub fn hits(&self, path: &str) -> u32 {
        self.routes
            .lock()
            .unwrap()
            .get(path)
            .map(|r| r.hits)
            .unwrap_or(0)
    }
}

fn handle(mut stream: TcpStream, routes: &Mutex<HashMap<String, Route>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let Some(path) = parse_path(request) else {
        return;
    };

    let (status, body, delay) = {
        let mut routes = routes.lock().unwrap();
        match routes.get_mut(&path) {
            Some(route) => {
                route.hits += 1;
                if route.hits <= route.fail_first {
                    (500, Vec::new(), route.delay)
                } else {
                    (route.status, route.body.clone(), route.delay)
                }
            }
            None => (404, Vec::new(), Duration::ZERO),
        }
    };

    if !delay.is_zero() {
        thread::sleep(delay);
    }

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
}

fn parse_path(request: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    if !method.eq_ignore_ascii_case("GET") {
        return None;
    }
    Some(parts.next()?.to_string())
}
