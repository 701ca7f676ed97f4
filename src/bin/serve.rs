//! Development server for huehost
//!
//! Serves the demo page from `www/`, falling back to the crate root for
//! `pkg/` (wasm-pack output) and the guest artifact.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Response, Server};

const DEFAULT_PORT: u16 = 8080;
const ROOTS: [&str; 2] = ["www", "."];

fn main() {
    let port = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = format!("0.0.0.0:{}", port);
    let server = match Server::http(&addr) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start server on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    println!("huehost dev server: http://localhost:{}", port);

    for request in server.incoming_requests() {
        let url_path = request.url().split('?').next().unwrap_or("/").to_string();
        let response = match resolve(&url_path) {
            Some(path) => serve_file(&path),
            None => not_found(),
        };
        let _ = request.respond(response);
    }
}

/// Map a URL path to a file under one of the roots
fn resolve(url_path: &str) -> Option<PathBuf> {
    let relative = match url_path.trim_start_matches('/') {
        "" => "index.html",
        p => p,
    };
    let relative = Path::new(relative);

    // No escaping the roots
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    ROOTS
        .iter()
        .map(|root| Path::new(root).join(relative))
        .find(|p| p.is_file())
}

fn serve_file(path: &Path) -> Response<std::io::Cursor<Vec<u8>>> {
    match fs::read(path) {
        Ok(contents) => {
            let response = Response::from_data(contents);
            match Header::from_bytes("Content-Type", mime_type(path)) {
                Ok(header) => response.with_header(header),
                Err(()) => response,
            }
        }
        Err(_) => not_found(),
    }
}

fn not_found() -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string("404 Not Found").with_status_code(404)
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("css") => "text/css",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type(Path::new("a.wasm")), "application/wasm");
        assert_eq!(mime_type(Path::new("pkg/huehost.js")), "application/javascript");
        assert_eq!(mime_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        assert!(resolve("/../Cargo.toml").is_none());
        assert!(resolve("/www/../../etc/passwd").is_none());
    }
}
