use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server};

use crate::error::InputError;
use crate::web::analysis_service::AnalysisService;
use crate::web::session_registry::DEFAULT_SESSION_ID;
use crate::web::wire::AnalyzeResponse;

/// Largest accepted `/analyze` body.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub const SESSION_HEADER: &str = "X-Session-Id";

const INDEX_HTML: &str = include_str!("../../../assets/index.html");

#[derive(Clone, Debug)]
pub struct HttpServerConfig {
    pub bind: String,
    pub workers: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            workers: 4,
        }
    }
}

/// A bound listener that has not started serving yet.
pub struct HttpServer {
    server: Arc<Server>,
    workers: usize,
}

impl HttpServer {
    pub fn bind(config: &HttpServerConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let server = Server::http(config.bind.as_str())?;
        Ok(Self {
            server: Arc::new(server),
            workers: config.workers.max(1),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Spawns the worker pool. Each worker pulls requests from the shared
    /// listener until the server is shut down.
    pub fn start(self, service: Arc<AnalysisService>) -> ServerHandle {
        if let Some(addr) = self.local_addr() {
            log::info!("Listening on http://{addr} with {} workers", self.workers);
        }
        let workers = (0..self.workers)
            .map(|index| {
                let server = Arc::clone(&self.server);
                let service = Arc::clone(&service);
                thread::Builder::new()
                    .name(format!("http-worker-{index}"))
                    .spawn(move || {
                        for request in server.incoming_requests() {
                            handle(&service, request);
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("Could not spawn HTTP worker: {e}");
                    None
                }
            })
            .collect();
        ServerHandle {
            server: self.server,
            workers,
        }
    }
}

pub struct ServerHandle {
    server: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Blocks until every worker has exited.
    pub fn join(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
    }

    pub fn shutdown(self) {
        for _ in &self.workers {
            self.server.unblock();
        }
        self.join();
    }
}

fn handle(service: &AnalysisService, mut request: Request) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or("").to_string();
    log::debug!("{method} {path}");

    let outcome = match (&method, path.as_str()) {
        (Method::Get, "/") => request.respond(with_content_type(
            Response::from_string(INDEX_HTML),
            "text/html; charset=utf-8",
        )),
        (Method::Get, "/health") => {
            request.respond(json_response(200, &serde_json::json!({ "status": "ok" })))
        }
        (Method::Post, "/analyze") => {
            let session_id = session_id(&request);
            let (status, body) = match read_body(&mut request)
                .and_then(|body| service.analyze(&session_id, &body))
            {
                Ok(response) => (200, response),
                Err(e) => {
                    log::warn!("Rejected /analyze for session {session_id}: {e}");
                    let status = if matches!(e, InputError::TooLarge(_)) { 413 } else { 400 };
                    (status, AnalyzeResponse::rejected(&e))
                }
            };
            request.respond(json_response(status, &body))
        }
        (Method::Post, "/session/end") => {
            let session_id = session_id(&request);
            service.end_session(&session_id);
            request.respond(Response::empty(204))
        }
        _ => request.respond(Response::empty(404)),
    };

    if let Err(e) = outcome {
        log::warn!("Failed to respond to {method} {path}: {e}");
    }
}

/// The client's `X-Session-Id`, else its peer address, so clients without
/// the header never share a tracker.
fn session_id(request: &Request) -> String {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(SESSION_HEADER))
        .map(|h| h.value.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| request.remote_addr().map(|addr| format!("peer:{addr}")))
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
}

fn read_body(request: &mut Request) -> Result<Vec<u8>, InputError> {
    if let Some(length) = request.body_length() {
        if length > MAX_BODY_BYTES {
            return Err(InputError::TooLarge(MAX_BODY_BYTES));
        }
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut body)?;
    if body.len() > MAX_BODY_BYTES {
        return Err(InputError::TooLarge(MAX_BODY_BYTES));
    }
    Ok(body)
}

fn json_response<T: Serialize>(status: u16, value: &T) -> Response<Cursor<Vec<u8>>> {
    let body = serde_json::to_vec(value).unwrap_or_default();
    with_content_type(Response::from_data(body), "application/json").with_status_code(status)
}

fn with_content_type<R: Read>(response: Response<R>, value: &str) -> Response<R> {
    match Header::from_bytes(&b"Content-Type"[..], value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpStream;
    use std::time::Duration;
    use crate::detection::domain::detector::testing::ScriptedDetector;
    use crate::detection::domain::detector::{DetectorRole, DetectorSet};
    use crate::shared::geometry::Rect;
    use crate::tracking::domain::landmark_estimator::LandmarkEstimator;
    use crate::tracking::domain::tracking_result::STATUS_NOT_FOUND;
    use crate::web::session_registry::SessionRegistry;
    use crate::web::wire::testing::png_data_url;

    struct Running {
        base: String,
        handle: ServerHandle,
        service: Arc<AnalysisService>,
    }

    fn start(script: Vec<Vec<Rect>>) -> Running {
        let detectors =
            DetectorSet::new().with(DetectorRole::Face, Box::new(ScriptedDetector::sequence(script)));
        let service = Arc::new(AnalysisService::new(
            detectors,
            SessionRegistry::new(LandmarkEstimator::default(), 8),
        ));
        let server = HttpServer::bind(&HttpServerConfig {
            bind: "127.0.0.1:0".to_string(),
            workers: 2,
        })
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.start(Arc::clone(&service));
        Running {
            base: format!("http://{addr}"),
            handle,
            service,
        }
    }

    fn analyze_body(image_data: &str) -> String {
        serde_json::json!({
            "image_data": image_data,
            "horizontal_band_center_y": 120,
            "horizontal_band_height": 40
        })
        .to_string()
    }

    fn post(url: &str, session: &str, body: String) -> (u16, String) {
        let response = reqwest::blocking::Client::new()
            .post(url)
            .header(SESSION_HEADER, session)
            .body(body)
            .send()
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().unwrap())
    }

    #[test]
    fn test_analyze_round_trip() {
        let server = start(vec![vec![Rect::new(100, 100, 80, 80)]]);
        let (status, text) = post(
            &format!("{}/analyze", server.base),
            "abc",
            analyze_body(&png_data_url(320, 240)),
        );
        assert_eq!(status, 200);
        let response: AnalyzeResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(response.face, Some([100, 100, 80, 80]));
        assert_eq!(response.nose, Some([140, 146]));
        server.handle.shutdown();
    }

    #[test]
    fn test_non_data_url_is_bad_request() {
        let server = start(vec![]);
        let (status, text) = post(
            &format!("{}/analyze", server.base),
            "abc",
            analyze_body("https://example.com/cat.png"),
        );
        assert_eq!(status, 400);
        let response: AnalyzeResponse = serde_json::from_str(&text).unwrap();
        assert!(response.tracking_bad);
        assert!(response.status.starts_with("Invalid request"));
        assert_eq!(server.service.session_count(), 0);
        server.handle.shutdown();
    }

    #[test]
    fn test_session_end_clears_memory() {
        let server = start(vec![vec![Rect::new(50, 50, 60, 60)], vec![]]);
        let url = format!("{}/analyze", server.base);
        post(&url, "s1", analyze_body(&png_data_url(320, 240)));
        assert_eq!(server.service.session_count(), 1);

        let (status, _) = post(&format!("{}/session/end", server.base), "s1", String::new());
        assert_eq!(status, 204);
        assert_eq!(server.service.session_count(), 0);

        let (_, text) = post(&url, "s1", analyze_body(&png_data_url(320, 240)));
        let response: AnalyzeResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(response.face, None);
        assert_eq!(response.status, STATUS_NOT_FOUND);
        server.handle.shutdown();
    }

    #[test]
    fn test_clients_without_session_header_are_kept_apart() {
        let server = start(vec![vec![Rect::new(50, 50, 60, 60)], vec![]]);
        let url = format!("{}/analyze", server.base);
        let send = |client: &reqwest::blocking::Client| -> AnalyzeResponse {
            let response = client
                .post(&url)
                .body(analyze_body(&png_data_url(320, 240)))
                .send()
                .unwrap();
            assert_eq!(response.status().as_u16(), 200);
            serde_json::from_str(&response.text().unwrap()).unwrap()
        };

        let first = send(&reqwest::blocking::Client::new());
        assert_eq!(first.face, Some([50, 50, 60, 60]));

        let second = send(&reqwest::blocking::Client::new());
        assert_eq!(second.face, None);
        assert_eq!(second.status, STATUS_NOT_FOUND);
        assert_eq!(server.service.session_count(), 2);
        server.handle.shutdown();
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let server = start(vec![]);
        let addr = server.base.trim_start_matches("http://");
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        write!(
            stream,
            "POST /analyze HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_BYTES + 1
        )
        .unwrap();

        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let head = String::from_utf8_lossy(&head);
        assert!(head.starts_with("HTTP/1.1 413"), "{head}");
        assert_eq!(server.service.session_count(), 0);
        drop(stream);
        server.handle.shutdown();
    }

    #[test]
    fn test_index_health_and_unknown_routes() {
        let server = start(vec![]);
        let index = reqwest::blocking::get(format!("{}/", server.base)).unwrap();
        assert_eq!(index.status().as_u16(), 200);
        assert!(index.text().unwrap().contains("/analyze"));

        let health = reqwest::blocking::get(format!("{}/health", server.base)).unwrap();
        assert_eq!(health.text().unwrap(), r#"{"status":"ok"}"#);

        let missing = reqwest::blocking::get(format!("{}/nope", server.base)).unwrap();
        assert_eq!(missing.status().as_u16(), 404);
        server.handle.shutdown();
    }
}
