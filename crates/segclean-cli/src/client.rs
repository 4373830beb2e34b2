//! HTTP client for the segment ("collections") API.

use segclean_core::config::ApiConfig;
use segclean_core::gateway::{DeleteStatus, GatewayError, MutationGateway};
use segclean_core::model::Segment;
use segclean_core::source::{SegmentSource, SourceError, parse_store};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = "segclean";

#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Build a client from the `api` config section.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotConfigured`] when no base URL is set.
    pub fn from_config(api: &ApiConfig) -> Result<Self, SourceError> {
        let base_url = api
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(SourceError::NotConfigured)?;
        Ok(Self::new(base_url, api.token.clone(), api.timeout()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json");
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn put_json(&self, path: &str, body: &str) -> Result<ureq::Response, (String, ureq::Error)> {
        let url = self.url(path);
        debug!(%url, bytes = body.len(), "PUT");
        self.request("PUT", &url)
            .set("Content-Type", "application/json")
            .send_string(body)
            .map_err(|err| (url, err))
    }
}

fn gateway_error(url: String, err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::Status(status, response) => GatewayError::Rejected {
            url,
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => GatewayError::Transport {
            url,
            reason: transport.to_string(),
        },
    }
}

impl SegmentSource for ApiClient {
    fn fetch_all(&self) -> Result<Vec<Segment>, SourceError> {
        let url = self.url("collections");
        debug!(%url, "GET");

        let response = self.request("GET", &url).call().map_err(|err| match err {
            ureq::Error::Status(status, response) => SourceError::Status {
                url: url.clone(),
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => SourceError::Transport {
                url: url.clone(),
                reason: transport.to_string(),
            },
        })?;

        let raw = response.into_string().map_err(|err| SourceError::Transport {
            url: url.clone(),
            reason: err.to_string(),
        })?;
        let segments = parse_store(&raw)?;
        info!(%url, count = segments.len(), "fetched segments");
        Ok(segments)
    }

    fn describe(&self) -> String {
        format!("api {}", self.base_url)
    }
}

impl MutationGateway for ApiClient {
    fn apply_update(&self, segment: &Segment) -> Result<(), GatewayError> {
        let body = serde_json::to_string(segment)?;
        self.put_json(&format!("collections/{}", segment.id), &body)
            .map(|_| ())
            .map_err(|(url, err)| gateway_error(url, err))
    }

    fn apply_bulk_delete(&self, ids: &[String]) -> Result<DeleteStatus, GatewayError> {
        let body = serde_json::to_string(ids)?;
        match self.put_json("collections/bulk-delete", &body) {
            Ok(_) => Ok(DeleteStatus::Deleted),
            Err((_, ureq::Error::Status(404, _))) => Ok(DeleteStatus::AlreadyGone),
            Err((url, err)) => Err(gateway_error(url, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Accept one connection, answer with `status` and `body`, return the raw request.
    fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut raw = Vec::new();
            let mut chunk = [0_u8; 1024];
            loop {
                let n = stream.read(&mut chunk).expect("read");
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}/api/v1/"), handle)
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Some("tok".into()), Duration::from_secs(5))
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let c = client("https://console.example.com/api/v1/");
        assert_eq!(c.describe(), "api https://console.example.com/api/v1");
        assert_eq!(c.url("collections"), "https://console.example.com/api/v1/collections");
        assert_eq!(c.url("/collections/7"), "https://console.example.com/api/v1/collections/7");
    }

    #[test]
    fn missing_base_url_is_not_configured() {
        let err = ApiClient::from_config(&ApiConfig::default()).expect_err("no url");
        assert!(matches!(err, SourceError::NotConfigured));

        let api = ApiConfig {
            base_url: Some("   ".into()),
            ..ApiConfig::default()
        };
        assert!(ApiClient::from_config(&api).is_err());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let rendered = format!("{:?}", client("https://x.test"));
        assert!(!rendered.contains("tok\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn fetch_reads_the_content_page_with_auth_headers() {
        let (base, server) = serve_once(
            200,
            r#"{"content": [{"id": "1", "name": "A-1", "query": {"type": "HOST_APP"}}]}"#,
        );
        let segments = client(&base).fetch_all().expect("fetch");
        let request = server.join().expect("server");

        assert_eq!(segments.len(), 1);
        assert!(request.starts_with("GET /api/v1/collections HTTP/1.1"));
        assert!(request.contains("Authorization: Bearer tok"));
        assert!(request.to_ascii_lowercase().contains("user-agent: segclean"));
    }

    #[test]
    fn fetch_status_error_is_a_source_error() {
        let (base, server) = serve_once(401, r#"{"message": "bad token"}"#);
        let err = client(&base).fetch_all().expect_err("401");
        server.join().expect("server");
        assert!(matches!(err, SourceError::Status { status: 401, .. }));
        assert!(err.to_string().contains("bad token"));
    }

    #[test]
    fn update_puts_the_full_record() {
        let (base, server) = serve_once(200, "{}");
        let segment = Segment::host_app("42", "crm");
        client(&base).apply_update(&segment).expect("update");
        let request = server.join().expect("server");

        assert!(request.starts_with("PUT /api/v1/collections/42 HTTP/1.1"));
        assert!(request.contains(r#""name":"crm""#));
    }

    #[test]
    fn bulk_delete_sends_an_id_array() {
        let (base, server) = serve_once(200, "{}");
        let status = client(&base)
            .apply_bulk_delete(&["7".to_string()])
            .expect("delete");
        let request = server.join().expect("server");

        assert_eq!(status, DeleteStatus::Deleted);
        assert!(request.starts_with("PUT /api/v1/collections/bulk-delete HTTP/1.1"));
        assert!(request.ends_with(r#"["7"]"#));
    }

    #[test]
    fn bulk_delete_of_missing_ids_is_already_gone() {
        let (base, server) = serve_once(404, "{}");
        let status = client(&base)
            .apply_bulk_delete(&["7".to_string()])
            .expect("404 is not an error");
        server.join().expect("server");
        assert_eq!(status, DeleteStatus::AlreadyGone);
    }

    #[test]
    fn rejected_update_carries_status_and_body() {
        let (base, server) = serve_once(409, "conflict");
        let err = client(&base)
            .apply_update(&Segment::host_app("1", "A"))
            .expect_err("409");
        server.join().expect("server");
        assert!(matches!(err, GatewayError::Rejected { status: 409, .. }));
        assert!(err.to_string().contains("conflict"));
    }
}
