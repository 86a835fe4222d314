//! WebSocket opening handshake
//!
//! Client side of RFC 6455 section 4: building the upgrade request for a
//! `ws://` URI and validating the server's `101 Switching Protocols` answer.
//! The accepting side is provided as well so a peer can be stood up in-process
//! over any byte stream.

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::constants::{DEFAULT_WS_PORT, MAX_HEADERS, MAX_HEADER_SIZE, WEBSOCKET_VERSION};
use crate::protocol::http_header::*;
use crate::protocol::http_status::SWITCHING_PROTOCOLS;
use crate::protocol::utils::{calculate_accept, generate_key, validate_key};
use std::collections::HashMap;

/// Where a `ws://` URI points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address, without brackets
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Path and query sent in the request line
    pub resource: String,
}

impl Endpoint {
    /// Parse a `ws://host[:port][/path][?query]` URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let parsed: http::Uri = uri
            .parse()
            .map_err(|e: http::uri::InvalidUri| ProtocolError::InvalidUri(e.to_string()))?;

        match parsed.scheme_str() {
            Some("ws") => {}
            Some(other) => return Err(ProtocolError::UnsupportedScheme(other.to_string()).into()),
            None => return Err(ProtocolError::InvalidUri(format!("missing scheme in {uri}")).into()),
        }

        let host = parsed
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProtocolError::InvalidUri(format!("missing host in {uri}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let resource = parsed
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            host,
            port: parsed.port_u16().unwrap_or(DEFAULT_WS_PORT),
            resource,
        })
    }

    /// Value for the `Host` header
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == DEFAULT_WS_PORT {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

/// Optional knobs for the client upgrade request
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    /// Origin header
    pub origin: Option<String>,
    /// User-Agent header
    pub user_agent: Option<String>,
    /// Subprotocols to offer
    pub protocols: Vec<String>,
    /// Additional headers
    pub extra_headers: Vec<(String, String)>,
}

/// WebSocket handshake request information
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    /// HTTP method (GET)
    pub method: String,
    /// Request target
    pub resource: String,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// The `Sec-WebSocket-Key` carried by this request
    pub fn key(&self) -> Option<&str> {
        self.headers.get(SEC_WEBSOCKET_KEY).map(String::as_str)
    }
}

/// WebSocket handshake response information
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// HTTP status code
    pub status: u16,
    /// HTTP reason phrase
    pub reason: String,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
}

/// Build the upgrade request for `endpoint`
pub fn create_client_handshake(endpoint: &Endpoint, config: &HandshakeConfig) -> HandshakeRequest {
    let mut headers = HashMap::new();

    headers.insert(HOST.to_string(), endpoint.host_header());
    headers.insert(UPGRADE.to_string(), "websocket".to_string());
    headers.insert(CONNECTION.to_string(), "Upgrade".to_string());
    headers.insert(SEC_WEBSOCKET_KEY.to_string(), generate_key());
    headers.insert(SEC_WEBSOCKET_VERSION.to_string(), WEBSOCKET_VERSION.to_string());

    if let Some(origin) = &config.origin {
        headers.insert(ORIGIN.to_string(), origin.clone());
    }
    if let Some(agent) = &config.user_agent {
        headers.insert(USER_AGENT.to_string(), agent.clone());
    }
    if !config.protocols.is_empty() {
        headers.insert(SEC_WEBSOCKET_PROTOCOL.to_string(), config.protocols.join(", "));
    }
    for (key, value) in &config.extra_headers {
        headers.insert(key.to_lowercase(), value.clone());
    }

    HandshakeRequest {
        method: "GET".to_string(),
        resource: endpoint.resource.clone(),
        headers,
    }
}

/// Serialize a request head, terminated by the blank line
pub fn request_to_string(request: &HandshakeRequest) -> String {
    let mut out = format!("{} {} HTTP/1.1\r\n", request.method, request.resource);
    for (key, value) in &request.headers {
        out.push_str(&format!("{}: {}\r\n", key, value));
    }
    out.push_str("\r\n");
    out
}

/// Serialize a response head, terminated by the blank line
pub fn response_to_string(response: &HandshakeResponse) -> String {
    let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, response.reason);
    for (key, value) in &response.headers {
        out.push_str(&format!("{}: {}\r\n", key, value));
    }
    out.push_str("\r\n");
    out
}

fn collect_headers(headers: &[httparse::Header<'_>]) -> HashMap<String, String> {
    headers
        .iter()
        .map(|h| {
            (
                h.name.to_lowercase(),
                String::from_utf8_lossy(h.value).trim().to_string(),
            )
        })
        .collect()
}

fn check_head_size(buf: &[u8]) -> Result<()> {
    if buf.len() > MAX_HEADER_SIZE {
        return Err(ProtocolError::HeadTooLarge {
            size: buf.len(),
            max: MAX_HEADER_SIZE,
        }
        .into());
    }
    Ok(())
}

/// Parse the server's response head.
///
/// Returns `None` while the head is incomplete, otherwise the response and
/// the number of bytes it occupied; anything after that belongs to the
/// frame stream.
pub fn parse_server_handshake(buf: &[u8]) -> Result<Option<(HandshakeResponse, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);

    match response
        .parse(buf)
        .map_err(|e| ProtocolError::InvalidFormat(e.to_string()))?
    {
        httparse::Status::Complete(len) => Ok(Some((
            HandshakeResponse {
                status: response.code.unwrap_or_default(),
                reason: response.reason.unwrap_or_default().to_string(),
                headers: collect_headers(response.headers),
            },
            len,
        ))),
        httparse::Status::Partial => check_head_size(buf).map(|_| None),
    }
}

/// Validate a server handshake response against the key we sent
pub fn validate_server_handshake(response: &HandshakeResponse, client_key: &str) -> Result<()> {
    if response.status != SWITCHING_PROTOCOLS {
        return Err(ProtocolError::UnexpectedStatus(response.status).into());
    }

    require_token(&response.headers, UPGRADE, "websocket")?;
    require_token(&response.headers, CONNECTION, "upgrade")?;

    let accept = response
        .headers
        .get(SEC_WEBSOCKET_ACCEPT)
        .ok_or_else(|| ProtocolError::MissingHeader(SEC_WEBSOCKET_ACCEPT.to_string()))?;

    let expected = calculate_accept(client_key);
    if *accept != expected {
        return Err(ProtocolError::InvalidAcceptKey {
            expected,
            received: accept.clone(),
        }
        .into());
    }

    Ok(())
}

fn require_token(headers: &HashMap<String, String>, name: &str, token: &str) -> Result<()> {
    let value = headers
        .get(name)
        .ok_or_else(|| ProtocolError::MissingHeader(name.to_string()))?;
    if !value
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(token))
    {
        return Err(ProtocolError::InvalidHeaderValue {
            header: name.to_string(),
            value: value.clone(),
        }
        .into());
    }
    Ok(())
}

/// Parse a client's upgrade request head (accepting side).
pub fn parse_client_handshake(buf: &[u8]) -> Result<Option<(HandshakeRequest, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    match request
        .parse(buf)
        .map_err(|e| ProtocolError::InvalidFormat(e.to_string()))?
    {
        httparse::Status::Complete(len) => {
            let method = request.method.unwrap_or_default().to_string();
            if method != "GET" {
                return Err(ProtocolError::InvalidMethod(method).into());
            }
            Ok(Some((
                HandshakeRequest {
                    method,
                    resource: request.path.unwrap_or("/").to_string(),
                    headers: collect_headers(request.headers),
                },
                len,
            )))
        }
        httparse::Status::Partial => check_head_size(buf).map(|_| None),
    }
}

/// Build the `101` answer for a client request (accepting side).
pub fn create_server_handshake(request: &HandshakeRequest) -> Result<HandshakeResponse> {
    require_token(&request.headers, UPGRADE, "websocket")?;
    require_token(&request.headers, CONNECTION, "upgrade")?;

    let key = request
        .key()
        .ok_or_else(|| ProtocolError::MissingHeader(SEC_WEBSOCKET_KEY.to_string()))?;
    if !validate_key(key) {
        return Err(Error::Protocol(ProtocolError::InvalidHeaderValue {
            header: SEC_WEBSOCKET_KEY.to_string(),
            value: key.to_string(),
        }));
    }

    let mut headers = HashMap::new();
    headers.insert(UPGRADE.to_string(), "websocket".to_string());
    headers.insert(CONNECTION.to_string(), "Upgrade".to_string());
    headers.insert(SEC_WEBSOCKET_ACCEPT.to_string(), calculate_accept(key));

    Ok(HandshakeResponse {
        status: SWITCHING_PROTOCOLS,
        reason: "Switching Protocols".to_string(),
        headers,
    })
}
