//! Read-only snapshot of an inbound HTTP request.
//!
//! The body held here is always plaintext: the server decodes gzip request
//! bodies before building the snapshot.

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, COOKIE};
use hyper::{HeaderMap, Method};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    scheme: String,
    host: String,
    port: u16,
    url: String,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path plus query string, exactly as received.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The path portion of the URL, without the query string.
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    pub fn query_string(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Query parameters in order of appearance, percent-decoded.
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.query_string().map(parse_form_encoded).unwrap_or_default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect()
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `scheme://host[:port]`, omitting the port when it is the scheme default.
    pub fn base_url(&self) -> String {
        let default_port = match self.scheme.as_str() {
            "https" => 443,
            _ => 80,
        };
        if self.port == default_port {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Parse `a=1&b=two%20words&c` into decoded pairs. `+` decodes to a space.
pub fn parse_form_encoded(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn parse_cookie_header(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    value.split(';').filter_map(|part| {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }
        let (name, value) = part.split_once('=').unwrap_or((part, ""));
        Some((name.trim().to_string(), value.trim().to_string()))
    })
}

pub struct RequestBuilder {
    method: Method,
    scheme: String,
    host: String,
    port: Option<u16>,
    url: String,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    body: Bytes,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: None,
            url: "/".to_string(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.url = if url.is_empty() { "/".to_string() } else { url };
        self
    }

    /// Append a header value. Names or values that are not valid HTTP are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
                self
            }
            _ => self,
        }
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a cookie visible to templates without touching the Cookie header.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        let port = self.port.unwrap_or(match self.scheme.as_str() {
            "https" => 443,
            _ => 80,
        });

        let mut cookies: Vec<(String, String)> = self
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| parse_cookie_header(v).collect::<Vec<_>>())
            .collect();
        cookies.extend(self.cookies);

        Request {
            method: self.method,
            scheme: self.scheme,
            host: self.host,
            port,
            url: self.url,
            headers: self.headers,
            cookies,
            body: self.body,
        }
    }
}
