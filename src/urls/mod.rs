//! URL parsing and canonicalization. A `ParsedUrl` is built once per distinct
//! URL (the target and the evil counterpart), is immutable after construction
//! apart from the lazily resolved IP fields, and carries every derived
//! variant list used by the payload generators.

use crate::error::{ConfigError, ResolveError};
use crate::utils::unique;

pub const HTTP_SCHEMES: &[&str] = &["http", "https"];
pub const PROXY_SCHEMES: &[&str] = &["http", "https", "socks4", "socks4h", "socks5", "socks5h"];

/// Canonical query string: pairs grouped by key in first-seen order, each key
/// holding its values in original order, plus the stable re-serialized form
/// (leading `?`, or empty).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryString {
    pub pairs: Vec<(String, Vec<String>)>,
    pub full: String,
}

#[derive(Clone, Debug)]
pub struct ParsedUrl {
    pub scheme: String,
    pub domain_no_port: String,
    pub port: u16,
    /// host:port, lowercased unless parsed case-sensitively
    pub domain: String,
    pub domain_extended: Vec<String>,
    pub scheme_domain: String,
    pub path: String,
    pub query: QueryString,
    /// `#fragment` or empty
    pub fragment: String,
    pub path_full: String,
    pub base_url: String,
    pub https_url: String,
    pub http_url: String,
    pub relative_paths: Vec<String>,
    pub absolute_paths: Vec<String>,
    // populated by resolve_ip; None until then or on resolution failure
    pub ip_no_port: Option<String>,
    pub ip: Option<String>,
    pub ip_extended: Vec<String>,
    pub ip_https_url: Option<String>,
    pub ip_http_url: Option<String>,
}

/// Syntactic validation shared by target, evil, and proxy URLs. `label` is the
/// human name used in error messages.
pub fn validate_url(raw: &str, label: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let (scheme, _) = raw
        .split_once("://")
        .ok_or_else(|| ConfigError::MissingScheme(label.to_string()))?;
    if !schemes.contains(&scheme.to_lowercase().as_str()) {
        return Err(ConfigError::UnsupportedScheme(
            label.to_string(),
            schemes.join(", "),
        ));
    }
    if let Some(port) = explicit_port(raw) {
        if port < 1 || port > 65535 {
            return Err(ConfigError::PortOutOfRange(label.to_string()));
        }
    }
    if authority(raw).map(|a| a.is_empty()).unwrap_or(true) {
        return Err(ConfigError::InvalidDomain(label.to_string()));
    }
    Ok(())
}

fn authority(raw: &str) -> Option<&str> {
    let rest = raw.split_once("://")?.1;
    let end = rest
        .find(|c| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    let auth = &rest[..end];
    Some(auth.rsplit_once('@').map(|(_, host)| host).unwrap_or(auth))
}

fn explicit_port(raw: &str) -> Option<u32> {
    let auth = authority(raw)?;
    // skip bracketed IPv6 literals; the URL parser validates those
    if auth.starts_with('[') {
        return None;
    }
    let (_, port) = auth.rsplit_once(':')?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse::<u32>().ok()
}

impl ParsedUrl {
    pub fn parse(
        raw: &str,
        label: &str,
        ignore_query: bool,
        case_sensitive: bool,
    ) -> Result<Self, ConfigError> {
        validate_url(raw, label, HTTP_SCHEMES)?;
        let parsed = reqwest::Url::parse(raw)
            .map_err(|_| ConfigError::InvalidDomain(label.to_string()))?;
        let scheme = parsed.scheme().to_lowercase();
        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidDomain(label.to_string()))?;
        let port = parsed
            .port()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });

        let domain_no_port = if case_sensitive {
            raw_host(raw).unwrap_or_else(|| host.to_string())
        } else {
            host.to_lowercase()
        };
        let domain = format!("{domain_no_port}:{port}");
        let scheme_domain = format!("{scheme}://{domain}");

        let path = collapse_slashes(parsed.path());
        let query = if ignore_query {
            QueryString::default()
        } else {
            parse_query(parsed.query().unwrap_or(""))
        };
        let fragment = match parsed.fragment() {
            Some(f) if !f.is_empty() => format!("#{f}"),
            _ => String::new(),
        };
        let path_full = format!("{path}{}{fragment}", query.full);

        let base_url = format!("{scheme_domain}{path_full}");
        let https_url = base_https_url(&scheme, &domain_no_port, port, &path_full);
        let http_url = base_http_url(&scheme, &domain_no_port, port, &path_full);
        let domain_extended = extend_domains(&scheme, &[domain_no_port.clone()], port);

        let mut relative_paths = extend_path(&path, "", "");
        relative_paths.extend(extend_path(&path, &query.full, &fragment));
        let relative_paths = unique(relative_paths);

        let mut absolute_paths = append_paths(
            &[format!("{scheme}://{domain_no_port}")],
            &relative_paths,
        );
        absolute_paths.extend(append_paths(&[scheme_domain.clone()], &relative_paths));
        let absolute_paths = unique(absolute_paths);

        Ok(Self {
            scheme,
            domain_no_port,
            port,
            domain,
            domain_extended,
            scheme_domain,
            path,
            query,
            fragment,
            path_full,
            base_url,
            https_url,
            http_url,
            relative_paths,
            absolute_paths,
            ip_no_port: None,
            ip: None,
            ip_extended: Vec::new(),
            ip_https_url: None,
            ip_http_url: None,
        })
    }

    /// Resolves the hostname and fills the IP-derived fields. On failure the
    /// model is left unchanged and the error is graded by the caller.
    pub async fn resolve_ip(&mut self) -> Result<(), ResolveError> {
        let addrs: Vec<std::net::SocketAddr> =
            tokio::net::lookup_host((self.domain_no_port.as_str(), self.port))
                .await
                .map_err(|e| ResolveError {
                    host: self.domain_no_port.clone(),
                    source: e,
                })?
                .collect();
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .ok_or_else(|| ResolveError {
                host: self.domain_no_port.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
            })?;
        let ip_no_port = addr.ip().to_string();
        self.ip = Some(format!("{ip_no_port}:{}", self.port));
        self.ip_extended = extend_domains(&self.scheme, &[ip_no_port.clone()], self.port);
        self.ip_https_url = Some(base_https_url(
            &self.scheme,
            &ip_no_port,
            self.port,
            &self.path_full,
        ));
        self.ip_http_url = Some(base_http_url(
            &self.scheme,
            &ip_no_port,
            self.port,
            &self.path_full,
        ));
        self.ip_no_port = Some(ip_no_port);
        Ok(())
    }
}

fn raw_host(raw: &str) -> Option<String> {
    let auth = authority(raw)?;
    let host = match auth.rsplit_once(':') {
        Some((h, port)) if port.bytes().all(|b| b.is_ascii_digit()) => h,
        _ => auth,
    };
    Some(host.to_string())
}

/// The HTTPS counterpart keeps an explicit HTTPS port, otherwise falls back
/// to 443 (scheme swap must not carry the other scheme's port).
pub fn base_https_url(scheme: &str, host: &str, port: u16, path_full: &str) -> String {
    let port = if scheme == "https" { port } else { 443 };
    format!("https://{host}:{port}{path_full}")
}

pub fn base_http_url(scheme: &str, host: &str, port: u16, path_full: &str) -> String {
    let port = if scheme == "http" { port } else { 80 };
    format!("http://{host}:{port}{path_full}")
}

/// The four canonical spellings of every host: bare, with port, with scheme,
/// with scheme and port.
pub fn extend_domains(scheme: &str, hosts: &[String], port: u16) -> Vec<String> {
    let mut tmp = Vec::with_capacity(hosts.len() * 4);
    for host in hosts {
        tmp.push(host.clone());
        tmp.push(format!("{host}:{port}"));
        tmp.push(format!("{scheme}://{host}"));
        tmp.push(format!("{scheme}://{host}:{port}"));
    }
    unique(tmp)
}

pub fn strip_scheme(value: &str) -> &str {
    value.split_once("://").map(|(_, rest)| rest).unwrap_or(value)
}

pub fn strip_schemes(values: &[String]) -> Vec<String> {
    unique(values.iter().map(|v| strip_scheme(v).to_string()).collect())
}

pub fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

pub fn prepend_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Slash-permutation variants of a path, with the query string and fragment
/// optionally re-attached: `/p/`, `p/`, `/p`, `p`; the root path yields `/`.
pub fn extend_path(path: &str, query: &str, fragment: &str) -> Vec<String> {
    let trimmed = path.trim_matches('/');
    let mut tmp = if trimmed.is_empty() {
        vec!["/".to_string()]
    } else {
        vec![
            format!("/{trimmed}/"),
            format!("{trimmed}/"),
            format!("/{trimmed}"),
            trimmed.to_string(),
        ]
    };
    if !query.is_empty() || !fragment.is_empty() {
        for entry in tmp.iter_mut() {
            entry.push_str(query);
            entry.push_str(fragment);
        }
    }
    unique(tmp)
}

pub fn append_paths(bases: &[String], paths: &[String]) -> Vec<String> {
    let mut tmp = Vec::new();
    for base in bases {
        if base.is_empty() {
            continue;
        }
        for path in paths {
            if path.is_empty() {
                tmp.push(base.clone());
            } else {
                tmp.push(format!(
                    "{}{}",
                    base.trim_end_matches('/'),
                    prepend_slash(path)
                ));
            }
        }
    }
    unique(tmp)
}

/// Every ancestor prefix of a path, with and without a trailing slash,
/// starting from the root.
pub fn recursive_paths(path: &str) -> Vec<String> {
    let mut no_slash = String::new();
    let mut with_slash = String::from("/");
    let mut tmp = vec![no_slash.clone(), with_slash.clone()];
    for segment in path.trim_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        no_slash.push('/');
        no_slash.push_str(segment);
        with_slash.push_str(segment);
        with_slash.push('/');
        tmp.push(no_slash.clone());
        tmp.push(with_slash.clone());
    }
    unique(tmp)
}

fn parse_query(raw: &str) -> QueryString {
    let mut pairs: Vec<(String, Vec<String>)> = Vec::new();
    for part in raw.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(part), String::new()),
        };
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => pairs.push((key, vec![value])),
        }
    }
    let full = serialize_query(&pairs);
    QueryString { pairs, full }
}

/// Stable re-serialization of grouped query pairs: keys in first-seen order,
/// values in original order, `quote_plus` quoting. Includes the leading `?`.
pub fn serialize_query(pairs: &[(String, Vec<String>)]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (key, values) in pairs {
        for value in values {
            parts.push(format!("{}={}", quote_plus(key), quote_plus(value)));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

pub fn quote_plus(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' | b'~' => {
                out.push(*b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3);
                match hex.and_then(|h| u8::from_str_radix(&String::from_utf8_lossy(h), 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
