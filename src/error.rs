use thiserror::Error;

/// Configuration-time failures. Every variant is fatal and surfaces before any
/// network activity happens.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}: Scheme is required")]
    MissingScheme(String),

    #[error("{0}: Supported schemes are {1}")]
    UnsupportedScheme(String, String),

    #[error("{0}: Invalid domain name")]
    InvalidDomain(String),

    #[error("{0}: Port number is out of range")]
    PortOutOfRange(String),

    #[error("Invalid RegEx: {0}")]
    InvalidRegex(String),

    #[error("{0}")]
    InvalidOption(String),
}

/// DNS resolution failure. Fatal for the target URL, fatal for the evil URL
/// only when a selected test depends on it.
#[derive(Error, Debug)]
#[error("cannot resolve '{host}': {source}")]
pub struct ResolveError {
    pub host: String,
    #[source]
    pub source: std::io::Error,
}

/// Per-request transport failures. Contained within the affected record
/// (status stays 0) and never abort the run.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid request header '{0}'")]
    InvalidHeader(String),

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("failed to spawn curl: {0}")]
    Spawn(std::io::Error),

    #[error("curl exited with code {0}")]
    CurlExit(i32),

    #[error("unparseable curl response output")]
    MalformedOutput,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
