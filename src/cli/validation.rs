use crate::cli::args::CliArgs;
use crate::urls;

/// Early syntactic checks on raw CLI values. Presence of required options is
/// enforced after the config file merge.
pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(url) = args.url.as_deref() {
        urls::validate_url(url, "Inaccessible URL", urls::HTTP_SCHEMES)
            .map_err(|e| e.to_string())?;
    }
    if let Some(evil) = args.evil.as_deref() {
        urls::validate_url(evil, "Evil URL", urls::HTTP_SCHEMES).map_err(|e| e.to_string())?;
    }
    if let Some(proxy) = args.proxy.as_deref() {
        urls::validate_url(proxy, "Proxy URL", urls::PROXY_SCHEMES).map_err(|e| e.to_string())?;
    }
    if let Some(force) = args.force.as_deref() {
        if force.trim().is_empty()
            || !force
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(format!("invalid forced HTTP method '{force}'"));
        }
    }
    if args.request_timeout == Some(0) {
        return Err("Request timeout must be greater than zero".to_string());
    }
    if args.threads == Some(0) {
        return Err("Number of parallel threads to run must be greater than zero".to_string());
    }
    if args.sleep == Some(0) {
        return Err("Sleep must be greater than zero".to_string());
    }
    if args.repeat == Some(0) {
        return Err("Repeat must be greater than zero".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn validate_accepts_a_plain_invocation() {
        let args = CliArgs::parse_from([
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
        ]);
        assert!(validate(&args).is_ok());
    }

    #[test]
    fn validate_rejects_bad_proxy_scheme() {
        let args = CliArgs::parse_from([
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
            "-x",
            "ftp://127.0.0.1:8080",
        ]);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn validate_rejects_zero_options() {
        let args = CliArgs::parse_from([
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
            "--th",
            "0",
        ]);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn validate_rejects_malformed_forced_method() {
        let args = CliArgs::parse_from([
            "gatecrasher",
            "-u",
            "https://example.com/admin",
            "-t",
            "all",
            "-f",
            "GE T",
        ]);
        assert!(validate(&args).is_err());
    }
}
