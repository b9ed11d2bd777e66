use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gatecrasher",
    version,
    about = "HTTP 403 bypass and access-control probing tool",
    long_about = "Gatecrasher probes a single HTTP(S) endpoint for access-control bypasses by firing a large, deterministic set of request variants (URL rewrites, header injections, method overrides, encodings) and classifying the anomalies.\n\nExamples:\n  gatecrasher -u https://example.com/admin -t all\n  gatecrasher -u https://example.com/admin -t headers -e https://xyz.interact.sh\n  gatecrasher -u https://example.com/admin -t all -l base -o results.json\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Target",
        help = "Inaccessible target URL (e.g. https://example.com/admin)."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'e',
        long = "evil",
        value_name = "URL",
        help_heading = "Target",
        help = "Evil reference URL for redirect/SSRF/host-confusion payloads (default: https://github.com)."
    )]
    pub evil: Option<String>,

    #[arg(
        long = "iqsf",
        visible_alias = "ignore-query-string-and-fragment",
        help_heading = "Target",
        help = "Ignore the URL query string when normalizing."
    )]
    pub ignore_query_string_and_fragment: bool,

    #[arg(
        short = 't',
        long = "tests",
        value_name = "TESTS",
        help_heading = "Tests",
        help = "Comma-separated test selection: base, methods, [method|scheme|port]-overrides, headers, paths, encodings, auths, redirects, parsers, all."
    )]
    pub tests: Option<String>,

    #[arg(
        short = 'f',
        long = "force",
        value_name = "METHOD",
        help_heading = "Tests",
        help = "Force an HTTP method for all non-specific test cases."
    )]
    pub force: Option<String>,

    #[arg(
        short = 'v',
        long = "values",
        value_name = "FILE",
        help_heading = "Tests",
        help = "File with additional header-injection values such as internal IPs (headers tests)."
    )]
    pub values: Option<String>,

    #[arg(
        short = 'p',
        long = "path",
        value_name = "PATH",
        action = ArgAction::Append,
        help_heading = "Tests",
        help = "Known-accessible URL path used for URL-override tests (repeatable; default: /robots.txt /index.html /sitemap.xml /README.txt)."
    )]
    pub path: Vec<String>,

    #[arg(
        long = "repeat",
        value_name = "N",
        help_heading = "Tests",
        help = "Stress mode: fire the baseline request N times and mark duplicate responses."
    )]
    pub repeat: Option<usize>,

    #[arg(
        short = 'i',
        long = "ignore",
        value_name = "REGEX",
        help_heading = "Filters",
        help = "Filter out false positives whose body matches this regex (case-insensitive, multi-line)."
    )]
    pub ignore: Option<String>,

    #[arg(
        short = 'l',
        long = "content-lengths",
        value_name = "LIST",
        help_heading = "Filters",
        help = "Filter out false positives by response length; numeric, or 'base'/'path' to seed from the probe responses (comma-separated)."
    )]
    pub content_lengths: Option<String>,

    #[arg(
        long = "rt",
        visible_alias = "request-timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Connect and read timeout per request (default: 60)."
    )]
    pub request_timeout: Option<u64>,

    #[arg(
        long = "th",
        visible_alias = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Worker pool width (default: 5)."
    )]
    pub threads: Option<usize>,

    #[arg(
        short = 's',
        long = "sleep",
        value_name = "MS",
        help_heading = "Performance",
        help = "Sleep in milliseconds before sending each request (intended for single-thread use)."
    )]
    pub sleep: Option<u64>,

    #[arg(
        short = 'a',
        long = "user-agent",
        value_name = "VALUE",
        help_heading = "HTTP",
        help = "User agent: a fixed value, 'random' for one catalog pick, or 'random-all' for the whole catalog."
    )]
    pub user_agent: Option<String>,

    #[arg(
        short = 'x',
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Web proxy to use (http[s], socks4[h], socks5[h])."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "transport",
        visible_alias = "engine",
        value_name = "NAME",
        help_heading = "HTTP",
        help = "Transport backend: 'curl' (spawned process, default) or 'library' (in-process client)."
    )]
    pub transport: Option<String>,

    #[arg(
        short = 'o',
        long = "out",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the JSON report to a file."
    )]
    pub out: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Output",
        help = "Path to config file (defaults to ~/.gatecrasher/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        long = "dbg",
        visible_alias = "debug",
        help_heading = "Output",
        help = "Print transport failures with the offending reproduction command."
    )]
    pub debug: bool,
}
