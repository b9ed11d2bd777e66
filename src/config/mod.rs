use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Optional YAML config file. Every field mirrors a CLI option; CLI values
/// win over config values.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub evil: Option<String>,
    pub tests: Option<String>,
    pub force: Option<String>,
    pub values: Option<String>,
    pub paths: Option<Vec<String>>,
    pub ignore: Option<String>,
    pub content_lengths: Option<String>,
    pub request_timeout: Option<u64>,
    pub threads: Option<usize>,
    pub sleep: Option<u64>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub transport: Option<String>,
    pub repeat: Option<usize>,
    pub out: Option<String>,
    pub ignore_query_string_and_fragment: Option<bool>,
    pub no_color: Option<bool>,
    pub debug: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".gatecrasher").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_parses_yaml_fields() {
        let dir = std::env::temp_dir().join("gatecrasher-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yml");
        std::fs::write(
            &path,
            "url: https://example.com/admin\ntests: headers,paths\nthreads: 20\n",
        )
        .unwrap();
        let cfg = load_config(&path, false).unwrap();
        assert_eq!(cfg.url.as_deref(), Some("https://example.com/admin"));
        assert_eq!(cfg.tests.as_deref(), Some("headers,paths"));
        assert_eq!(cfg.threads, Some(20));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_config_allows_missing_when_asked() {
        let path = PathBuf::from("/nonexistent/gatecrasher/config.yml");
        assert!(load_config(&path, true).is_ok());
        assert!(load_config(&path, false).is_err());
    }
}
