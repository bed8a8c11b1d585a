use crate::pass_cli::Timeouts;
use log::{debug, warn};
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

lazy_static! {
    static ref EXECUTABLE_ENV: Option<String> = env::var("PASS_TUI_CLI")
        .ok()
        .filter(|s| !s.trim().is_empty());
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub executable: String,
    pub control_timeout_secs: u64,
    pub bulk_timeout_secs: u64,
    /// How long the create-login result stays on screen.
    pub notice_pause_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            executable: "pass-cli".to_string(),
            control_timeout_secs: 20,
            bulk_timeout_secs: 60,
            notice_pause_millis: 3000,
        }
    }
}

impl Config {
    /// Config file from the XDG dirs, then `PASS_TUI_CLI`, then the flag.
    pub fn load(executable_flag: Option<String>) -> Config {
        let config = match Config::find() {
            Some(path) => Config::try_load(&path),
            None => Config::default(),
        };
        config.with_executable(executable_flag, EXECUTABLE_ENV.clone())
    }

    fn find() -> Option<PathBuf> {
        match xdg::BaseDirectories::with_prefix("pass_tui") {
            Ok(dirs) => dirs.find_config_file(CONFIG_FILE),
            Err(err) => {
                warn!("no XDG directories: {}", err);
                None
            }
        }
    }

    /// A missing or broken file is not fatal; the defaults take over.
    pub fn try_load(path: &Path) -> Config {
        let config = match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("Could not parse config {:?}: {}", path, err);
                    Config::default()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(err) => {
                warn!("Could not read config {:?}: {}", path, err);
                Config::default()
            }
        };
        debug!("config: {:?}", config);
        config
    }

    pub fn with_executable(mut self, flag: Option<String>, env: Option<String>) -> Config {
        if let Some(executable) = flag.or(env) {
            self.executable = executable;
        }
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            control: Duration::from_secs(self.control_timeout_secs.max(1)),
            bulk: Duration::from_secs(self.bulk_timeout_secs.max(1)),
        }
    }

    pub fn notice_pause(&self) -> Duration {
        Duration::from_millis(self.notice_pause_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write(r#"{"executable": "/opt/pass-cli", "bulkTimeoutSecs": 90}"#);
        let config = Config::try_load(file.path());

        assert_eq!(config.executable, "/opt/pass-cli");
        assert_eq!(config.timeouts().bulk, Duration::from_secs(90));
        assert_eq!(config.timeouts().control, Duration::from_secs(20));
        assert_eq!(config.notice_pause(), Duration::from_secs(3));
    }

    #[test]
    fn broken_or_missing_file_falls_back() {
        let file = write("{ not json");
        assert_eq!(Config::try_load(file.path()), Config::default());

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Config::try_load(&dir.path().join("missing.json")),
            Config::default()
        );
    }

    #[test]
    fn zero_timeouts_are_clamped() {
        let config = Config {
            control_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.timeouts().control, Duration::from_secs(1));
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = Config {
            executable: "from-file".to_string(),
            ..Config::default()
        };

        let both = file
            .clone()
            .with_executable(Some("from-flag".into()), Some("from-env".into()));
        assert_eq!(both.executable, "from-flag");

        let env_only = file.clone().with_executable(None, Some("from-env".into()));
        assert_eq!(env_only.executable, "from-env");

        assert_eq!(file.clone().with_executable(None, None), file);
    }
}
