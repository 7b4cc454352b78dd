use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::components::editor::EditorConfig;
use crate::components::gesture::TouchMode;
use crate::error::{QuiltError, Result};
use crate::grid::QuiltLayout;
use crate::store::{FileStore, QuiltStore, RestStore};
use crate::{log_info, log_warn};

pub const ENV_DATABASE_URL: &str = "QUILT_DATABASE_URL";
pub const ENV_AUTH_TOKEN: &str = "QUILT_AUTH_TOKEN";

// ============================================================================
// SETTINGS: persisted as key=value lines in the platform config directory
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Realtime database root, e.g. `https://<project>.firebaseio.com`.
    pub database_url: String,
    pub auth_token: String,
    /// Local JSON document used instead of the database when set.
    pub store_file: Option<PathBuf>,
    pub layout: QuiltLayout,
    pub halo_depth: usize,
    pub touch_mode: TouchMode,
    /// Write the restored quilt back to the store after an undo.
    pub undo_persists: bool,
    pub poll_interval_ms: u64,
    pub max_history: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: String::new(),
            store_file: None,
            layout: QuiltLayout::default(),
            halo_depth: 4,
            touch_mode: TouchMode::default(),
            undo_persists: false,
            poll_interval_ms: 1000,
            max_history: 50,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixel-quilt/quilt_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixelQuilt\quilt_settings.cfg
    /// On macOS:   ~/Library/Application Support/PixelQuilt/quilt_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("PixelQuilt").join("quilt_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixelQuilt")
                    .join("quilt_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pixel-quilt").join("quilt_settings.cfg"))
        }
    }

    /// Settings file, then environment overrides.  A missing file is the
    /// defaults; unreadable or malformed entries are logged.
    pub fn load() -> Self {
        let mut s = match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        s.apply_env(|key| std::env::var(key).ok());
        s
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                log_info!("Loaded settings from {}", path.display());
                Self::parse(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log_warn!("Could not read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                log_warn!("Ignoring settings line without '=': {}", line);
                continue;
            };
            let key = key.trim();
            let val = val.trim();
            match key {
                "database_url" => s.database_url = val.to_string(),
                "auth_token" => s.auth_token = val.to_string(),
                "store_file" => {
                    s.store_file = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                "layout" => match QuiltLayout::preset(val) {
                    Some(layout) => s.layout = layout,
                    None => {
                        log_warn!("Unknown layout '{}', keeping {:?}", val, s.layout);
                    }
                },
                "halo_depth" => s.halo_depth = parse_or::<usize>(key, val, 4),
                "touch_mode" => match TouchMode::parse(val) {
                    Some(mode) => s.touch_mode = mode,
                    None => {
                        log_warn!("Unknown touch_mode '{}'", val);
                    }
                },
                "undo_persists" => s.undo_persists = val == "true",
                "poll_interval_ms" => s.poll_interval_ms = parse_or::<u64>(key, val, 1000).max(50),
                "max_history" => s.max_history = parse_or::<usize>(key, val, 50).max(1),
                _ => {
                    log_warn!("Unknown settings key '{}'", key);
                }
            }
        }
        if s.halo_depth == 0 || s.halo_depth > s.layout.grid_size {
            log_warn!(
                "halo_depth {} outside 1..={}, using {}",
                s.halo_depth,
                s.layout.grid_size,
                s.layout.grid_size.min(4)
            );
            s.halo_depth = s.layout.grid_size.min(4);
        }
        s
    }

    /// Apply `QUILT_DATABASE_URL` / `QUILT_AUTH_TOKEN` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty()) {
            self.database_url = url.trim().to_string();
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.auth_token = token.trim().to_string();
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "database_url={}\n\
             auth_token={}\n\
             store_file={}\n\
             layout={}\n\
             halo_depth={}\n\
             touch_mode={}\n\
             undo_persists={}\n\
             poll_interval_ms={}\n\
             max_history={}\n",
            self.database_url,
            self.auth_token,
            self.store_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            self.layout.preset_name().unwrap_or("grid48"),
            self.halo_depth,
            self.touch_mode.as_str(),
            self.undo_persists,
            self.poll_interval_ms,
            self.max_history,
        )
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| QuiltError::invalid("no configuration directory available"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn editor_config(&self) -> EditorConfig {
        EditorConfig {
            halo_depth: self.halo_depth.min(self.layout.grid_size),
            max_history: self.max_history,
            ..EditorConfig::default()
        }
    }

    /// Store selected by these settings: the local file wins over the URL.
    pub fn open_store(&self) -> Result<Arc<dyn QuiltStore>> {
        if let Some(path) = &self.store_file {
            return Ok(Arc::new(
                FileStore::new(path).with_poll_interval(self.poll_interval()),
            ));
        }
        if !self.database_url.trim().is_empty() {
            let token = (!self.auth_token.is_empty()).then(|| self.auth_token.clone());
            let store = RestStore::new(&self.database_url, token)?
                .with_poll_interval(self.poll_interval());
            return Ok(Arc::new(store));
        }
        Err(QuiltError::invalid(format!(
            "no store configured: pass --database-url or --store-file, set {}, \
             or add database_url to the settings file",
            ENV_DATABASE_URL
        )))
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, val: &str, default: T) -> T {
    match val.parse() {
        Ok(v) => v,
        Err(_) => {
            log_warn!("Bad value '{}' for {}, using {}", val, key, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys_and_skips_noise() {
        let s = Settings::parse(
            "# comment\n\
             database_url = https://demo.firebaseio.com\n\
             layout=classic\n\
             halo_depth=2\n\
             touch_mode=scroll\n\
             undo_persists=true\n\
             poll_interval_ms=250\n\
             mystery=1\n\
             garbage line\n",
        );
        assert_eq!(s.database_url, "https://demo.firebaseio.com");
        assert_eq!(s.layout, QuiltLayout::classic());
        assert_eq!(s.halo_depth, 2);
        assert_eq!(s.touch_mode, TouchMode::Scroll);
        assert!(s.undo_persists);
        assert_eq!(s.poll_interval(), Duration::from_millis(250));
        assert_eq!(s.max_history, 50);
    }

    #[test]
    fn malformed_values_fall_back() {
        let s = Settings::parse("halo_depth=lots\nmax_history=-3\nlayout=hexagons\nhalo_depth=99\n");
        assert_eq!(s.halo_depth, 4);
        assert_eq!(s.max_history, 50);
        assert_eq!(s.layout, QuiltLayout::grid48());
    }

    #[test]
    fn env_overrides_file() {
        let mut s = Settings::parse("database_url=https://file.example\nauth_token=abc\n");
        s.apply_env(|key| match key {
            ENV_DATABASE_URL => Some("https://env.example".into()),
            ENV_AUTH_TOKEN => Some("   ".into()),
            _ => None,
        });
        assert_eq!(s.database_url, "https://env.example");
        assert_eq!(s.auth_token, "abc");
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("quilt_settings.cfg");
        let s = Settings {
            store_file: Some(dir.path().join("quilt.json")),
            layout: QuiltLayout::grid36(),
            touch_mode: TouchMode::Scroll,
            ..Settings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }

    #[test]
    fn store_selection() {
        assert!(Settings::default().open_store().is_err());

        let dir = tempfile::tempdir().unwrap();
        let s = Settings {
            store_file: Some(dir.path().join("q.json")),
            database_url: "https://ignored.example".into(),
            ..Settings::default()
        };
        assert!(s.open_store().unwrap().describe().starts_with("file "));

        let s = Settings {
            database_url: "https://demo.firebaseio.com".into(),
            ..Settings::default()
        };
        assert_eq!(s.open_store().unwrap().describe(), "https://demo.firebaseio.com");
    }
}
