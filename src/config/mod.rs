use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub mod themes;

pub use themes::ThemeName;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "CardGallery";
const APP_NAME: &str = "cardgallery";

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_LOAD_DELAY_MS: u64 = 300;
pub const MAX_LOAD_DELAY_MS: u64 = 2_000;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub catalog_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("CARDGALLERY_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("CARDGALLERY_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_root, project_dirs.state_dir()))
    }

    /// Lays every path out under `root`; used for portable installs and tests.
    pub fn under(root: &Path) -> Self {
        let config_dir = root.join("config");
        let config_file = config_dir.join("config.toml");
        Self::rooted(config_dir, config_file, root.join("data"), None)
    }

    fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_root: PathBuf,
        state_dir: Option<&Path>,
    ) -> Self {
        let state_dir = state_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        Self {
            config_dir,
            config_file,
            database_path: data_root.join("gallery.db"),
            catalog_path: data_root.join("messages.json"),
            log_dir: state_dir.join("logs"),
            data_dir: data_root,
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Theme used until the user toggles one; the toggled theme is persisted separately.
    #[serde(deserialize_with = "themes::deserialize_or_dark")]
    pub theme: ThemeName,
    pub page_size: usize,
    pub load_delay_ms: u64,
    /// Empty means `<data_dir>/messages.json`.
    pub catalog_path: PathBuf,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Dark,
            page_size: DEFAULT_PAGE_SIZE,
            load_delay_ms: DEFAULT_LOAD_DELAY_MS,
            catalog_path: PathBuf::new(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.catalog_path.as_os_str().is_empty() {
            self.catalog_path = paths.catalog_path.clone();
        }
        if self.page_size == 0 {
            tracing::warn!("page_size of 0 in config, using {DEFAULT_PAGE_SIZE}");
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.load_delay_ms > MAX_LOAD_DELAY_MS {
            tracing::warn!(
                requested = self.load_delay_ms,
                "load_delay_ms too large, clamping to {MAX_LOAD_DELAY_MS}"
            );
            self.load_delay_ms = MAX_LOAD_DELAY_MS;
        }
        Ok(())
    }

    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_ms.min(MAX_LOAD_DELAY_MS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}
