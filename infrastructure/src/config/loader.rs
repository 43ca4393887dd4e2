//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "ultra";
const PROJECT_FILES: [&str; 2] = ["ultra.toml", ".ultra.toml"];
const ENV_PREFIX: &str = "ULTRA_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `ULTRA_*` environment variables (`ULTRA_CACHE__CAPACITY=64`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./ultra.toml` or `./.ultra.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/ultra/config.toml` (or the platform equivalent)
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let project = Self::project_config_path();
        Self::load_from(
            Self::global_config_path().as_deref(),
            project.as_deref(),
            config_path.map(PathBuf::as_path),
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(Box::new)
    }

    /// File layers only, without the environment
    fn load_from(
        global: Option<&Path>,
        project: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(path) = global
            && path.exists()
        {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = project {
            figment = figment.merge(Toml::file(path));
        }

        // An explicit path must exist; a missing file is an error, not a no-op
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns `<config dir>/ultra/config.toml`, e.g.
    /// `~/.config/ultra/config.toml` on Linux.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        Self::project_config_in(Path::new("."))
    }

    fn project_config_in(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(explicit: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");

        println!("  [ENV  ] Environment: {}*", ENV_PREFIX);

        if let Some(path) = explicit {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{:5}] Explicit: {}", mark, path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./ultra.toml or ./.ultra.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extract(figment: Figment) -> FileConfig {
        figment.extract().unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.pipeline.models.len(), 2);
        assert!(config.pipeline.peer_review);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        // Should return a path (even if file doesn't exist)
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("ultra"));
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("ultra.toml");
        let explicit = dir.path().join("explicit.toml");

        fs::write(
            &global,
            "[cache]\ncapacity = 10\nttl_secs = 11\n[pipeline]\ntimeout_ms = 1000\n",
        )
        .unwrap();
        fs::write(&project, "[cache]\ncapacity = 20\n").unwrap();
        fs::write(&explicit, "[pipeline]\ntimeout_ms = 3000\n").unwrap();

        let config = extract(ConfigLoader::load_from(
            Some(&global),
            Some(&project),
            Some(&explicit),
        ));
        assert_eq!(config.cache.capacity, 20);
        assert_eq!(config.cache.ttl_secs, 11);
        assert_eq!(config.pipeline.timeout_ms, 3000);
        // untouched values keep their defaults
        assert!(config.pipeline.peer_review);
    }

    #[test]
    fn test_missing_global_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = extract(ConfigLoader::load_from(
            Some(&dir.path().join("nope.toml")),
            None,
            None,
        ));
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::load_from(None, None, Some(&dir.path().join("nope.toml")))
            .extract::<FileConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn test_type_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[cache]\ncapacity = \"lots\"\n").unwrap();
        let result = ConfigLoader::load_from(None, Some(&path), None).extract::<FileConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn test_project_config_discovery() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::project_config_in(dir.path()).is_none());

        fs::write(dir.path().join(".ultra.toml"), "").unwrap();
        let found = ConfigLoader::project_config_in(dir.path()).unwrap();
        assert!(found.ends_with(".ultra.toml"));

        fs::write(dir.path().join("ultra.toml"), "").unwrap();
        let found = ConfigLoader::project_config_in(dir.path()).unwrap();
        assert!(found.ends_with("ultra.toml"));
        assert!(!found.to_string_lossy().ends_with(".ultra.toml"));
    }
}
