//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".docsmith/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: Search,
    #[serde(default)]
    pub output: Output,
}

/// Import search paths. Earlier entries win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Search {
    #[serde(default)]
    pub paths: Vec<String>,
}

impl Search {
    pub fn path_bufs(&self) -> Vec<PathBuf> {
        self.paths.iter().map(PathBuf::from).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Output {
    #[serde(default)]
    directory: Option<String>,
}

impl Output {
    fn default_directory() -> &'static str {
        "docs"
    }

    pub fn directory(&self) -> PathBuf {
        PathBuf::from(
            self.directory
                .as_deref()
                .unwrap_or(Self::default_directory()),
        )
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    search_paths: Option<Vec<String>>,
    output_dir: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            search_paths: env::var_os("DOCSMITH_PATH").map(|value| {
                env::split_paths(&value)
                    .filter(|path| !path.as_os_str().is_empty())
                    .map(|path| path.display().to_string())
                    .collect()
            }),
            output_dir: env::var("DOCSMITH_OUTPUT_DIR").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(search_paths: &[&str], output_dir: &str) -> Self {
        Self {
            search_paths: Some(search_paths.iter().map(|p| (*p).to_owned()).collect()),
            output_dir: Some(output_dir.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            search: merge_search(self.search, other.search),
            output: merge_output(self.output, other.output),
        }
    }
}

/// Overlay paths take precedence, so they go first.
fn merge_search(base: Search, overlay: Search) -> Search {
    Search {
        paths: prepend_unique(overlay.paths, base.paths),
    }
}

fn merge_output(mut base: Output, overlay: Output) -> Output {
    if let Some(value) = overlay.directory {
        base.directory = Some(value);
    }
    base
}

fn prepend_unique(front: Vec<String>, back: Vec<String>) -> Vec<String> {
    let mut paths: Vec<String> = Vec::with_capacity(front.len() + back.len());
    for path in front.into_iter().chain(back) {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("docsmith/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(paths) = env.search_paths {
        config.search.paths = prepend_unique(paths, config.search.paths);
    }
    if let Some(output_dir) = env.output_dir {
        config.output.directory = Some(output_dir);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.search.paths, vec!["vendor", "lib"]);
        assert_eq!(config.output.directory(), PathBuf::from("docs"));
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[search]
paths = ["/opt/templates", "lib"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".docsmith"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".docsmith/config.toml"),
            r#"
[search]
paths = ["third_party"]
[output]
directory = "site/api"
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_dir.join(".docsmith/config.toml"));

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(
            config.search.paths,
            vec!["third_party", "/opt/templates", "lib", "vendor"]
        );
        assert_eq!(config.output.directory(), PathBuf::from("site/api"));
        assert_eq!(find_repo_root(&workspace_dir), Some(workspace_dir.clone()));

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests(&["/env/a", "lib"], "out");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.search.paths, vec!["/env/a", "lib", "vendor"]);
        assert_eq!(config.output.directory(), PathBuf::from("out"));
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
