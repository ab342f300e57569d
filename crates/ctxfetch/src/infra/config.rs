//! Configuration management utilities.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".ctxfetch/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub workspace: Workspace,
    #[serde(default)]
    pub ignore: Ignore,
    #[serde(default)]
    pub render: Render,
    /// Extension to fence-tag overrides.
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Workspace {
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub max_file_size: Option<u64>,
}

impl Workspace {
    fn default_max_file_size() -> u64 {
        1024 * 1024
    }

    /// Whether dot-files are collected.
    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Byte limit for collected and rendered files, 1 MiB by default.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or_else(Self::default_max_file_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ignore {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub globs: Vec<String>,
}

impl Default for Ignore {
    fn default() -> Self {
        Self {
            paths: vec![
                "target/".into(),
                "node_modules/".into(),
                "dist/".into(),
                ".git/".into(),
            ],
            globs: vec!["*.min.js".into(), "*.lock".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Render {
    #[serde(default)]
    auto_generate: Option<bool>,
}

impl Render {
    /// Whether store changes regenerate the document, off by default.
    pub fn auto_generate(&self) -> bool {
        self.auto_generate.unwrap_or(false)
    }

    /// Override the auto-generation setting.
    pub fn set_auto_generate(&mut self, enabled: bool) {
        self.auto_generate = Some(enabled);
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    auto_generate: Option<String>,
    max_file_size: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            auto_generate: env::var("CTXFETCH_AUTO_GENERATE").ok(),
            max_file_size: env::var("CTXFETCH_MAX_FILE_SIZE").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(auto_generate: &str, max_file_size: &str) -> Self {
        Self {
            auto_generate: Some(auto_generate.to_owned()),
            max_file_size: Some(max_file_size.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, the workspace config found from
    /// `start`, and env overrides.
    pub fn load_for(start: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = Some(workspace_config_path(start));
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::parse(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        apply_env_overrides(merged, env_overrides)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        let mut languages = self.languages;
        languages.extend(other.languages);

        Self {
            workspace: merge_workspace(self.workspace, other.workspace),
            ignore: merge_ignore(self.ignore, other.ignore),
            render: merge_render(self.render, other.render),
            languages,
        }
    }
}

fn merge_workspace(base: Workspace, overlay: Workspace) -> Workspace {
    Workspace {
        show_hidden: overlay.show_hidden || base.show_hidden,
        max_file_size: overlay.max_file_size.or(base.max_file_size),
    }
}

fn merge_ignore(base: Ignore, overlay: Ignore) -> Ignore {
    let mut paths: BTreeSet<String> = base.paths.into_iter().collect();
    paths.extend(overlay.paths);

    let mut globs: BTreeSet<String> = base.globs.into_iter().collect();
    globs.extend(overlay.globs);

    Ignore {
        paths: paths.into_iter().collect(),
        globs: globs.into_iter().collect(),
    }
}

fn merge_render(mut base: Render, overlay: Render) -> Render {
    if let Some(value) = overlay.auto_generate {
        base.auto_generate = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("ctxfetch/config.toml"))
}

fn workspace_config_path(start: &Path) -> PathBuf {
    let root = find_repo_root(start).unwrap_or_else(|| start.to_path_buf());
    root.join(DEFAULT_WORKSPACE_CONFIG_PATH)
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

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(raw) = env.auto_generate {
        config.render.auto_generate = Some(parse_bool(&raw).with_context(|| {
            format!("CTXFETCH_AUTO_GENERATE must be a boolean, got '{raw}'")
        })?);
    }
    if let Some(raw) = env.max_file_size {
        let bytes = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("CTXFETCH_MAX_FILE_SIZE must be a byte count, got '{raw}'"))?;
        config.workspace.max_file_size = Some(bytes);
    }
    Ok(config)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognised boolean '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.workspace.max_file_size(), 1024 * 1024);
        assert!(!config.render.auto_generate());
        assert!(config.ignore.paths.contains(&"target/".into()));
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[workspace]
max_file_size = 2048
[ignore]
paths = ["generated/"]
[languages]
h = "c"
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".ctxfetch"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".ctxfetch/config.toml"),
            r#"
[render]
auto_generate = true
[ignore]
globs = ["*.cache"]
[languages]
h = "cpp"
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_config_path(&workspace_dir.join("nested")));
        assert_eq!(
            workspace_path.as_deref(),
            Some(workspace_dir.join(".ctxfetch/config.toml").as_path())
        );

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(config.workspace.max_file_size(), 2048);
        assert!(config.render.auto_generate());
        assert!(config.ignore.paths.contains(&"generated/".into()));
        assert!(config.ignore.paths.contains(&"target/".into()));
        assert!(config.ignore.globs.contains(&"*.cache".into()));
        assert_eq!(config.languages.get("h").map(String::as_str), Some("cpp"));

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("yes", "512");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert!(config.render.auto_generate());
        assert_eq!(config.workspace.max_file_size(), 512);
        Ok(())
    }

    #[test]
    fn malformed_env_override_is_an_error() {
        let overrides = EnvOverrides::for_tests("maybe", "512");
        assert!(Config::load_with_layers(None, None, overrides).is_err());
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
