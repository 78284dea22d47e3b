use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub commands: Commands,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Answer every confirmation prompt with yes.
    #[serde(default)]
    pub assume_yes: bool,
    /// Append each pipeline to `<home>/logs/history.log`.
    #[serde(default)]
    pub history: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            assume_yes: false,
            history: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Paths {
    /// Root for sessions/, logs/ and the `system` asset namespace.
    #[serde(default = "default_home")]
    pub home: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            home: default_home(),
        }
    }
}

fn default_home() -> String {
    "~/.cx".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub roots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// `auto`, `table`, `json` or `raw`.
    #[serde(default = "default_mode")]
    pub default_mode: String,
    #[serde(default = "default_max_column_width")]
    pub max_column_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            max_column_width: default_max_column_width(),
        }
    }
}

fn default_mode() -> String {
    "auto".into()
}

fn default_max_column_width() -> usize {
    48
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct ScriptsConfig {
    /// File extension (no dot) → interpreter command line.
    #[serde(default)]
    pub interpreters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Commands {
    /// Built-in command names that are not registered.
    #[serde(default)]
    pub disabled: Vec<String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    paths: PathsOverlay,
    #[serde(default)]
    workspace: WorkspaceOverlay,
    #[serde(default)]
    output: OutputOverlay,
    #[serde(default)]
    scripts: ScriptsOverlay,
    #[serde(default)]
    commands: CommandsOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    log_level: Option<String>,
    assume_yes: Option<bool>,
    history: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsOverlay {
    home: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WorkspaceOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    roots: Vec<String>,
    #[serde(default)]
    remove_roots: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputOverlay {
    default_mode: Option<String>,
    max_column_width: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ScriptsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    interpreters: BTreeMap<String, String>,
    #[serde(default)]
    remove_interpreters: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CommandsOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    disabled: Vec<String>,
    #[serde(default)]
    remove_disabled: Vec<String>,
}

// ── Merge logic ──

/// Overlay list onto a default list. `replace` swaps the list out;
/// otherwise `remove` entries are dropped and new items appended once.
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

/// Key-by-key counterpart of [`merge_list`] for map settings.
fn merge_map(
    base: &mut BTreeMap<String, String>,
    add: BTreeMap<String, String>,
    remove: &[String],
    replace: bool,
) {
    if replace {
        *base = add;
    } else {
        base.retain(|key, _| !remove.contains(key));
        base.extend(add);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Embedded defaults with the overlay at `path` (or
    /// `~/.config/cx-shell/config.toml` if present) merged on top.
    ///
    /// Scalars override, lists extend, `remove_<field>` subtracts and
    /// `replace = true` drops a section's defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay(path) {
            config.apply_overlay(overlay);
        }
        config
    }

    fn load_overlay(path: Option<&Path>) -> Option<ConfigOverlay> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let home = std::env::var_os("HOME")?;
                Path::new(&home).join(".config/cx-shell/config.toml")
            }
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                // A missing default overlay is normal; a missing explicit one is not.
                if e.kind() != std::io::ErrorKind::NotFound || path.exists() {
                    eprintln!("cx: cannot read {}: {e}", path.display());
                }
                return None;
            }
        };
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("cx: config parse error in {}: {e}", path.display());
                None
            }
        }
    }

    /// Merge `overlay` into `self`.
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        // Settings: scalar overrides
        let s = overlay.settings;
        if let Some(v) = s.log_level {
            self.settings.log_level = v;
        }
        if let Some(v) = s.assume_yes {
            self.settings.assume_yes = v;
        }
        if let Some(v) = s.history {
            self.settings.history = v;
        }

        if let Some(v) = overlay.paths.home {
            self.paths.home = v;
        }

        let w = overlay.workspace;
        merge_list(&mut self.workspace.roots, w.roots, &w.remove_roots, w.replace);

        let o = overlay.output;
        if let Some(v) = o.default_mode {
            self.output.default_mode = v;
        }
        if let Some(v) = o.max_column_width {
            self.output.max_column_width = v;
        }

        let sc = overlay.scripts;
        merge_map(
            &mut self.scripts.interpreters,
            sc.interpreters,
            &sc.remove_interpreters,
            sc.replace,
        );

        let c = overlay.commands;
        merge_list(
            &mut self.commands.disabled,
            c.disabled,
            &c.remove_disabled,
            c.replace,
        );
    }

    /// `paths.home` with `~` and environment variables expanded.
    pub fn home_dir(&self) -> PathBuf {
        expand_path(&self.paths.home)
    }

    /// Workspace roots with `~` expanded, in configured order.
    pub fn workspace_roots(&self) -> Vec<PathBuf> {
        self.workspace.roots.iter().map(|r| expand_path(r)).collect()
    }

    /// Parsed `settings.log_level`, falling back to `Info`.
    pub fn log_level(&self) -> log::LevelFilter {
        self.settings
            .log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }

    /// The merged configuration as TOML, for `--dump-config`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

pub(crate) fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}
