//! Configuration for the `bua` facade.
//!
//! Loaded from YAML (`config/config.yaml`, then the user config directory), with
//! `BUA_*` environment variables applied on top.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use action_primitives::{AnnotationConfig, Highlighter, PrimitivesConfig, StabilityWindow, Viewport};
use agent_core::{AgentLoopConfig, ScreenshotMode, ToolsetConfig};
use anyhow::{ensure, Context, Result};
use cdp_adapter::CdpConfig;
use perceiver_visual::ScreenshotOptions;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

const APP_DIR: &str = "bua";
const LOCAL_CONFIG: &str = "config/config.yaml";

/// Named window sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportPreset {
    #[default]
    Desktop,
    Large,
    Tablet,
    Mobile,
}

impl ViewportPreset {
    pub fn viewport(self) -> Viewport {
        match self {
            Self::Desktop => Viewport::new(1280, 800),
            Self::Large => Viewport::new(1920, 1080),
            Self::Tablet => Viewport::new(768, 1024),
            Self::Mobile => Viewport::new(375, 812),
        }
    }
}

/// Trade-off between what the model sees and what a turn costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPreset {
    Efficient,
    Balanced,
    Quality,
    Maximum,
    TextOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub max_elements: usize,
    pub screenshot: ScreenshotOptions,
    pub text_only: bool,
}

impl TokenPreset {
    pub fn budget(self) -> TokenBudget {
        let (max_elements, max_width, quality, text_only) = match self {
            Self::Efficient => (100, 640, 50, false),
            Self::Balanced => (150, 800, 60, false),
            Self::Quality => (250, 1024, 75, false),
            Self::Maximum => (400, 1280, 85, false),
            Self::TextOnly => (200, 0, 0, true),
        };
        TokenBudget {
            max_elements,
            screenshot: ScreenshotOptions::new(max_width, quality).normalized(),
            text_only,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub headless: bool,
    /// Chrome binary; detected when unset.
    pub executable: Option<PathBuf>,
    /// Defaults to `~/.bua/profiles`.
    pub user_data_dir: Option<PathBuf>,
    /// Attach to a running browser instead of launching one.
    pub websocket_url: Option<String>,
    pub viewport_preset: ViewportPreset,
    /// Overrides `viewport_preset` when set.
    pub viewport: Option<Viewport>,
    pub deadline_ms: u64,
    pub extra_args: Vec<String>,
    pub navigation_window: StabilityWindow,
    pub post_type_window: StabilityWindow,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_data_dir: None,
            websocket_url: None,
            viewport_preset: ViewportPreset::Desktop,
            viewport: None,
            deadline_ms: 30_000,
            extra_args: Vec::new(),
            navigation_window: StabilityWindow::navigation(),
            post_type_window: StabilityWindow::post_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    #[serde(flatten)]
    pub loop_config: AgentLoopConfig,
    pub max_elements: usize,
    pub screenshot_max_width: u32,
    pub screenshot_quality: u8,
    pub text_only: bool,
    pub screenshot_mode: ScreenshotMode,
    pub show_annotations: bool,
    pub annotation: AnnotationConfig,
    /// Replaces `max_elements`, the screenshot bounds and `text_only` when set.
    pub token_preset: Option<TokenPreset>,
}

impl Default for AgentSection {
    fn default() -> Self {
        let screenshot = ScreenshotOptions::default();
        Self {
            loop_config: AgentLoopConfig::default(),
            max_elements: 150,
            screenshot_max_width: screenshot.max_width,
            screenshot_quality: screenshot.quality,
            text_only: false,
            screenshot_mode: ScreenshotMode::Normal,
            show_annotations: false,
            annotation: AnnotationConfig::default(),
            token_preset: None,
        }
    }
}

impl AgentSection {
    pub fn budget(&self) -> TokenBudget {
        match self.token_preset {
            Some(preset) => preset.budget(),
            None => TokenBudget {
                max_elements: self.max_elements,
                screenshot: ScreenshotOptions::new(
                    self.screenshot_max_width,
                    self.screenshot_quality,
                )
                .normalized(),
                text_only: self.text_only,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightSection {
    /// Unset means on for headed runs only.
    pub enabled: Option<bool>,
    pub delay_ms: u64,
}

impl Default for HighlightSection {
    fn default() -> Self {
        Self {
            enabled: None,
            delay_ms: action_primitives::highlight::DEFAULT_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    /// Forces `debug` regardless of `level`.
    pub debug: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuaConfig {
    pub browser: BrowserSection,
    pub agent: AgentSection,
    pub highlight: HighlightSection,
    pub logging: LoggingSection,
    pub downloads_dir: PathBuf,
}

impl Default for BuaConfig {
    fn default() -> Self {
        Self {
            browser: BrowserSection::default(),
            agent: AgentSection::default(),
            highlight: HighlightSection::default(),
            logging: LoggingSection::default(),
            downloads_dir: bua_home()
                .map(|home| home.join("downloads"))
                .unwrap_or_else(|| PathBuf::from("downloads")),
        }
    }
}

fn bua_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bua"))
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

impl BuaConfig {
    pub fn viewport(&self) -> Viewport {
        self.browser
            .viewport
            .unwrap_or_else(|| self.browser.viewport_preset.viewport())
    }

    pub fn validate(&self) -> Result<()> {
        let viewport = self.viewport();
        ensure!(
            viewport.width > 0 && viewport.height > 0,
            "viewport must be non-empty, got {}x{}",
            viewport.width,
            viewport.height
        );
        ensure!(
            self.agent.loop_config.max_iterations > 0,
            "agent.max_iterations must be at least 1"
        );
        ensure!(self.browser.deadline_ms > 0, "browser.deadline_ms must be positive");
        Ok(())
    }

    /// Applies `BUA_HEADLESS`, `BUA_CHROME`, `BUA_CHROME_PROFILE`, `BUA_WS_URL` and `BUA_LOG`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()));
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("BUA_HEADLESS") {
            self.browser.headless = parse_flag(&value);
        }
        if let Some(value) = lookup("BUA_CHROME") {
            self.browser.executable = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = lookup("BUA_CHROME_PROFILE") {
            self.browser.user_data_dir = Some(PathBuf::from(value.trim()));
        }
        if let Some(value) = lookup("BUA_WS_URL") {
            self.browser.websocket_url = Some(value.trim().to_string());
        }
        if let Some(value) = lookup("BUA_LOG") {
            self.logging.level = value.trim().to_string();
        }
    }

    pub fn cdp_config(&self) -> CdpConfig {
        let viewport = self.viewport();
        CdpConfig {
            executable: self.browser.executable.clone(),
            user_data_dir: self
                .browser
                .user_data_dir
                .clone()
                .or_else(|| bua_home().map(|home| home.join("profiles"))),
            headless: self.browser.headless,
            default_deadline_ms: self.browser.deadline_ms,
            websocket_url: self.browser.websocket_url.clone(),
            window_size: (viewport.width, viewport.height),
            extra_args: self.browser.extra_args.clone(),
        }
    }

    pub fn primitives_config(&self) -> PrimitivesConfig {
        PrimitivesConfig {
            viewport: self.viewport(),
            highlighter: Highlighter::new(
                self.highlight.enabled.unwrap_or(!self.browser.headless),
                Duration::from_millis(self.highlight.delay_ms),
            ),
            navigation_window: self.browser.navigation_window,
            post_type_window: self.browser.post_type_window,
        }
    }

    pub fn toolset_config(&self) -> ToolsetConfig {
        let budget = self.agent.budget();
        ToolsetConfig {
            max_elements: budget.max_elements,
            screenshot: budget.screenshot,
            text_only: budget.text_only,
            screenshot_mode: self.agent.screenshot_mode,
            show_annotations: self.agent.show_annotations,
            annotation: self.agent.annotation,
            downloads_dir: self.downloads_dir.clone(),
            headless: self.browser.headless,
        }
    }

    pub fn loop_config(&self) -> AgentLoopConfig {
        self.agent.loop_config.clone()
    }
}

pub struct LoadedConfig {
    pub config: BuaConfig,
    /// File the values came from; `None` when defaults were used.
    pub path: Option<PathBuf>,
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
}

/// Reads `path`, else `config/config.yaml`, else `<config dir>/bua/config.yaml`.
///
/// A missing file yields defaults. Environment overrides are applied in both cases.
pub async fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let candidate = match path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };

    let mut loaded = match candidate {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: BuaConfig =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;
            info!(path = %path.display(), "loaded configuration");
            LoadedConfig {
                config,
                path: Some(path),
            }
        }
        Some(path) => {
            warn!(path = %path.display(), "config file not found, using defaults");
            LoadedConfig {
                config: BuaConfig::default(),
                path: None,
            }
        }
        None => LoadedConfig {
            config: BuaConfig::default(),
            path: None,
        },
    };

    loaded.config.apply_env_overrides();
    loaded.config.validate()?;
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    const ENV_KEYS: [&str; 5] = [
        "BUA_HEADLESS",
        "BUA_CHROME",
        "BUA_CHROME_PROFILE",
        "BUA_WS_URL",
        "BUA_LOG",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn viewport_presets() {
        assert_eq!(ViewportPreset::Desktop.viewport(), Viewport::new(1280, 800));
        assert_eq!(ViewportPreset::Large.viewport(), Viewport::new(1920, 1080));
        assert_eq!(ViewportPreset::Tablet.viewport(), Viewport::new(768, 1024));
        assert_eq!(ViewportPreset::Mobile.viewport(), Viewport::new(375, 812));

        let mut config = BuaConfig::default();
        config.browser.viewport_preset = ViewportPreset::Mobile;
        assert_eq!(config.viewport(), Viewport::new(375, 812));
        config.browser.viewport = Some(Viewport::new(1000, 700));
        assert_eq!(config.cdp_config().window_size, (1000, 700));
    }

    #[test]
    fn token_presets_replace_budget() {
        let balanced = TokenPreset::Balanced.budget();
        assert_eq!(balanced.max_elements, 150);
        assert_eq!(balanced.screenshot, ScreenshotOptions::new(800, 60));

        let text_only = TokenPreset::TextOnly.budget();
        assert!(text_only.text_only);
        assert_eq!(text_only.max_elements, 200);
        assert_eq!(text_only.screenshot, ScreenshotOptions::default());

        let mut config = BuaConfig::default();
        config.agent.max_elements = 10;
        assert_eq!(config.toolset_config().max_elements, 10);
        config.agent.token_preset = Some(TokenPreset::Maximum);
        let toolset = config.toolset_config();
        assert_eq!(toolset.max_elements, 400);
        assert_eq!(toolset.screenshot, ScreenshotOptions::new(1280, 85));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
browser:
  headless: false
  viewport_preset: tablet
agent:
  max_iterations: 12
  screenshot_mode: smart
  token_preset: efficient
highlight:
  enabled: false
downloads_dir: /tmp/bua-downloads
"#;
        let config: BuaConfig = serde_yaml::from_str(yaml).expect("yaml");
        assert!(!config.browser.headless);
        assert_eq!(config.viewport(), Viewport::new(768, 1024));
        assert_eq!(config.agent.loop_config.max_iterations, 12);
        assert_eq!(config.agent.loop_config.max_rate_limit_retries, 5);
        assert_eq!(config.agent.screenshot_mode, ScreenshotMode::Smart);
        assert_eq!(config.toolset_config().max_elements, 100);
        assert!(!config.primitives_config().highlighter.enabled);

        let headed: BuaConfig = serde_yaml::from_str("browser:\n  headless: false\n").expect("yaml");
        assert!(headed.primitives_config().highlighter.enabled);
        assert!(!headed.toolset_config().headless);
        assert!(BuaConfig::default().toolset_config().headless);
        assert!(!BuaConfig::default().primitives_config().highlighter.enabled);
        assert_eq!(config.browser.navigation_window, StabilityWindow::navigation());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.downloads_dir, PathBuf::from("/tmp/bua-downloads"));
    }

    #[test]
    fn overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BUA_HEADLESS", "off"),
            ("BUA_CHROME", "/opt/chrome/chrome"),
            ("BUA_WS_URL", "ws://127.0.0.1:9222/devtools/browser/abc"),
            ("BUA_LOG", "debug"),
        ]);
        let mut config = BuaConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert!(!config.browser.headless);
        assert_eq!(config.browser.executable, Some(PathBuf::from("/opt/chrome/chrome")));
        assert_eq!(config.browser.user_data_dir, None);
        assert_eq!(config.logging.level, "debug");
        let cdp = config.cdp_config();
        assert_eq!(
            cdp.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
        assert!(!cdp.headless);
        assert_eq!(cdp.executable, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[test]
    fn validate_rejects_empty_viewport() {
        let mut config = BuaConfig::default();
        config.browser.viewport = Some(Viewport::new(0, 600));
        assert!(config.validate().is_err());

        let mut config = BuaConfig::default();
        config.agent.loop_config.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    #[serial]
    async fn load_explicit_file_then_env() {
        clear_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bua.yaml");
        std::fs::write(&path, "browser:\n  headless: true\nlogging:\n  json: true\n").expect("write");
        env::set_var("BUA_HEADLESS", "0");
        env::set_var("BUA_CHROME_PROFILE", "/tmp/bua-profile");

        let loaded = load_config(Some(&path)).await.expect("load");
        clear_env();

        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert!(!loaded.config.browser.headless);
        assert!(loaded.config.logging.json);
        assert_eq!(
            loaded.config.cdp_config().user_data_dir,
            Some(PathBuf::from("/tmp/bua-profile"))
        );
    }

    #[tokio::test]
    #[serial]
    async fn missing_file_uses_defaults() {
        clear_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load_config(Some(&dir.path().join("absent.yaml")))
            .await
            .expect("defaults");
        assert!(loaded.path.is_none());
        assert!(loaded.config.browser.headless);
        assert_eq!(loaded.config.agent.loop_config.max_iterations, 50);
    }

    #[tokio::test]
    #[serial]
    async fn malformed_file_is_an_error() {
        clear_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "browser: [not, a, map]\n").expect("write");
        let err = load_config(Some(&path)).await.err().expect("parse error");
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
