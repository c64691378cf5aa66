//! Starting a local Chrome and finding its devtools endpoint.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use tokio::time::timeout;
use tracing::info;
use which::which;

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
const STDERR_PREVIEW_LINES: usize = 8;

/// Flags passed to every launched browser, on top of chromiumoxide's own.
const BASE_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--autoplay-policy=no-user-gesture-required",
    "--disable-features=PreloadMediaEngagementData,MediaEngagementBypassAutoplayPolicies",
    "--disable-background-networking",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-extensions",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
];

#[cfg(target_os = "windows")]
const EXECUTABLE_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(target_os = "windows"))]
const EXECUTABLE_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

fn launch_error(hint: impl Into<String>) -> AdapterError {
    AdapterError::new(AdapterErrorKind::CdpIo).with_hint(hint)
}

pub fn launch_args(cfg: &CdpConfig) -> Vec<String> {
    let (width, height) = cfg.window_size;
    let mut args: Vec<String> = BASE_FLAGS.iter().map(|flag| flag.to_string()).collect();
    args.push(format!("--window-size={width},{height}"));
    if cfg.headless {
        args.push("--headless=new".to_string());
        args.push("--hide-scrollbars".to_string());
        args.push("--mute-audio".to_string());
    }
    args.extend(cfg.extra_args.iter().cloned());
    args
}

/// First Chrome found on `PATH`, then in the platform's default install locations.
pub fn find_chrome() -> Option<PathBuf> {
    EXECUTABLE_NAMES
        .iter()
        .find_map(|name| which(name).ok())
        .or_else(|| install_locations().into_iter().find(|path| path.exists()))
}

fn install_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".into(),
            "/Applications/Chromium.app/Contents/MacOS/Chromium".into(),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe".into(),
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe".into(),
        ]
    } else {
        vec![
            "/usr/bin/google-chrome-stable".into(),
            "/usr/bin/google-chrome".into(),
            "/usr/bin/chromium-browser".into(),
            "/usr/bin/chromium".into(),
        ]
    }
}

fn resolve_executable(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
    match &cfg.executable {
        Some(path) if path.exists() => Ok(path.clone()),
        Some(path) => Err(launch_error(format!(
            "chrome executable not found at {}",
            path.display()
        ))),
        None => find_chrome().ok_or_else(|| {
            launch_error("no chrome or chromium found; set browser.executable or BUA_CHROME")
        }),
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let executable = resolve_executable(cfg)?;
    let profile = cfg
        .user_data_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("bua-profile"));
    fs::create_dir_all(&profile).map_err(|err| {
        launch_error(format!(
            "cannot create user data dir {}: {err}",
            profile.display()
        ))
    })?;

    let mut builder = BrowserConfig::builder()
        .chrome_executable(executable)
        .user_data_dir(profile)
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(LAUNCH_TIMEOUT)
        .args(launch_args(cfg));
    if !cfg.headless {
        builder = builder.with_head();
    }
    builder
        .build()
        .map_err(|err| launch_error(format!("invalid launch options: {err}")))
}

/// Spawns Chrome and returns the process with its browser websocket url.
pub(crate) async fn launch(cfg: &CdpConfig) -> Result<(Child, String), AdapterError> {
    let mut child = browser_config(cfg)?
        .launch()
        .map_err(|err| launch_error(format!("failed to launch chrome: {err}")))?;
    let ws_url = devtools_url(&mut child).await?;
    info!(target: "cdp-launcher", headless = cfg.headless, url = %ws_url, "chrome launched");
    Ok((child, ws_url))
}

/// Returns the websocket url announced on a Chrome stderr line, if any.
pub fn parse_devtools_line(line: &str) -> Option<&str> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then_some(ws)
}

async fn devtools_url(child: &mut Child) -> Result<String, AdapterError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| launch_error("chrome stderr is not captured"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut seen = Vec::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| launch_error(err.to_string()))?;
            if let Some(ws) = parse_devtools_line(&line) {
                return Ok(ws.to_string());
            }
            if seen.len() < STDERR_PREVIEW_LINES {
                seen.push(line);
            }
        }
        Err(launch_error(format!(
            "chrome exited before announcing devtools: {}",
            seen.join(" | ")
        )))
    };

    timeout(LAUNCH_TIMEOUT, scan)
        .await
        .map_err(|_| launch_error("timed out waiting for chrome devtools").retriable(true))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn args_follow_window_and_mode() {
        let cfg = CdpConfig {
            headless: false,
            window_size: (1920, 1080),
            extra_args: vec!["--lang=en-US".into()],
            ..CdpConfig::default()
        };
        let args = launch_args(&cfg);
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--headless")));
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));

        let headless = launch_args(&CdpConfig::default());
        assert!(headless.contains(&"--headless=new".to_string()));
        assert!(headless.contains(&"--window-size=1280,800".to_string()));
    }

    #[test]
    fn devtools_line_must_name_browser_socket() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-123";
        assert_eq!(
            parse_devtools_line(line),
            Some("ws://127.0.0.1:9222/devtools/browser/abc-123")
        );
        assert_eq!(parse_devtools_line("[0101/000000.000:INFO] started"), None);
        assert_eq!(
            parse_devtools_line("listening on http://127.0.0.1:9222/json"),
            None
        );
    }

    #[test]
    fn missing_configured_executable_is_reported() {
        let cfg = CdpConfig {
            executable: Some("/nonexistent/bua/chrome".into()),
            ..CdpConfig::default()
        };
        let err = resolve_executable(&cfg).expect_err("missing binary");
        assert_eq!(err.kind, AdapterErrorKind::CdpIo);
        assert!(err.to_string().contains("/nonexistent/bua/chrome"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn chrome_is_found_on_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let exe = dir.path().join(EXECUTABLE_NAMES[0]);
        fs::write(&exe, b"").expect("write stub");
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).expect("chmod");

        let original = env::var_os("PATH");
        env::set_var("PATH", dir.path());
        let found = find_chrome();
        match original {
            Some(path) => env::set_var("PATH", path),
            None => env::remove_var("PATH"),
        }
        assert_eq!(found, Some(exe));
    }
}
