//! Baseline session configuration.
//!
//! These values are passed through to the engine untouched.

use std::collections::BTreeMap;
use std::time::Duration;

/// Browser launch flags for headless rendering.
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-sandbox",
    "--no-zygote",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-default-apps",
    "--disable-sync",
    "--disable-translate",
    "--hide-scrollbars",
    "--metrics-recording-only",
    "--mute-audio",
    "--no-first-run",
    "--disable-features=IsolateOrigins,site-per-process",
];

/// Installed before any page script runs.
pub const INIT_SCRIPT: &str = r#"
window.addEventListener('beforeunload', (event) => {
    event.preventDefault();
    return event.returnValue = "Navigation blocked";
});
document.addEventListener('contextmenu', event => event.preventDefault());
document.addEventListener('selectstart', event => event.preventDefault());
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.open = function() { return null; };
"#;

/// Evaluated after each successful navigation, before any user script.
pub const DIALOG_SUPPRESSION_SCRIPT: &str = r#"
window.alert = function() {};
window.confirm = function() { return true; };
window.prompt = function() { return null; };
window.print = function() {};
window.find = function() { return false; };
"#;

/// Baseline configuration applied to every new session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub launch_args: Vec<String>,
    pub accept_downloads: bool,
    pub javascript_enabled: bool,
    pub bypass_csp: bool,
    pub permissions: Vec<String>,
    pub extra_headers: BTreeMap<String, String>,
    pub init_scripts: Vec<String>,
    /// Request types allowed through; everything else is aborted.
    pub allowed_resource_types: Vec<String>,
    pub default_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let extra_headers = [
            ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Dest", "document"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            launch_args: LAUNCH_ARGS.iter().map(|s| s.to_string()).collect(),
            accept_downloads: false,
            javascript_enabled: true,
            bypass_csp: true,
            permissions: Vec::new(),
            extra_headers,
            init_scripts: vec![INIT_SCRIPT.to_string()],
            allowed_resource_types: ["document", "script", "stylesheet", "image", "font"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            default_timeout: Duration::from_secs(90),
        }
    }
}
