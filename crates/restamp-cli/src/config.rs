use chrono::Datelike;
use restamp_core::CustomizeOptions;
use serde::Deserialize;

#[derive(Deserialize, Default)]
pub struct RestampConfig {
    #[serde(default)]
    pub notice: NoticeConfig,
    #[serde(default)]
    pub locate: LocateConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Deserialize)]
pub struct NoticeConfig {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_year")]
    pub year: i32,
    pub html: Option<String>,
}

#[derive(Deserialize)]
pub struct LocateConfig {
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
}

#[derive(Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    #[serde(default = "default_renavigate")]
    pub renavigate_delay_ms: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            year: default_year(),
            html: None,
        }
    }
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            selectors: default_selectors(),
            phrases: default_phrases(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            retry_delays_ms: default_retry_delays(),
            debounce_ms: default_debounce(),
            renavigate_delay_ms: default_renavigate(),
        }
    }
}

fn default_owner() -> String {
    CustomizeOptions::default().owner
}
fn default_year() -> i32 {
    chrono::Utc::now().year()
}
fn default_selectors() -> Vec<String> {
    CustomizeOptions::default().selectors
}
fn default_phrases() -> Vec<String> {
    CustomizeOptions::default().phrases
}
fn default_retry_delays() -> Vec<u64> {
    CustomizeOptions::default().retry_delays_ms
}
fn default_debounce() -> u64 {
    CustomizeOptions::default().debounce_ms
}
fn default_renavigate() -> u64 {
    CustomizeOptions::default().renavigate_delay_ms
}

impl RestampConfig {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn into_options(self) -> CustomizeOptions {
        CustomizeOptions {
            owner: self.notice.owner,
            year: self.notice.year,
            notice_html: self.notice.html,
            selectors: self.locate.selectors,
            phrases: self.locate.phrases,
            retry_delays_ms: self.timing.retry_delays_ms,
            debounce_ms: self.timing.debounce_ms,
            renavigate_delay_ms: self.timing.renavigate_delay_ms,
        }
    }
}
