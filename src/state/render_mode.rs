use serde::Deserialize;
use std::fmt;

/// Rendering profile for a crawl run
///
/// The profile is recorded on the run and on every snapshot, and selects the
/// user agent presented by both the browser and the status-only requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Desktop,
    Mobile,
    Bot,
}

impl RenderMode {
    /// User agent string presented for this profile
    pub fn user_agent(&self) -> &'static str {
        match self {
            Self::Desktop => "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
            Self::Mobile => "Mozilla/5.0 (iPhone; CPU iPhone OS 13_5 like Mac OS X)",
            Self::Bot => "Googlebot/2.1 (+http://www.google.com/bot.html)",
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Bot => "bot",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "desktop" => Some(Self::Desktop),
            "mobile" => Some(Self::Mobile),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
