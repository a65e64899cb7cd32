use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::IngestionError;

/// How a portal report id is reduced to the identifier stored with its lines.
///
/// The portal sometimes renders ids as `Отчёт №123456`; storage keeps the
/// suffix only, so candidates and file names must be stripped the same way
/// before they are compared with persisted ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportIdPolicy {
    /// Text after the last `№`, trimmed. Ids without the sign pass through.
    #[default]
    AfterNumberSign,
    /// Trailing run of ASCII letters and digits.
    TrailingAlphanumeric,
    Verbatim,
}

fn trailing_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9A-Za-z]+)\s*$").expect("valid trailing id pattern"))
}

impl ReportIdPolicy {
    pub fn strip(&self, raw: &str) -> String {
        match self {
            ReportIdPolicy::AfterNumberSign => raw
                .rsplit('№')
                .next()
                .unwrap_or(raw)
                .trim()
                .to_string(),
            ReportIdPolicy::TrailingAlphanumeric => trailing_alphanumeric()
                .captures(raw)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| raw.trim().to_string()),
            ReportIdPolicy::Verbatim => raw.trim().to_string(),
        }
    }
}

impl FromStr for ReportIdPolicy {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "after-number-sign" => Ok(ReportIdPolicy::AfterNumberSign),
            "trailing-alphanumeric" => Ok(ReportIdPolicy::TrailingAlphanumeric),
            "verbatim" => Ok(ReportIdPolicy::Verbatim),
            other => Err(IngestionError::Config(format!(
                "unknown report id policy '{}'",
                other
            ))),
        }
    }
}
