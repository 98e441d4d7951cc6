use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The three exam sections, in paper order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Section {
    #[strum(serialize = "VARC")]
    #[serde(rename = "VARC")]
    Varc,
    #[strum(serialize = "DILR")]
    #[serde(rename = "DILR")]
    Dilr,
    #[strum(serialize = "QA")]
    #[serde(rename = "QA")]
    Qa,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Varc, Section::Dilr, Section::Qa];

    /// Lowercase form used in output file names and aggregation keys.
    pub fn slug(&self) -> &'static str {
        match self {
            Section::Varc => "varc",
            Section::Dilr => "dilr",
            Section::Qa => "qa",
        }
    }

    /// Heading text used on the subarea-wise performance page.
    pub fn from_heading(text: &str) -> Option<Self> {
        match text {
            "VA/RC" => Some(Section::Varc),
            "DI/LR" => Some(Section::Dilr),
            "QA" => Some(Section::Qa),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn display_matches_site_query_values() {
        assert_eq!(Section::Varc.to_string(), "VARC");
        assert_eq!(Section::Dilr.to_string(), "DILR");
        assert_eq!(Section::Qa.to_string(), "QA");
    }

    #[test]
    fn parses_from_query_value_and_heading() {
        assert_eq!(Section::from_str("DILR").unwrap(), Section::Dilr);
        assert_eq!(Section::from_heading("VA/RC"), Some(Section::Varc));
        assert_eq!(Section::from_heading("Scorecard"), None);
    }
}
