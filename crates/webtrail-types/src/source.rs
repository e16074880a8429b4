//! Origin categories of events.

use serde::{Deserialize, Serialize};

use crate::ParseEventSourceError;

/// Where an event came from.
///
/// The source is the first segment of every priority configuration key and
/// is shown next to each line of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    /// A web element, before the action runs.
    WebelementBefore,
    /// A web element, after the action ran.
    WebelementAfter,
    /// A composite widget (select, table, checkbox).
    Widget,
    /// A page fragment.
    Fragment,
    /// A page object.
    Page,
    /// The browser driver, before the action runs.
    WebdriverBefore,
    /// The browser driver, after the action ran.
    WebdriverAfter,
    /// An assertion.
    Assertion,
    /// The test itself.
    Test,
}

impl EventSource {
    /// Every source, in declaration order.
    pub const ALL: [EventSource; 9] = [
        EventSource::WebelementBefore,
        EventSource::WebelementAfter,
        EventSource::Widget,
        EventSource::Fragment,
        EventSource::Page,
        EventSource::WebdriverBefore,
        EventSource::WebdriverAfter,
        EventSource::Assertion,
        EventSource::Test,
    ];

    /// Returns the canonical string label for this source.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebelementBefore => "WEBELEMENT_BEFORE",
            Self::WebelementAfter => "WEBELEMENT_AFTER",
            Self::Widget => "WIDGET",
            Self::Fragment => "FRAGMENT",
            Self::Page => "PAGE",
            Self::WebdriverBefore => "WEBDRIVER_BEFORE",
            Self::WebdriverAfter => "WEBDRIVER_AFTER",
            Self::Assertion => "ASSERTION",
            Self::Test => "TEST",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventSource {
    type Err = ParseEventSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| ParseEventSourceError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for source in EventSource::ALL {
            assert_eq!(source.as_str().parse::<EventSource>().ok(), Some(source));
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "BROWSER".parse::<EventSource>().unwrap_err();
        assert_eq!(err.0, "BROWSER");
    }
}
