//! Shared vocabulary for the webtrail event pipeline.
//!
//! Every crate in the workspace speaks in terms of the types defined here:
//! the severity scale ([`Priority`]), the origin category of an event
//! ([`EventSource`]), the closed action vocabulary ([`EventAction`]), the
//! screenshot tag ([`ScreenshotKind`]) and the run identifier ([`RunId`]).
//!
//! String forms of these types are only used at the persistence and
//! configuration boundaries; everything else works with the enums.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod action;
mod run;
mod source;

pub use action::{ActionLabelError, CustomAction, EventAction};
pub use run::RunId;
pub use source::EventSource;

/// Severity of an event.
///
/// Ranks are strictly increasing: `Debug < Documentation < Failure <
/// Exception`. No two distinct levels share a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Priority {
    /// Lowest priority, internal details.
    Debug = 10,
    /// Steps worth documenting in a report.
    Documentation = 20,
    /// An assertion failed.
    Failure = 30,
    /// An unexpected error occurred.
    Exception = 40,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Priority; 4] = [
        Priority::Debug,
        Priority::Documentation,
        Priority::Failure,
        Priority::Exception,
    ];

    /// Returns the numeric rank of this priority.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Returns `true` if this priority is at least as important as `other`.
    pub fn is_at_least(self, other: Priority) -> bool {
        self.rank() >= other.rank()
    }

    /// Returns the canonical string label for this priority.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Documentation => "DOCUMENTATION",
            Self::Failure => "FAILURE",
            Self::Exception => "EXCEPTION",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(Self::Debug),
            "DOCUMENTATION" => Ok(Self::Documentation),
            "FAILURE" => Ok(Self::Failure),
            "EXCEPTION" => Ok(Self::Exception),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown priority label.
#[derive(Debug, Clone, Error)]
#[error("unknown priority: {0}")]
pub struct ParsePriorityError(pub String);

/// Error returned when parsing an unknown event source label.
#[derive(Debug, Clone, Error)]
#[error("unknown event source: {0}")]
pub struct ParseEventSourceError(pub String);

/// Error returned when parsing an unknown screenshot type.
#[derive(Debug, Clone, Error)]
#[error("unknown screenshot type: {0}")]
pub struct ParseScreenshotKindError(pub String);

/// How a screenshot was captured.
///
/// Drivers that can render the page produce PNG bytes; drivers without a
/// renderer fall back to the raw page markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotKind {
    /// A rendered PNG image.
    Png,
    /// The page markup (HTML source).
    Html,
}

impl ScreenshotKind {
    /// Returns the persisted type tag, which doubles as the file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Html => "html",
        }
    }

    /// Returns the file extension used when writing the screenshot to disk.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for ScreenshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScreenshotKind {
    type Err = ParseScreenshotKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(Self::Png),
            "html" => Ok(Self::Html),
            _ => Err(ParseScreenshotKindError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_at_least_matches_rank_order() {
        for a in Priority::ALL {
            for b in Priority::ALL {
                assert_eq!(a.is_at_least(b), a.rank() >= b.rank(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn is_at_least_is_reflexive() {
        for p in Priority::ALL {
            assert!(p.is_at_least(p));
        }
    }

    #[test]
    fn ranks_are_strictly_increasing() {
        let ranks: Vec<u8> = Priority::ALL.iter().map(|p| p.rank()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn priority_labels_parse_back() {
        for p in Priority::ALL {
            assert_eq!(p.as_str().parse::<Priority>().ok(), Some(p));
        }
        assert!("WARN".parse::<Priority>().is_err());
    }

    #[test]
    fn screenshot_kind_tags() {
        assert_eq!(ScreenshotKind::Png.extension(), "png");
        assert_eq!("html".parse::<ScreenshotKind>().ok(), Some(ScreenshotKind::Html));
        assert!("jpeg".parse::<ScreenshotKind>().is_err());
    }
}
