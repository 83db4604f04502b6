use serde::{Deserialize, Serialize};

/// Class added to the replaced element so the host page keeps styling it
/// like the original footer.
pub const MARKER_CLASS: &str = "watermark";

/// Attribute stamped onto the replaced element once the substitution has
/// been applied.
pub const MARKER_ATTR: &str = "data-customized";

/// Which heuristic located the watermark element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorKind {
    ClassExact,
    AttrContains,
    TextPhrase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvidence {
    pub kind: LocatorKind,
    /// The selector string or phrase that matched.
    pub selector: String,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomizeOutcome {
    /// The watermark was found and rewritten this attempt.
    Applied { evidence: MatchEvidence },
    /// The element already carries the completion marker.
    AlreadyApplied,
    /// Nothing watermark-like in the document yet. Not an error, retried later.
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomizeOptions {
    /// Name shown in the copyright notice.
    pub owner: String,
    pub year: i32,
    /// Full replacement fragment. Overrides the generated notice when set.
    pub notice_html: Option<String>,
    /// Ordered selector heuristics, earliest wins. Restricted grammar:
    /// `tag.class`, `.class`, `tag[attr*="value"]`, `[attr*="value"]`.
    pub selectors: Vec<String>,
    /// Case-insensitive phrases for the text-scan fallback.
    pub phrases: Vec<String>,
    /// Fixed retry schedule, measured from initialization.
    pub retry_delays_ms: Vec<u64>,
    /// Delay between a mutation batch and the re-check it schedules.
    pub debounce_ms: u64,
    /// Delay before re-initializing after a route change.
    pub renavigate_delay_ms: u64,
}

impl Default for CustomizeOptions {
    fn default() -> Self {
        Self {
            owner: "Harry Mardika".to_string(),
            year: 2025,
            notice_html: None,
            selectors: vec![
                "a.watermark".to_string(),
                "a[href*=\"chainlit.io\"]".to_string(),
                ".watermark".to_string(),
                "[class*=\"watermark\"]".to_string(),
            ],
            phrases: vec!["built with".to_string()],
            retry_delays_ms: vec![100, 250, 500, 1000, 2000],
            debounce_ms: 50,
            renavigate_delay_ms: 200,
        }
    }
}
