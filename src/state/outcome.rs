/// Outcome definitions for candidates processed during a crawl cycle
///
/// Each candidate ends a cycle in exactly one of these states. Whether the
/// URL is written to the ledger depends only on the outcome.
use std::fmt;

/// Why an extraction produced no archivable article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbsentReason {
    /// The content container never appeared (video page, empty shell)
    NoContent,

    /// At most one content paragraph: a short notice
    Brief,

    /// The extracted body was empty or whitespace only
    Empty,
}

impl AbsentReason {
    /// Returns true if the raw document should be kept for diagnosis
    ///
    /// Brief notices are an expected page shape, so they are not captured.
    pub fn wants_capture(&self) -> bool {
        matches!(self, Self::NoContent | Self::Empty)
    }

    /// Label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoContent => "no-content",
            Self::Brief => "brief",
            Self::Empty => "empty",
        }
    }

    /// Failure class encoded in debug capture file names
    pub fn capture_class(&self) -> &'static str {
        match self {
            Self::NoContent => "NoContent",
            Self::Brief => "Brief",
            Self::Empty => "Empty",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::NoContent, Self::Brief, Self::Empty]
    }
}

impl fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one candidate within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateOutcome {
    /// Already present in the ledger; nothing was fetched
    AlreadySeen,

    /// Article text was appended to the archive
    Archived,

    /// Not a full article; intentionally not archived
    Skipped(AbsentReason),

    /// The fetch failed terminally (non-retryable status or retries exhausted)
    FetchFailed,

    /// Unexpected failure while extracting (e.g. a browser command failed)
    Failed,
}

impl CandidateOutcome {
    /// Returns true if this outcome must be recorded in the ledger
    ///
    /// Content-shape decisions are permanent, external failures are not:
    /// a fetch failure or an internal error leaves the URL retryable on a
    /// later cycle.
    pub fn marks_seen(&self) -> bool {
        matches!(self, Self::Archived | Self::Skipped(_))
    }

    /// Returns true if this represents a failure
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FetchFailed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadySeen => "already_seen",
            Self::Archived => "archived",
            Self::Skipped(AbsentReason::NoContent) => "skipped_no_content",
            Self::Skipped(AbsentReason::Brief) => "skipped_brief",
            Self::Skipped(AbsentReason::Empty) => "skipped_empty",
            Self::FetchFailed => "fetch_failed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CandidateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
