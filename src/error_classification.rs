//! Classification of rejection messages coming back from the host.
//!
//! The host reports every failure as a plain message. Some of those are not
//! failures from the user's point of view (closing the dialog with the window
//! control), so callers classify before deciding whether to surface them.

use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostRejection {
    /// The user dismissed the dialog. Benign cancellation.
    DialogClosedByUser,
    /// Anything else. Surfaced verbatim.
    Failure,
}

/// Classify a host rejection message.
///
/// Recognizes both forms the host emits:
/// `"Dialog closed by user."` and `"dialog-closed-by-user: Extension dialog closed by user."`.
pub fn classify_host_rejection(message: &str) -> HostRejection {
    lazy_static::lazy_static! {
        static ref CLOSED_BY_USER: Regex =
            Regex::new(r"(?i)^\s*(dialog closed by user\.?|dialog-closed-by-user\b)").unwrap();
    }
    if CLOSED_BY_USER.is_match(message) {
        HostRejection::DialogClosedByUser
    } else {
        HostRejection::Failure
    }
}
