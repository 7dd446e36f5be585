use std::fmt;

/// Matchable failure modes. Everything else that can go wrong (terminfo
/// lookup, raw mode setup, PTY plumbing) is surfaced as `anyhow::Error`
/// instead, since callers never need to branch on it.
#[derive(Debug)]
pub enum TcvtError {
    /// The child process could not be exec'd. Carries the message read
    /// back from the child's error channel.
    ChildExecFailed(String),
    /// A `Columns` grid could not be constructed at the requested width.
    BadWidth(&'static str),
    /// The input parser hit a byte it has no transition for.
    ParseError(u8),
}

impl fmt::Display for TcvtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcvtError::ChildExecFailed(msg) => write!(f, "child exec failed: {msg}"),
            TcvtError::BadWidth(msg) => write!(f, "{msg}"),
            TcvtError::ParseError(byte) => write!(f, "unhandled byte 0x{byte:02x} in parser"),
        }
    }
}

impl std::error::Error for TcvtError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_width_display_matches_original_message() {
        let err = TcvtError::BadWidth("resulting column width too small");
        assert_eq!(err.to_string(), "resulting column width too small");
    }

    #[test]
    fn parse_error_formats_byte_as_hex() {
        let err = TcvtError::ParseError(0x1f);
        assert_eq!(err.to_string(), "unhandled byte 0x1f in parser");
    }
}
