use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ApiNotConfigured,
    FetchFailed,
    StoreParseError,
    UpdateRejected,
    DeleteRejected,
    FilterNoMatch,
    DumpWriteFailed,
    Aborted,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ApiNotConfigured => "E1002",
            Self::FetchFailed => "E2001",
            Self::StoreParseError => "E2002",
            Self::UpdateRejected => "E3001",
            Self::DeleteRejected => "E3002",
            Self::FilterNoMatch => "E4001",
            Self::DumpWriteFailed => "E5001",
            Self::Aborted => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ApiNotConfigured => "API base URL not configured",
            Self::FetchFailed => "Failed to fetch segments",
            Self::StoreParseError => "Segment store could not be parsed",
            Self::UpdateRejected => "Segment update rejected",
            Self::DeleteRejected => "Segment delete rejected",
            Self::FilterNoMatch => "Filter matched no base segments",
            Self::DumpWriteFailed => "Diagnostic dump write failed",
            Self::Aborted => "Operation aborted",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix the YAML syntax in config.yaml and retry."),
            Self::ApiNotConfigured => {
                Some("Set api.base_url in config.yaml, export SEGCLEAN_API_URL, or pass --from-file.")
            }
            Self::FetchFailed => Some("Check network access, the base URL and the API token."),
            Self::StoreParseError => {
                Some("Every segment needs string `id` and `name` fields; inspect the source JSON.")
            }
            Self::UpdateRejected | Self::DeleteRejected => {
                Some("Re-run `segclean scan` to refresh the plan, then retry the failed items.")
            }
            Self::FilterNoMatch => Some("Filters are case-sensitive substrings of base names."),
            Self::DumpWriteFailed => Some("Check write permissions for the diagnostics directory."),
            Self::Aborted => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 10] = [
        ErrorCode::ConfigParseError,
        ErrorCode::ApiNotConfigured,
        ErrorCode::FetchFailed,
        ErrorCode::StoreParseError,
        ErrorCode::UpdateRejected,
        ErrorCode::DeleteRejected,
        ErrorCode::FilterNoMatch,
        ErrorCode::DumpWriteFailed,
        ErrorCode::Aborted,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let raw = code.code();
            assert_eq!(raw.len(), 5);
            assert!(raw.starts_with('E'));
            assert!(raw.chars().skip(1).all(|c| c.is_ascii_digit()));
            assert!(!code.message().is_empty());
        }
    }
}
