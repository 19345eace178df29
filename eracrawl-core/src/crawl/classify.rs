use std::fmt;

use super::error::EngineError;

/// Substrings that signal an upstream 403/429 rate-limit block. Matching is
/// case-insensitive over the full error text.
pub const BLOCK_SIGNALS: [&str; 6] = [
    "403",
    "429",
    "forbidden",
    "too many requests",
    "rate limit",
    "rate-limit",
];

pub fn is_blocked(message: &str) -> bool {
    let lowered = message.to_lowercase();
    BLOCK_SIGNALS.iter().any(|signal| lowered.contains(signal))
}

/// First classification axis: was this a plain reachability failure, or did
/// the engine actually answer?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportClass {
    Connectivity,
    Other,
}

pub fn transport_class(error: &EngineError) -> TransportClass {
    match error {
        EngineError::Connect(_) | EngineError::Timeout(_) => TransportClass::Connectivity,
        _ => TransportClass::Other,
    }
}

/// Terminal outcome of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    SkipQuery,
    SkipEra,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Disposition::Success => "success",
            Disposition::SkipQuery => "skip_query",
            Disposition::SkipEra => "skip_era",
        };
        f.write_str(label)
    }
}

/// Two-axis severity rule for a failed invocation.
///
/// A connectivity or timeout failure is always capped at a query-level skip,
/// even when its text mentions a block signal: transient network flakiness
/// must not abort a whole era. Only a block signal arriving outside the
/// connectivity class escalates, since it means the engine itself answered
/// and flagged this client.
pub fn classify(error: &EngineError) -> Disposition {
    match (transport_class(error), is_blocked(&error.to_string())) {
        (TransportClass::Connectivity, _) => Disposition::SkipQuery,
        (TransportClass::Other, true) => Disposition::SkipEra,
        (TransportClass::Other, false) => Disposition::SkipQuery,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_signal_table_matches_known_phrases() {
        assert!(is_blocked("HTTP 403 Client Error"));
        assert!(is_blocked("Too Many Requests"));
        assert!(is_blocked("hit the rate-limit"));
        assert!(!is_blocked("connection reset by peer"));
    }

    #[test]
    fn http_block_escalates_to_era_skip() {
        let err = EngineError::Http {
            status: 429,
            url: "https://www.bing.com/images/async".to_string(),
        };
        assert_eq!(classify(&err), Disposition::SkipEra);
        let err = EngineError::Unexpected("server said: forbidden".to_string());
        assert_eq!(classify(&err), Disposition::SkipEra);
    }

    #[test]
    fn blocked_text_inside_connectivity_error_stays_query_scoped() {
        let err = EngineError::Timeout("gateway 403 while connecting".to_string());
        assert_eq!(transport_class(&err), TransportClass::Connectivity);
        assert_eq!(classify(&err), Disposition::SkipQuery);
        let err = EngineError::Connect("refused (forbidden route)".to_string());
        assert_eq!(classify(&err), Disposition::SkipQuery);
    }

    #[test]
    fn plain_failures_are_query_scoped() {
        assert_eq!(
            classify(&EngineError::Timeout("no response in 20s".to_string())),
            Disposition::SkipQuery
        );
        assert_eq!(
            classify(&EngineError::Unexpected("parse failure".to_string())),
            Disposition::SkipQuery
        );
        assert_eq!(
            classify(&EngineError::Http {
                status: 500,
                url: "https://image.baidu.com/search/acjson".to_string(),
            }),
            Disposition::SkipQuery
        );
    }
}
