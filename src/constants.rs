//! Centralized constants for the weft runtime
//!
//! This module contains commonly used literals to:
//! - Reduce string duplication
//! - Improve maintainability
//! - Ensure consistency across the codebase

// HTTP request headers added for conditional revalidation
pub const HEADER_IF_NONE_MATCH: &str = "if-none-match";
pub const HEADER_IF_MODIFIED_SINCE: &str = "if-modified-since";

// HTTP response headers consulted by the fetcher
pub const HEADER_ETAG: &str = "etag";
pub const HEADER_LAST_MODIFIED: &str = "last-modified";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_CONTENT_LENGTH: &str = "content-length";
pub const HEADER_LINK: &str = "link";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

// Content types
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Statuses accepted by the fetcher without retry
pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_MODIFIED: u16 = 304;

/// Statuses worth retrying with backoff: request timeout, rate limiting,
/// and transient server/gateway failures.
pub const RETRIABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Suffix appended to a data key to form its validator-sidecar key.
pub const VALIDATORS_KEY_SUFFIX: &str = "::headers";

/// `Link` header fragment indicating a further page exists.
pub const LINK_REL_NEXT: &str = "rel=\"next\"";

/// Top-level body keys whose presence hints at pagination.
pub const PAGINATION_HINT_KEYS: [&str; 4] = ["next", "next_page", "pagination", "links"];

/// Field-name prefix used to tag output rows with the prerequisite value
/// that drove the request (`argument-<arg name>`).
pub const PREPEND_FIELD_PREFIX: &str = "argument-";

/// Dataset key used when an output selector addresses the response root.
pub const ROOT_DATASET_KEY: &str = ".";

// Environment variables
pub const ENV_WEFT_LOG: &str = "WEFT_LOG";
pub const ENV_WEFT_LOG_FORMAT: &str = "WEFT_LOG_FORMAT";

/// Checks whether a status code is in the retriable set.
#[must_use]
pub fn is_retriable_status(status: u16) -> bool {
    RETRIABLE_STATUSES.contains(&status)
}

/// Checks whether a status code is in the success set (`200`, `304`).
#[must_use]
pub const fn is_success_status(status: u16) -> bool {
    matches!(status, STATUS_OK | STATUS_NOT_MODIFIED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_set_is_exactly_200_and_304() {
        assert!(is_success_status(200));
        assert!(is_success_status(304));
        assert!(!is_success_status(201));
        assert!(!is_success_status(301));
    }

    #[test]
    fn retriable_set_matches_contract() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_retriable_status(status), "{status} should be retriable");
        }
        assert!(!is_retriable_status(501));
        assert!(!is_retriable_status(404));
        assert!(!is_retriable_status(200));
    }
}
