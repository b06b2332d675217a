//! Request-target → upstream URL resolution.

/// Resolves the URL a request is forwarded to.
///
/// An absolute `http://` or `https://` request-target is used verbatim.
/// Anything else is joined onto `origin` with exactly one `/` between them.
///
/// # Examples
///
/// ```
/// use caching_proxy::proxy::resolve_target;
///
/// assert_eq!(
///     resolve_target("http://example.com/api", "/v1/items"),
///     "http://example.com/api/v1/items"
/// );
/// assert_eq!(
///     resolve_target("http://example.com/api", "http://other.test/x"),
///     "http://other.test/x"
/// );
/// ```
pub fn resolve_target(origin: &str, request_target: &str) -> String {
    if request_target.starts_with("http://") || request_target.starts_with("https://") {
        return request_target.to_owned();
    }
    format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        request_target.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_path_under_origin_path() {
        assert_eq!(
            resolve_target("http://example.com/api", "/v1/items"),
            "http://example.com/api/v1/items"
        );
    }

    #[test]
    fn exactly_one_separating_slash() {
        for origin in ["http://example.com", "http://example.com/", "http://example.com//"] {
            for path in ["a/b", "/a/b", "//a/b"] {
                assert_eq!(resolve_target(origin, path), "http://example.com/a/b");
            }
        }
    }

    #[test]
    fn query_string_is_kept() {
        assert_eq!(
            resolve_target("https://example.com", "/search?q=rust&page=2"),
            "https://example.com/search?q=rust&page=2"
        );
    }

    #[test]
    fn root_path() {
        assert_eq!(resolve_target("http://example.com", "/"), "http://example.com/");
        assert_eq!(resolve_target("http://example.com/api/", "/"), "http://example.com/api/");
    }

    #[test]
    fn absolute_targets_pass_through() {
        assert_eq!(
            resolve_target("http://example.com", "http://other.test/x"),
            "http://other.test/x"
        );
        assert_eq!(
            resolve_target("http://example.com", "https://other.test/x?y=1"),
            "https://other.test/x?y=1"
        );
    }

    #[test]
    fn trailing_slash_and_case_are_preserved() {
        assert_eq!(
            resolve_target("http://example.com", "/Items/"),
            "http://example.com/Items/"
        );
    }
}
