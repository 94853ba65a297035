//! Cursor pagination for the Admin REST API.
//!
//! Every list response carries a `Link` header pointing at the neighbouring
//! pages. The cursor lives in the `page_info` query parameter:
//!
//! ```text
//! <https://demo.myshopify.com/admin/api/2024-01/orders.json?limit=250&page_info=PREV>; rel="previous",
//! <https://demo.myshopify.com/admin/api/2024-01/orders.json?limit=250&page_info=NEXT>; rel="next"
//! ```

use reqwest::Url;

/// Returns the `page_info` cursor of the `rel="next"` link, or `None` on the
/// last page (or when the header is absent or unusable).
#[must_use]
pub fn next_page_info(link_header: Option<&str>) -> Option<String> {
    link_header?
        .split(',')
        .map(str::trim)
        .find(|directive| is_next_relation(directive))
        .and_then(target_url)
        .and_then(|url| page_info_of(&url))
}

fn is_next_relation(directive: &str) -> bool {
    directive
        .split(';')
        .skip(1)
        .map(str::trim)
        .any(|param| param == r#"rel="next""# || param == "rel=next")
}

fn target_url(directive: &str) -> Option<Url> {
    let inner = directive.strip_prefix('<')?;
    let end = inner.find('>')?;
    Url::parse(&inner[..end]).ok()
}

fn page_info_of(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "page_info")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://demo.myshopify.com/admin/api/2024-01/customers.json";

    #[test]
    fn no_header_means_last_page() {
        assert!(next_page_info(None).is_none());
        assert!(next_page_info(Some("")).is_none());
    }

    #[test]
    fn single_next_link() {
        let header = format!(r#"<{BASE}?limit=250&page_info=eyJsYXN0X2lkIjo2fQ>; rel="next""#);
        assert_eq!(
            next_page_info(Some(&header)).as_deref(),
            Some("eyJsYXN0X2lkIjo2fQ")
        );
    }

    #[test]
    fn previous_and_next_links() {
        let header = format!(
            r#"<{BASE}?limit=250&page_info=PREV>; rel="previous", <{BASE}?limit=250&page_info=NEXT>; rel="next""#
        );
        assert_eq!(next_page_info(Some(&header)).as_deref(), Some("NEXT"));
    }

    #[test]
    fn only_previous_link_means_last_page() {
        let header = format!(r#"<{BASE}?limit=250&page_info=PREV>; rel="previous""#);
        assert!(next_page_info(Some(&header)).is_none());
    }

    #[test]
    fn next_link_without_cursor_is_ignored() {
        let header = format!(r#"<{BASE}?limit=250>; rel="next""#);
        assert!(next_page_info(Some(&header)).is_none());
    }

    #[test]
    fn cursor_is_percent_decoded() {
        let header = format!(r#"<{BASE}?page_info=abc%3D%3D&limit=50>; rel="next""#);
        assert_eq!(next_page_info(Some(&header)).as_deref(), Some("abc=="));
    }

    #[test]
    fn malformed_directive_is_ignored() {
        assert!(next_page_info(Some(r#"not-a-url; rel="next""#)).is_none());
    }
}
