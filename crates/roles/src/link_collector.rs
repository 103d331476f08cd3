//! Link collector: pulls `http(s)` URLs and their hosts out of text.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use clipflow_core::{Category, ContentItem, Handler, HandlerError, Params, Role, RoleOutput};
use regex_lite::Regex;
use serde_json::json;

pub const NAME: &str = "link_collector";

// Constant pattern; `url_pattern_compiles` covers it.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'()\[\]{}]+"#).expect("URL pattern is valid")
});

pub struct LinkCollector;

pub fn role() -> Role {
    Role::new(NAME, [Category::Url, Category::Text], LinkCollector)
        .with_description("URLs and distinct hosts found in text")
}

#[async_trait]
impl Handler for LinkCollector {
    async fn handle(&self, item: &ContentItem, _params: &Params) -> Result<RoleOutput, HandlerError> {
        let links = extract_links(&item.text);
        if links.is_empty() {
            return Err(HandlerError::new("no links found"));
        }
        let hosts: BTreeSet<&str> = links.iter().filter_map(|l| host_of(l)).collect();
        Ok(RoleOutput::structured(json!({
            "links": links,
            "hosts": hosts,
            "count": links.len(),
        })))
    }
}

/// Distinct URLs in order of first appearance.
fn extract_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for found in URL_PATTERN.find_iter(text) {
        let url = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if !links.iter().any(|l| l == url) {
            links.push(url.to_string());
        }
    }
    links
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_links_and_hosts() {
        let item = ContentItem::new(
            "t",
            "See https://docs.rs/tokio/latest, then (http://user@example.com:8080/a?b=1). \
             Again: https://docs.rs/tokio/latest.",
            Category::Text,
        );
        let out = LinkCollector.handle(&item, &Params::new()).await.unwrap();
        let RoleOutput::Structured(map) = out else {
            panic!("expected structured output");
        };
        assert_eq!(
            map["links"],
            json!(["https://docs.rs/tokio/latest", "http://user@example.com:8080/a?b=1"])
        );
        assert_eq!(map["hosts"], json!(["docs.rs", "example.com"]));
        assert_eq!(map["count"], 2);
    }

    #[tokio::test]
    async fn no_links_is_an_error() {
        let item = ContentItem::new("t", "nothing to see here", Category::Text);
        let err = LinkCollector.handle(&item, &Params::new()).await.unwrap_err();
        assert_eq!(err.message, "no links found");
    }

    #[test]
    fn url_pattern_compiles() {
        assert_eq!(extract_links("go to https://a.io/x, now"), vec!["https://a.io/x"]);
        assert!(extract_links("plain words").is_empty());
    }

    #[test]
    fn host_parsing() {
        assert_eq!(host_of("https://a.example.org"), Some("a.example.org"));
        assert_eq!(host_of("http://h:1/p#x"), Some("h"));
        assert_eq!(host_of("not a url"), None);
    }
}
