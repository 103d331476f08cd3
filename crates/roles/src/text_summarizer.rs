//! Text summarizer: first-sentence preview plus word count.

use async_trait::async_trait;
use clipflow_core::{Category, ContentItem, Handler, HandlerError, Params, Role, RoleOutput};
use serde_json::json;

use crate::params;

pub const NAME: &str = "text_summarizer";
pub const DEFAULT_MAX_CHARS: usize = 80;
const ELLIPSIS: &str = "...";

pub struct TextSummarizer;

pub fn role() -> Role {
    Role::new(NAME, [Category::Text], TextSummarizer)
        .with_description("First-sentence preview and word count of plain text")
}

#[async_trait]
impl Handler for TextSummarizer {
    async fn handle(&self, item: &ContentItem, params: &Params) -> Result<RoleOutput, HandlerError> {
        let max_chars = params::optional_usize(params, "max_chars")?.unwrap_or(DEFAULT_MAX_CHARS);
        if max_chars == 0 {
            return Err(HandlerError::new("parameter 'max_chars' must be at least 1"));
        }

        let sentence = first_sentence(&item.text);
        let (preview, truncated) = truncate(sentence, max_chars);
        Ok(RoleOutput::structured(json!({
            "preview": preview,
            "truncated": truncated,
            "words": item.text.split_whitespace().count(),
        })))
    }
}

fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '\n' {
            return text[..idx].trim_end();
        }
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|(_, next)| next.is_whitespace())
        {
            return &text[..idx + c.len_utf8()];
        }
    }
    text
}

fn truncate(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let cut: String = text.chars().take(max_chars).collect();
    (format!("{}{ELLIPSIS}", cut.trim_end()), true)
}
