/// Text and URL helpers shared by the parser and the registry

/// Feed text cleanup
pub mod text {
    use html_escape::decode_html_entities;

    /// Decode entities and collapse whitespace. Used for titles, which are kept verbatim otherwise.
    pub fn clean_title(raw: &str) -> String {
        collapse_whitespace(&decode_html_entities(raw))
    }

    /// Extract clean text content from HTML
    pub fn extract_text_from_html(html: &str) -> String {
        let stripped = html
            .chars()
            .fold((String::new(), false), |(mut text, in_tag), c| match c {
                '<' => (text, true),
                '>' => {
                    // keep words on either side of a tag apart
                    text.push(' ');
                    (text, false)
                }
                _ if !in_tag => {
                    text.push(c);
                    (text, in_tag)
                }
                _ => (text, in_tag),
            })
            .0;

        collapse_whitespace(&decode_html_entities(&stripped))
    }

    /// Cut to at most `max_chars` characters, marking the cut with "...".
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => format!("{}...", text[..byte_idx].trim_end()),
            None => text.to_string(),
        }
    }

    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// URL utilities for feed endpoints
pub mod url {
    use url::Url;

    /// Extract domain from URL
    pub fn extract_domain(url_str: &str) -> Option<String> {
        Url::parse(url_str).ok()?.domain().map(|d| d.to_string())
    }

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => url.scheme() == "http" || url.scheme() == "https",
            Err(_) => false,
        }
    }
}
