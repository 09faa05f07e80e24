use crate::error::{MigrateError, Result};

/// Convert rendered post HTML into Markdown.
pub fn html_to_markdown(html: &str) -> Result<String> {
    if html.trim().is_empty() {
        return Ok(String::new());
    }
    htmd::convert(html).map_err(|error| MigrateError::Markdown(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_and_emphasis_become_markdown() {
        let markdown =
            html_to_markdown("<p>Open <strong>data</strong> for all.</p>").expect("convert");
        assert!(markdown.contains("**data**"));
        assert!(!markdown.contains("<p>"));
    }

    #[test]
    fn links_keep_their_targets() {
        let markdown = html_to_markdown(r#"<p><a href="https://catalog.data.gov/">Catalog</a></p>"#)
            .expect("convert");
        assert!(markdown.contains("[Catalog](https://catalog.data.gov/)"));
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(html_to_markdown("  \n").expect("convert"), "");
    }
}
