use std::sync::OnceLock;

use regex::Regex;

fn non_content_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<!--.*?-->")
            .expect("static regex")
    })
}

fn tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A bare `<` in running text (`x < 5`) is not a tag.
    RE.get_or_init(|| Regex::new(r"(?s)<[A-Za-z/!?][^>]*>").expect("static regex"))
}

fn entities() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("static regex"))
}

/// Reduce an HTML page to readable plain text.
///
/// Script, style and noscript bodies and comments are dropped, remaining tags become word
/// breaks, common entities are decoded and all whitespace runs collapse to a single space.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = non_content_blocks().replace_all(html, " ");
    let without_tags = tags().replace_all(&without_blocks, " ");
    let decoded = decode_entities(&without_tags);
    collapse_whitespace(&decoded)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    entities()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            decode_entity(body).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| c.to_string());
    }
    let s = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "rsquo" => "\u{2019}",
        "lsquo" => "\u{2018}",
        "rdquo" => "\u{201d}",
        "ldquo" => "\u{201c}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        _ => return None,
    };
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
<html>
<head><title>Test Page</title><style>.x{}</style></head>
<body>
<h1>Authentication Troubleshooting</h1>
<p>If you cannot sign in, check your MFA &amp; SSO settings.</p>
<script>var x=1;</script>
<!-- hidden -->
<p>Virtual Agent is available 24x7 for support.</p>
</body>
</html>
"#;

    #[test]
    fn strips_scripts_styles_and_markup() {
        let text = html_to_text(SAMPLE_HTML);
        assert_eq!(
            text,
            "Test Page Authentication Troubleshooting If you cannot sign in, check your MFA & SSO settings. Virtual Agent is available 24x7 for support."
        );
    }

    #[test]
    fn decodes_numeric_entities_and_keeps_unknown_ones() {
        assert_eq!(html_to_text("a&#39;b &#x41; &bogus;"), "a'b A &bogus;");
    }

    #[test]
    fn bare_less_than_keeps_following_text() {
        assert_eq!(
            html_to_text("<p>Use it when x < 5 and keep fairness central.</p><p>Next paragraph.</p>"),
            "Use it when x < 5 and keep fairness central. Next paragraph."
        );
        assert_eq!(html_to_text("<p>a <= b</p>"), "a <= b");
    }

    #[test]
    fn empty_page_is_empty_text() {
        assert_eq!(html_to_text("<html><script>x</script></html>"), "");
    }
}
