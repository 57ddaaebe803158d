// Local HTML sanitization: visible body text only, whitespace collapsed
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::error::{LensError, Result};

pub const SANITIZED_TITLE_FALLBACK: &str = "网页快照";

/// Subtrees that never contribute visible text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "header", "footer", "nav",
];

/// Elements rendered on their own line.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "form", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre",
    "section", "table", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Strip non-content elements from raw HTML and return its visible text.
pub fn sanitize_html(html: &str, min_chars: usize) -> Result<SanitizedPage> {
    let document = Html::parse_document(html);

    let title_sel = Selector::parse("title").ok();
    let body_sel = Selector::parse("body").ok();

    let title = title_sel
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let body = body_sel
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_visible_text(body, &mut raw);
    let text = collapse_whitespace(&raw);

    if text.chars().count() < min_chars {
        return Err(LensError::Parse(
            "网页内容过少，可能是动态渲染导致。建议使用粘贴文本模式。".to_string(),
        ));
    }

    Ok(SanitizedPage { title, text })
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) || el.attr("hidden").is_some() {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Whitespace runs containing a newline become one `\n`, other runs one space; result is trimmed.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending: Option<char> = None;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending = match (pending, ch) {
                (Some('\n'), _) | (_, '\n') => Some('\n'),
                _ => Some(' '),
            };
        } else {
            if let Some(sep) = pending.take() {
                if !out.is_empty() {
                    out.push(sep);
                }
            }
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
  <head><title>  Acme   Anvils </title><style>body { color: red }</style></head>
  <body>
    <header>Site header</header>
    <nav><a href="/">Home</a><a href="/pricing">Pricing</a></nav>
    <main>
      <h1>Acme Anvils</h1>
      <p>The   heaviest anvils
         on the market.</p>
      <div hidden>Secret promo</div>
      <script>var tracking = 1;</script>
      <noscript>Enable JS</noscript>
      <svg><text>logo</text></svg>
      <iframe src="https://ads.test"></iframe>
      <ul><li>Free shipping</li><li>Lifetime warranty</li></ul>
    </main>
    <footer>Copyright</footer>
  </body>
</html>"#;

    #[test]
    fn strips_non_content_and_keeps_lines() {
        let page = sanitize_html(PAGE, 10).expect("sanitize");
        assert_eq!(page.title.as_deref(), Some("Acme Anvils"));
        assert_eq!(
            page.text,
            "Acme Anvils\nThe heaviest anvils\non the market.\nFree shipping\nLifetime warranty"
        );
        for gone in ["Site header", "Pricing", "Secret", "tracking", "Enable JS", "logo", "Copyright", "color"] {
            assert!(!page.text.contains(gone), "{} should be stripped", gone);
        }
    }

    #[test]
    fn too_short_is_parse_error() {
        let err = sanitize_html("<html><body><p>hi</p><script>x()</script></body></html>", 50).unwrap_err();
        assert!(matches!(err, LensError::Parse(_)));
        assert!(err.to_string().contains("粘贴文本"));
    }

    #[test]
    fn missing_title_is_none() {
        let page = sanitize_html("<p>enough visible text here</p>", 5).expect("sanitize");
        assert_eq!(page.title, None);
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let once = sanitize_html(PAGE, 10).expect("first").text;
        let twice = sanitize_html(&once, 10).expect("second").text;
        assert_eq!(once, twice);
    }

    #[test]
    fn collapse_rules() {
        assert_eq!(collapse_whitespace("  a \t b\n\n\n c  "), "a b\nc");
        assert_eq!(collapse_whitespace("a \n b"), "a\nb");
        assert_eq!(collapse_whitespace("\u{a0}x\u{3000}y"), "x y");
        assert_eq!(collapse_whitespace(""), "");
    }
}
