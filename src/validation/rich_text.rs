//! Tag and attribute whitelist for HTML-bearing fields.

use std::sync::LazyLock;

use regex::Regex;

const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "del", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "i", "img", "ins", "li", "ol", "p", "pre", "s", "span", "strike", "strong", "sub", "sup",
    "table", "tbody", "td", "th", "thead", "tr", "u", "ul",
];

/// Tags removed together with everything up to their closing tag.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "applet", "embed", "frame", "frameset", "iframe", "math", "noscript", "object", "script",
    "style", "svg", "template", "xml",
];

const ALLOWED_ATTRS: &[&str] = &["alt", "colspan", "href", "rowspan", "src", "title"];

const URL_ATTRS: &[&str] = &["href", "src"];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)((?:[\s/][^<>]*)?)>").expect("valid regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});

/// Strip everything from `html` that is not on the whitelist.
///
/// Text content of unknown tags survives, stray angle brackets are escaped
/// and comments are removed. An unterminated dropped element swallows the
/// rest of the input.
pub fn sanitize_rich_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(caps) = TAG_RE.captures_at(html, pos) {
        let Some(found) = caps.get(0) else {
            break;
        };
        push_text(&mut out, &html[pos..found.start()]);
        pos = found.end();

        let Some(name) = caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) else {
            // comment
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let raw_attrs = caps.get(3).map_or("", |m| m.as_str());

        if DROPPED_WITH_CONTENT.contains(&name.as_str()) {
            if !closing && !raw_attrs.trim_end().ends_with('/') {
                match find_closing(html, pos, &name) {
                    Some(end) => pos = end,
                    None => return out,
                }
            }
            continue;
        }

        if !ALLOWED_TAGS.contains(&name.as_str()) {
            continue;
        }

        if closing {
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
            continue;
        }

        let trimmed = raw_attrs.trim_end();
        let self_closing = trimmed.ends_with('/');
        let attrs = trimmed.strip_suffix('/').unwrap_or(trimmed);

        out.push('<');
        out.push_str(&name);
        push_attrs(&mut out, attrs);
        if self_closing {
            out.push_str(" /");
        }
        out.push('>');
    }

    push_text(&mut out, &html[pos..]);
    out
}

/// Byte offset just past `</name ...>` at or after `from`.
fn find_closing(html: &str, from: usize, name: &str) -> Option<usize> {
    let lower = html[from..].to_ascii_lowercase();
    let needle = format!("</{name}");
    let mut search = 0;

    while let Some(idx) = lower[search..].find(&needle) {
        let after = search + idx + needle.len();
        let next = lower[after..].chars().next();
        if matches!(next, Some(c) if c == '>' || c.is_whitespace()) {
            let close = lower[after..].find('>')?;
            return Some(from + after + close + 1);
        }
        search = after;
    }
    None
}

fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn push_attrs(out: &mut String, attrs: &str) {
    for caps in ATTR_RE.captures_iter(attrs) {
        let name = caps[1].to_ascii_lowercase();
        if !ALLOWED_ATTRS.contains(&name.as_str()) {
            continue;
        }
        let Some(value) = caps.get(2).or(caps.get(3)).or(caps.get(4)).map(|m| m.as_str()) else {
            continue;
        };
        if URL_ATTRS.contains(&name.as_str()) && !is_safe_url(value) {
            continue;
        }

        out.push(' ');
        out.push_str(&name);
        out.push_str("=\"");
        for c in value.chars() {
            match c {
                '"' => out.push_str("&quot;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                c => out.push(c),
            }
        }
        out.push('"');
    }
}

/// Relative URLs and the whitelisted schemes only.
fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    // encoded characters can smuggle a scheme past the check below
    if ["&#", "&colon", "&tab", "&newline"]
        .iter()
        .any(|encoded| compact.contains(encoded))
    {
        return false;
    }

    let scheme_end = compact.find(':');
    let path_start = compact.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => ALLOWED_SCHEMES.contains(&&compact[..colon]),
        (None, _) => true,
    }
}
