use super::Element;

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(ch),
        }
    }
    out
}

fn write_open(el: &Element, self_closing: bool, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (prefix, uri) in &el.namespaces {
        out.push_str(if prefix.is_empty() { " xmlns" } else { " xmlns:" });
        out.push_str(prefix);
        out.push_str("=\"");
        out.push_str(&escape_attr(uri));
        out.push('"');
    }
    for (k, v) in &el.attributes {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_attr(v));
        out.push('"');
    }
    out.push_str(if self_closing { " />" } else { ">" });
}

/// Writes the subtree exactly as parsed: text and tails are kept verbatim.
pub(super) fn write_compact(el: &Element, out: &mut String) {
    let text = el.text.as_deref().unwrap_or("");
    if text.is_empty() && el.children.is_empty() {
        write_open(el, true, out);
    } else {
        write_open(el, false, out);
        out.push_str(&escape_text(text));
        for child in &el.children {
            write_compact(child, out);
            if let Some(tail) = &child.tail {
                out.push_str(&escape_text(tail));
            }
        }
        out.push_str("</");
        out.push_str(&el.tag);
        out.push('>');
    }
}

/// Writes the subtree one element per line; text and tails are trimmed and
/// whitespace-only runs are dropped.
pub(super) fn write_pretty(el: &Element, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    let text = el.trimmed_text();
    out.push_str(&indent);
    if el.children.is_empty() {
        if text.is_empty() {
            write_open(el, true, out);
        } else {
            write_open(el, false, out);
            out.push_str(&escape_text(text));
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
        out.push('\n');
        return;
    }

    write_open(el, false, out);
    out.push('\n');
    if !text.is_empty() {
        out.push_str(&indent);
        out.push_str("  ");
        out.push_str(&escape_text(text));
        out.push('\n');
    }
    for child in &el.children {
        write_pretty(child, level + 1, out);
        if let Some(tail) = child.tail.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            out.push_str(&indent);
            out.push_str("  ");
            out.push_str(&escape_text(tail));
            out.push('\n');
        }
    }
    out.push_str(&indent);
    out.push_str("</");
    out.push_str(&el.tag);
    out.push_str(">\n");
}
