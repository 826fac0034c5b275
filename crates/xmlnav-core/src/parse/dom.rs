use super::Element;
use crate::error::{Error, Result};

pub(super) fn parse(text: &str) -> Result<Element> {
    let opts = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, opts).map_err(|err| {
        let pos = err.pos();
        Error::parse(err.to_string(), pos.row as usize, pos.col as usize)
    })?;
    Ok(convert(doc.root_element()))
}

fn qualified(node: roxmltree::Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    match namespace.and_then(|ns| node.lookup_prefix(ns)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let name = node.tag_name();
    let mut el = Element::new(qualified(node, name.namespace(), name.name()));
    let parent = node.parent_element();
    for ns in node.namespaces() {
        let prefix = ns.name().unwrap_or_default();
        if prefix == "xml" {
            continue;
        }
        let inherited = parent.and_then(|p| p.lookup_namespace_uri(ns.name()));
        if inherited != Some(ns.uri()) {
            el.namespaces.insert(prefix.to_string(), ns.uri().to_string());
        }
    }
    for attr in node.attributes() {
        el.attributes.insert(
            qualified(node, attr.namespace(), attr.name()),
            attr.value().to_string(),
        );
    }

    for child in node.children() {
        if child.is_element() {
            el.children.push(convert(child));
        } else if child.is_text() {
            let Some(chunk) = child.text() else {
                continue;
            };
            let slot = match el.children.last_mut() {
                Some(prev) => &mut prev.tail,
                None => &mut el.text,
            };
            slot.get_or_insert_with(String::new).push_str(chunk);
        }
    }
    el
}
