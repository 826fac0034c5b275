use super::line_index::{LineIndex, TagPos, scan_for_tag};
use super::{NodeId, TreeNode, XmlTree};
use crate::error::{Error, Result};
use crate::parse::Element;
use crate::tags::masked_lines;
use std::borrow::Cow;
use rustc_hash::FxHashMap;

/// Builds the addressable tree for `root`, attributing source lines from `raw_text`.
///
/// Elements are visited in pre-order, which is the order their opening tags appear in the text,
/// so a single forward-only cursor is enough to resolve repeated tag names to increasing lines.
pub fn build_tree(raw_text: &str, root: &Element) -> Result<XmlTree> {
    let lines = masked_lines(raw_text);
    let index = LineIndex::build(&lines);
    tracing::debug!(
        lines = lines.len(),
        tags = index.tag_count(),
        "built line index"
    );

    let mut builder = Builder {
        lines: &lines,
        index: &index,
        cursor: None,
    };
    let root_path = format!("/{}[1]", root.tag);
    let line = builder.resolve_line(&root.tag);
    let mut tree = XmlTree::new(TreeNode::new(
        &root.tag,
        root.trimmed_text(),
        root.attributes.clone(),
        root_path,
        line,
    ));
    let root_id = tree.root_id();
    builder.add_children(&mut tree, root_id, root)?;
    Ok(tree)
}

struct Builder<'a> {
    lines: &'a [Cow<'a, str>],
    index: &'a LineIndex,
    /// Position of the last resolved opening tag.
    cursor: Option<TagPos>,
}

impl Builder<'_> {
    /// 1-based line of the next `<tag` after the cursor, or 0 when none is found.
    fn resolve_line(&mut self, tag: &str) -> usize {
        let found = if self.index.contains(tag) {
            self.index.next_after(tag, self.cursor)
        } else {
            scan_for_tag(self.lines, tag, self.cursor)
        };
        match found {
            Some(pos) => {
                self.cursor = Some(pos);
                pos.line + 1
            }
            None => 0,
        }
    }

    fn add_children(
        &mut self,
        tree: &mut XmlTree,
        parent: NodeId,
        element: &Element,
    ) -> Result<()> {
        let parent_path = tree.node(parent).path.clone();
        let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
        for child in &element.children {
            if child.tag.is_empty() {
                return Err(Error::TreeBuild {
                    message: format!("element without a name under {parent_path}"),
                });
            }
            let k = seen.entry(child.tag.as_str()).or_insert(0);
            *k += 1;
            let path = format!("{parent_path}/{}[{k}]", child.tag);
            let line = self.resolve_line(&child.tag);
            let id = tree.push_child(
                parent,
                TreeNode::new(
                    &child.tag,
                    child.trimmed_text(),
                    child.attributes.clone(),
                    path,
                    line,
                ),
            );
            self.add_children(tree, id, child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn built(text: &str) -> XmlTree {
        build_tree(text, &parse(text).unwrap()).unwrap()
    }

    #[test]
    fn paths_follow_same_tag_sibling_counts() {
        let tree = built("<root><a><b>x</b></a><a><c/></a></root>");
        let paths: Vec<_> = tree.iter().map(|id| tree.node(id).path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "/root[1]",
                "/root[1]/a[1]",
                "/root[1]/a[1]/b[1]",
                "/root[1]/a[2]",
                "/root[1]/a[2]/c[1]",
            ]
        );
        let b = tree.find_by_path("/root[1]/a[1]/b[1]").unwrap();
        assert_eq!(tree.node(b).value, "x");
        assert_eq!(tree.parent(b).unwrap().path, "/root[1]/a[1]");
    }

    #[test]
    fn repeated_tags_resolve_to_increasing_lines() {
        let text = "<?xml version=\"1.0\"?>\n<root>\n  <item>\n    <item>inner</item>\n  </item>\n  <item/>\n</root>\n";
        let tree = built(text);
        let lines: Vec<_> = tree
            .iter()
            .map(|id| (tree.node(id).path.as_str(), tree.node(id).line_number))
            .collect();
        assert_eq!(
            lines,
            [
                ("/root[1]", 2),
                ("/root[1]/item[1]", 3),
                ("/root[1]/item[1]/item[1]", 4),
                ("/root[1]/item[2]", 6),
            ]
        );
    }

    #[test]
    fn commented_out_tags_do_not_claim_lines() {
        let tree = built("<r>\n<!-- <a> -->\n<a/>\n</r>");
        assert_eq!(tree.line_of("/r[1]/a[1]"), Some(3));
        let tree = built("<r>\n<!--\n<größe>\n-->\n<größe/>\n</r>");
        assert_eq!(tree.line_of("/r[1]/größe[1]"), Some(5));
    }

    #[test]
    fn same_line_children_share_the_line() {
        let tree = built("<r><x/><x/><y>t</y></r>");
        assert!(tree.iter().all(|id| tree.node(id).line_number == 1));
    }

    #[test]
    fn unicode_tag_names_use_the_sequential_scan() {
        let text = "<root>\n  <größe>1</größe>\n</root>";
        let tree = built(text);
        let id = tree.find_by_path("/root[1]/größe[1]").unwrap();
        assert_eq!(tree.node(id).line_number, 2);
    }

    #[test]
    fn whitespace_only_text_becomes_empty_value() {
        let tree = built("<r>\n   \n<a>  v  </a></r>");
        assert_eq!(tree.root().value, "");
        assert_eq!(tree.children(tree.root_id()).next().unwrap().value, "v");
    }
}
