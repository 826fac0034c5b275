#![forbid(unsafe_code)]

//! `xmlnav` is a headless toolkit for navigating large XML documents.
//!
//! The default build re-exports `xmlnav-core`: tree building with index-aware paths and source
//! lines, auto-close repair, validation, statistics and threshold-based splitting.
//!
//! # Features
//!
//! - `metro`: enable the depth-limited station graph and its layout (`xmlnav::metro`)

pub use xmlnav_core::*;

#[cfg(feature = "metro")]
pub mod metro {
    pub use xmlnav_metro::*;

    use xmlnav_core::{Result, XmlService};

    /// Parses `text` and returns the laid-out station graph of its first `opts.max_depth` levels.
    pub fn layout_text(
        service: &XmlService,
        text: &str,
        opts: &MetroOptions,
    ) -> Result<MetroGraph> {
        let tree = service.build_tree(text)?;
        Ok(layout_tree(&tree, opts))
    }

    /// Parses `text` and returns station positions keyed by path.
    pub fn positions_for_text(
        service: &XmlService,
        text: &str,
        opts: &MetroOptions,
    ) -> Result<LayoutResult> {
        let tree = service.build_tree(text)?;
        Ok(compute_layout_for_tree(&tree, opts))
    }

}

#[cfg(test)]
mod tests {
    #[test]
    fn core_is_reexported() {
        let tree = crate::XmlService::new().build_tree("<r><i/><i/></r>").unwrap();
        assert_eq!(tree.line_of("/r[1]/i[2]"), Some(1));
        assert_eq!(crate::auto_close_tags("<r>\n"), "<r>\n</r>\n");
    }
}
