use crate::domain::{PageContent, PageVersion};
use crate::rendering::RegionHandler;
use html_escape::encode_double_quoted_attribute;
use std::collections::HashSet;
use std::fmt::{self, Write};

pub const CONTENTS_REGION: &str = "page_contents";

/// Renders a version's blocks in stored order, followed by one async script tag
/// per distinct asset.
pub struct PageContentsRegion;

impl RegionHandler for PageContentsRegion {
    fn render(&self, out: &mut String, version: &PageVersion) -> fmt::Result {
        write_contents(out, &version.contents)
    }
}

pub fn write_contents<W: Write>(out: &mut W, contents: &[PageContent]) -> fmt::Result {
    out.write_str("<div id=\"page-contents\">\n")?;

    for content in contents {
        writeln!(
            out,
            "<div id=\"{}\" class=\"page-content\">\n{}\n</div>",
            content.id, content.markup
        )?;
    }

    out.write_str("</div>\n")?;

    for asset in unique_assets(contents) {
        writeln!(
            out,
            "<script src=\"{}\" async></script>",
            encode_double_quoted_attribute(asset)
        )?;
    }

    Ok(())
}

/// Distinct asset URLs across all blocks, in order of first appearance.
pub fn unique_assets(contents: &[PageContent]) -> Vec<&str> {
    let mut seen = HashSet::new();
    contents
        .iter()
        .flat_map(|content| content.assets.iter())
        .map(String::as_str)
        .filter(|asset| seen.insert(*asset))
        .collect()
}
