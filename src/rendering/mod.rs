pub mod contents;
pub mod renderer;
pub mod template;

pub use contents::{CONTENTS_REGION, PageContentsRegion};
pub use renderer::PageRenderer;
pub use template::{RegionHandler, TemplateRenderer};
