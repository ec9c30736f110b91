use crate::database::PageRepository;
use crate::domain::PageVersion;
use crate::error::{PageError, PageResult};
use crate::io::ResourceReader;
use crate::rendering::{CONTENTS_REGION, PageContentsRegion, TemplateRenderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

const HEAD_CLOSE: &str = "</head>";

/// Turns stored page versions into HTML.
///
/// Rendering only reads: the repository is consulted for the owning page and the
/// template source, and the version itself is never written back.
pub struct PageRenderer {
    repo: Arc<dyn PageRepository>,
    templates: Arc<dyn ResourceReader>,
    statics: Arc<dyn ResourceReader>,
    editor_stylesheet: PathBuf,
    engine: TemplateRenderer,
}

impl PageRenderer {
    pub fn new(
        repo: Arc<dyn PageRepository>,
        templates: Arc<dyn ResourceReader>,
        statics: Arc<dyn ResourceReader>,
        editor_stylesheet: PathBuf,
    ) -> Self {
        Self {
            repo,
            templates,
            statics,
            editor_stylesheet,
            engine: TemplateRenderer::new().with_region(CONTENTS_REGION, PageContentsRegion),
        }
    }

    /// Renders the published form of `version` through its page's template.
    pub async fn render_page(&self, version: &PageVersion) -> PageResult<String> {
        let page = self
            .repo
            .get_page(version.page_id)
            .await?
            .ok_or_else(|| {
                error!(version_id = %version.id, page_id = %version.page_id, "Page version has no owning page");
                PageError::Rendering {
                    version_id: version.id,
                    message: format!("owning page {} does not exist", version.page_id),
                }
            })?;

        let source = self
            .templates
            .read_to_string(Path::new(&page.template))
            .await
            .map_err(|e| {
                error!(
                    version_id = %version.id,
                    template = %page.template,
                    error = %format!("{:#}", e),
                    "Failed to load page template"
                );
                if is_unreadable(&e) {
                    PageError::Io {
                        path: page.template.clone(),
                        message: format!("{:#}", e),
                    }
                } else {
                    PageError::Rendering {
                        version_id: version.id,
                        message: format!("template '{}' cannot be located: {:#}", page.template, e),
                    }
                }
            })?;

        let html = self
            .engine
            .expand(&page.template, &source, &page, version)
            .map_err(|e| {
                error!(
                    version_id = %version.id,
                    template = %page.template,
                    error = %e,
                    "Failed to expand page template"
                );
                PageError::Rendering {
                    version_id: version.id,
                    message: e.to_string(),
                }
            })?;

        debug!(version_id = %version.id, bytes = html.len(), "Rendered page version");

        Ok(html)
    }

    /// Renders the version for the editor's embedded frame, with the editor
    /// stylesheet placed right before the closing head tag.
    pub async fn render_editable_frame(&self, version_id: Uuid) -> PageResult<String> {
        let version = self
            .repo
            .find_version_by_id(version_id)
            .await?
            .ok_or_else(|| PageError::version_not_found(version_id))?;

        let html = self.render_page(&version).await?;

        let stylesheet = self
            .statics
            .read_to_string(&self.editor_stylesheet)
            .await
            .map_err(|e| {
                error!(
                    version_id = %version.id,
                    stylesheet = %self.editor_stylesheet.display(),
                    error = %format!("{:#}", e),
                    "Failed to read editor stylesheet"
                );
                PageError::Io {
                    path: self.editor_stylesheet.display().to_string(),
                    message: format!("{:#}", e),
                }
            })?;

        inject_editor_stylesheet(&html, &stylesheet).ok_or_else(|| {
            error!(version_id = %version.id, "Rendered page has no closing head tag");
            PageError::Rendering {
                version_id: version.id,
                message: "template has no </head> to attach the editor stylesheet to".to_string(),
            }
        })
    }
}

/// Inserts a style element before the first `</head>`, matched case-insensitively.
pub fn inject_editor_stylesheet(html: &str, css: &str) -> Option<String> {
    // ascii lowercasing keeps byte offsets intact
    let at = html.to_ascii_lowercase().find(HEAD_CLOSE)?;

    let style = format!("<style type=\"text/css\">\n{}\n</style>\n", css);
    let mut injected = String::with_capacity(html.len() + style.len());
    injected.push_str(&html[..at]);
    injected.push_str(&style);
    injected.push_str(&html[at..]);

    Some(injected)
}

// a template that exists but cannot be read is an IO failure; anything else
// (missing file, path outside the templates root) means it cannot be located
fn is_unreadable(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| io.kind() != std::io::ErrorKind::NotFound)
}
