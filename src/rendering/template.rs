use crate::domain::{Page, PageVersion};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, Value, context};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A template region whose output is produced by code instead of template markup.
///
/// Regions are exposed to templates as zero-argument functions, so a region named
/// `page_contents` is placed with `{{ page_contents() }}`. The handler writes into
/// the sink it is given; what it writes is inserted unescaped.
pub trait RegionHandler: Send + Sync {
    fn render(&self, out: &mut String, version: &PageVersion) -> fmt::Result;
}

// what templates can read as `page.*`
#[derive(Serialize)]
struct PageContext<'a> {
    label: &'a str,
    title: &'a str,
    description: Option<&'a str>,
    hash: &'a str,
    updated_at: String,
}

#[derive(Clone, Default)]
pub struct TemplateRenderer {
    regions: Vec<(&'static str, Arc<dyn RegionHandler>)>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, name: &'static str, handler: impl RegionHandler + 'static) -> Self {
        self.regions.push((name, Arc::new(handler)));
        self
    }

    /// Expands `source` with `version` bound as the rendering context.
    ///
    /// Every registered region must be placed exactly once in the template.
    /// The environment is built per call, so nothing is shared between renders.
    pub fn expand(
        &self,
        template_name: &str,
        source: &str,
        page: &Page,
        version: &PageVersion,
    ) -> Result<String, Error> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        // page templates are HTML whatever their file name says
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let bound_version = Arc::new(version.clone());
        let mut placements = Vec::with_capacity(self.regions.len());

        for (name, handler) in &self.regions {
            let region = *name;
            let handler = Arc::clone(handler);
            let version = Arc::clone(&bound_version);
            let placed = Arc::new(AtomicUsize::new(0));
            placements.push((region, Arc::clone(&placed)));

            env.add_function(region, move || -> Result<Value, Error> {
                placed.fetch_add(1, Ordering::SeqCst);

                let mut out = String::new();
                handler.render(&mut out, &version).map_err(|_| {
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("region '{}' failed to render", region),
                    )
                })?;

                Ok(Value::from_safe_string(out))
            });
        }

        let template = env.template_from_named_str(template_name, source)?;

        let html = template.render(context! {
            page => PageContext {
                label: &page.label,
                title: &version.title,
                description: version.description.as_deref(),
                hash: version.hash.as_str(),
                updated_at: version.updated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            },
        })?;

        for (region, placed) in placements {
            let count = placed.load(Ordering::SeqCst);
            if count != 1 {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!(
                        "template '{}' must place region '{}' exactly once, found {}",
                        template_name, region, count
                    ),
                ));
            }
        }

        Ok(html)
    }
}
