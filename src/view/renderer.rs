use super::dictionary::{ErrorAnnotation, ViewDictionary};
use crate::error::{Result, UiError};
use minijinja::{path_loader, Environment, ErrorKind, Template, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use tracing::{debug, error};

pub const HEADER: &str = "HEADER";
pub const PAGE_HEADER: &str = "PAGE_HEADER";
pub const PAGE_FOOTER: &str = "PAGE_FOOTER";
pub const ERR: &str = "ERR";

/// Page templates compiled into the binary, keyed by template id.
const EMBEDDED: &[(&str, &str)] = &[
    ("header", include_str!("../../templates/header.html")),
    ("page_header", include_str!("../../templates/page_header.html")),
    ("page_footer", include_str!("../../templates/page_footer.html")),
    ("main", include_str!("../../templates/main.html")),
    ("jobs_list", include_str!("../../templates/jobs_list.html")),
    ("job_status", include_str!("../../templates/job_status.html")),
    ("job_dtg", include_str!("../../templates/job_dtg.html")),
    ("resources_list", include_str!("../../templates/resources_list.html")),
    ("resource_status", include_str!("../../templates/resource_status.html")),
    ("reference_view", include_str!("../../templates/reference_view.html")),
    ("task_status", include_str!("../../templates/task_status.html")),
];

/// Expands [`ViewDictionary`] documents against named templates.
///
/// Template id `x` resolves to `x.html`, either from the embedded set or from
/// a directory given at construction. The `.html` suffix turns on
/// auto-escaping, so scalar values are always escaped; expanded includes are
/// inserted verbatim.
pub struct ViewRenderer {
    env: Environment<'static>,
}

impl std::fmt::Debug for ViewRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRenderer").finish_non_exhaustive()
    }
}

impl ViewRenderer {
    /// Renderer over the templates compiled into the crate.
    pub fn embedded() -> Result<Self> {
        let mut env = Environment::new();
        for (id, source) in EMBEDDED {
            env.add_template_owned(file_name(id), *source)
                .map_err(|source| UiError::Template {
                    template: (*id).to_string(),
                    source,
                })?;
        }
        Ok(Self { env })
    }

    /// Renderer that loads `<id>.html` from `dir` on first use.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(UiError::Config(format!(
                "template directory {} does not exist",
                dir.display()
            )));
        }
        let mut env = Environment::new();
        env.set_loader(path_loader(dir));
        debug!(dir = %dir.display(), "Loading templates from directory");
        Ok(Self { env })
    }

    /// Embedded templates unless `dir` is given.
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::embedded(),
        }
    }

    pub fn new_document(name: &str) -> ViewDictionary {
        ViewDictionary::new(name)
    }

    /// Attach the HTML header and the page header carrying `subject`. An
    /// error annotation, if any, is nested under the page header.
    pub fn add_header(doc: &mut ViewDictionary, subject: impl Display, err: Option<&ErrorAnnotation>) {
        doc.add_include(HEADER, "header");
        let page_header = doc.add_include(PAGE_HEADER, "page_header");
        page_header.set_value("RESOURCE_ID", subject);
        if let Some(err) = err {
            let row = page_header.add_section_row(ERR);
            row.set_value("ERR_TITLE", &err.title);
            row.set_value("ERR_TEXT", &err.detail);
        }
    }

    /// Attach the shared page footer.
    pub fn add_footer(doc: &mut ViewDictionary) {
        doc.add_include(PAGE_FOOTER, "page_footer");
    }

    /// Append an empty row to `section` and return it for filling in.
    pub fn add_row<'a>(doc: &'a mut ViewDictionary, section: &str) -> &'a mut ViewDictionary {
        doc.add_section_row(section)
    }

    /// Expand `doc` against `template_id`.
    ///
    /// # Errors
    ///
    /// [`UiError::UnknownTemplate`] if the id (or any include's id) does not
    /// resolve, [`UiError::TemplateMismatch`] if `doc` was built for another
    /// template, [`UiError::Template`] if expansion itself fails.
    pub fn expand(&self, doc: &ViewDictionary, template_id: &str) -> Result<Vec<u8>> {
        let template = self.template(template_id)?;
        if doc.name() != template_id {
            error!(
                document = %doc.name(),
                template = %template_id,
                "Document does not match template"
            );
            return Err(UiError::TemplateMismatch {
                document: doc.name().to_string(),
                template: template_id.to_string(),
            });
        }
        self.render(doc, template_id, &template).map(String::into_bytes)
    }

    fn expand_to_string(&self, doc: &ViewDictionary, template_id: &str) -> Result<String> {
        let template = self.template(template_id)?;
        self.render(doc, template_id, &template)
    }

    fn template(&self, template_id: &str) -> Result<Template<'_, '_>> {
        self.env.get_template(&file_name(template_id)).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                error!(template = %template_id, "Unknown template");
                UiError::UnknownTemplate(template_id.to_string())
            } else {
                UiError::Template {
                    template: template_id.to_string(),
                    source: e,
                }
            }
        })
    }

    fn render(
        &self,
        doc: &ViewDictionary,
        template_id: &str,
        template: &Template<'_, '_>,
    ) -> Result<String> {
        let ctx = self.context(doc)?;
        template.render(ctx).map_err(|source| {
            error!(template = %template_id, error = %source, "Template expansion failed");
            UiError::Template {
                template: template_id.to_string(),
                source,
            }
        })
    }

    fn context(&self, doc: &ViewDictionary) -> Result<Value> {
        let mut ctx: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in doc.scalars() {
            ctx.insert(key.clone(), Value::from(value.as_str()));
        }
        for (key, sub) in doc.includes() {
            let template = sub
                .template()
                .ok_or_else(|| UiError::UnknownTemplate(format!("<include {key}>")))?;
            let html = self.expand_to_string(sub, template)?;
            ctx.insert(key.clone(), Value::from_safe_string(html));
        }
        for (key, rows) in doc.sections() {
            let rows = rows
                .iter()
                .map(|row| self.context(row))
                .collect::<Result<Vec<_>>>()?;
            ctx.insert(key.clone(), Value::from(rows));
        }
        Ok(Value::from(ctx))
    }
}

fn file_name(template_id: &str) -> String {
    format!("{template_id}.html")
}
