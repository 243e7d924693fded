use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::Display;

/// A (title, detail) pair shown instead of page content when the requested
/// entity does not exist. Its absence means "no error".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAnnotation {
    pub title: String,
    pub detail: String,
}

impl ErrorAnnotation {
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Hierarchical render document.
///
/// Holds named scalar values, named single sub-documents expanded against
/// their own template ("includes"), and named ordered sequences of
/// sub-documents ("sections"). A key names at most one of the three: setting
/// a key of one kind removes it from the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewDictionary {
    name: String,
    template: Option<String>,
    scalars: BTreeMap<String, String>,
    includes: BTreeMap<String, ViewDictionary>,
    sections: BTreeMap<String, Vec<ViewDictionary>>,
}

impl ViewDictionary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template an include is expanded against.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn set_value(&mut self, key: &str, value: impl Display) {
        self.includes.remove(key);
        self.sections.remove(key);
        self.scalars.insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    /// Attach (or replace) a named sub-document expanded with `template`.
    pub fn add_include(&mut self, key: &str, template: &str) -> &mut ViewDictionary {
        self.scalars.remove(key);
        self.sections.remove(key);
        let mut sub = ViewDictionary::new(key);
        sub.template = Some(template.to_string());
        match self.includes.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(sub);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(sub),
        }
    }

    pub fn include(&self, key: &str) -> Option<&ViewDictionary> {
        self.includes.get(key)
    }

    /// Append one row to the section `key` and return it for population.
    pub fn add_section_row(&mut self, key: &str) -> &mut ViewDictionary {
        self.scalars.remove(key);
        self.includes.remove(key);
        let rows = self.sections.entry(key.to_string()).or_default();
        rows.push(ViewDictionary::new(key));
        let last = rows.len() - 1;
        &mut rows[last]
    }

    /// Rows of section `key`, in insertion order; empty if absent.
    pub fn section(&self, key: &str) -> &[ViewDictionary] {
        self.sections.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn scalars(&self) -> impl Iterator<Item = (&String, &String)> {
        self.scalars.iter()
    }

    pub(crate) fn includes(&self) -> impl Iterator<Item = (&String, &ViewDictionary)> {
        self.includes.iter()
    }

    pub(crate) fn sections(&self) -> impl Iterator<Item = (&String, &Vec<ViewDictionary>)> {
        self.sections.iter()
    }
}
