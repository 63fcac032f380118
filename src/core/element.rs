//! Rendered file-selection control

use std::fmt;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::csv_input::{FileCsvInput, ReaderInner};
use super::host::{ChangeEvent, HostFile};
use super::models::SelectionOutcome;

/// Tag name of the rendered control
pub const INPUT_TAG: &str = "input";

/// Name attribute given to the control unless overridden
pub const INPUT_NAME: &str = "w-csv-reader-input";

/// A rendered `<input type="file">`
///
/// Attributes keep insertion order; setting an existing attribute replaces
/// its value in place.
#[derive(Debug, Clone)]
pub struct InputElement {
    attributes: Vec<(String, String)>,
    input_ref: InputRef,
}

impl InputElement {
    pub(crate) fn new(input_ref: InputRef) -> Self {
        Self {
            attributes: Vec::new(),
            input_ref,
        }
    }

    pub(crate) fn set(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        INPUT_TAG
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Reference to the control, stable across renders
    pub fn input_ref(&self) -> &InputRef {
        &self.input_ref
    }

    /// Serialize as an HTML void element
    pub fn to_html(&self) -> String {
        let mut html = format!("<{INPUT_TAG}");
        for (name, value) in &self.attributes {
            html.push(' ');
            html.push_str(name);
            html.push_str("=\"");
            html.push_str(&escape_attribute(value));
            html.push('"');
        }
        html.push_str(" />");
        html
    }
}

impl fmt::Display for InputElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Handle through which external code reaches the control
///
/// Holds the component weakly: once every [`FileCsvInput`] clone is gone the
/// reference stays valid but does nothing.
#[derive(Clone)]
pub struct InputRef {
    id: Uuid,
    target: Weak<ReaderInner>,
}

impl InputRef {
    pub(crate) fn new(id: Uuid, target: Weak<ReaderInner>) -> Self {
        Self { id, target }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the owning component is still alive
    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Programmatically select files, as if the user had picked them
    pub fn select(&self, files: Vec<Arc<dyn HostFile>>) -> Option<JoinHandle<SelectionOutcome>> {
        let inner = self.target.upgrade()?;
        FileCsvInput::from_inner(inner).handle_change(ChangeEvent::from_files(files))
    }
}

impl fmt::Debug for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRef")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl PartialEq for InputRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InputRef {}
