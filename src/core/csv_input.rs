//! FileCsvInput component
//!
//! Bridges a file-selection control to a CSV parsing collaborator and the
//! consumer's callbacks. Every change event is handled on its own:
//!
//! 1. `on_change` sees the raw event first, whatever happens next.
//! 2. An empty selection stops here.
//! 3. The first file is snapshotted into a [`FileInfo`]; the rest are ignored.
//! 4. In strict mode the declared media type must appear in the accept string.
//! 5. The file is read and decoded asynchronously.
//! 6. The parser runs with the configured options and an error hook wired to
//!    `on_error`.
//! 7. `on_file_loaded` receives the records, the snapshot and the file.
//!
//! Overlapping selections are not cancelled. With `latest_only` set, a
//! completion that has been superseded by a newer event is dropped without
//! invoking any callback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::ReaderSettings;
use super::element::{InputElement, InputRef, INPUT_NAME};
use super::host::{ChangeEvent, HostFile};
use super::models::{FileInfo, ParsedRecord, ReaderError, ReaderResult, SelectionOutcome};
use crate::parsers::csv_parser::{CsvCrateParser, CsvParser, ParseConfig, ParseError, ParserOptions};
use crate::utils::encoding::decode_text;
use crate::utils::validation::{accepts_media_type, is_valid_attribute_name};

/// Receives validation, parse and read errors
pub type ErrorCallback = Arc<dyn Fn(ReaderError) + Send + Sync>;

/// Receives the parsed records, the file snapshot and the original file
pub type FileLoadedCallback =
    Arc<dyn Fn(Vec<ParsedRecord>, FileInfo, Arc<dyn HostFile>) + Send + Sync>;

/// Receives every raw change event before any processing
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

pub(crate) struct ReaderInner {
    id: Uuid,
    settings: ReaderSettings,
    attributes: Vec<(String, String)>,
    on_error: ErrorCallback,
    on_file_loaded: Option<FileLoadedCallback>,
    on_change: Option<ChangeCallback>,
    parser: Arc<dyn CsvParser>,
    runtime: Option<Handle>,
    generation: AtomicU64,
}

/// File input that parses the selected CSV file
///
/// Cloning is cheap and every clone drives the same control.
#[derive(Clone)]
pub struct FileCsvInput {
    inner: Arc<ReaderInner>,
}

/// Builder for [`FileCsvInput`]
#[derive(Default)]
pub struct FileCsvInputBuilder {
    settings: ReaderSettings,
    attributes: Vec<(String, String)>,
    on_error: Option<ErrorCallback>,
    on_file_loaded: Option<FileLoadedCallback>,
    on_change: Option<ChangeCallback>,
    parser: Option<Arc<dyn CsvParser>>,
    runtime: Option<Handle>,
}

impl FileCsvInputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all serializable settings at once
    pub fn settings(mut self, settings: ReaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.settings.accept = accept.into();
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.settings.encoding = encoding.into();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.settings.strict = strict;
        self
    }

    pub fn parser_options(mut self, options: ParserOptions) -> Self {
        self.settings.parser_options = options;
        self
    }

    pub fn latest_only(mut self, latest_only: bool) -> Self {
        self.settings.latest_only = latest_only;
        self
    }

    /// Presentational attribute forwarded to the rendered control
    ///
    /// `accept` updates the accepted-types setting. `onchange` and names
    /// that are not plain attribute names are dropped: the component always
    /// owns the change handler.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();

        if !is_valid_attribute_name(&name) {
            warn!("Dropping pass-through attribute with invalid name {:?}", name);
        } else if name.eq_ignore_ascii_case("accept") {
            self.settings.accept = value;
        } else if name.eq_ignore_ascii_case("onchange") {
            warn!("Ignoring pass-through 'onchange' attribute; use on_change instead");
        } else {
            match self.attributes.iter_mut().find(|(key, _)| *key == name) {
                Some((_, existing)) => *existing = value,
                None => self.attributes.push((name, value)),
            }
        }
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(ReaderError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_file_loaded<F>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<ParsedRecord>, FileInfo, Arc<dyn HostFile>) + Send + Sync + 'static,
    {
        self.on_file_loaded = Some(Arc::new(callback));
        self
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(callback));
        self
    }

    /// Use a different parsing collaborator
    pub fn parser(mut self, parser: Arc<dyn CsvParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Runtime that performs reads started by [`FileCsvInput::handle_change`]
    ///
    /// Defaults to the runtime current at the time of the event.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> ReaderResult<FileCsvInput> {
        self.settings.validate()?;

        let on_error: ErrorCallback = match self.on_error {
            Some(callback) => callback,
            None => Arc::new(|_: ReaderError| {}),
        };
        let parser: Arc<dyn CsvParser> = match self.parser {
            Some(parser) => parser,
            None => Arc::new(CsvCrateParser::new()),
        };

        let id = Uuid::new_v4();
        debug!(
            "Building CSV reader input {} (accept='{}', encoding='{}', strict={})",
            id, self.settings.accept, self.settings.encoding, self.settings.strict
        );

        Ok(FileCsvInput {
            inner: Arc::new(ReaderInner {
                id,
                settings: self.settings,
                attributes: self.attributes,
                on_error,
                on_file_loaded: self.on_file_loaded,
                on_change: self.on_change,
                parser,
                runtime: self.runtime,
                generation: AtomicU64::new(0),
            }),
        })
    }
}

/// A selection that passed validation and is waiting to be read
struct PendingRead {
    inner: Arc<ReaderInner>,
    file: Arc<dyn HostFile>,
    info: FileInfo,
    generation: u64,
}

impl FileCsvInput {
    pub fn builder() -> FileCsvInputBuilder {
        FileCsvInputBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<ReaderInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.inner.settings
    }

    pub fn input_ref(&self) -> InputRef {
        InputRef::new(self.inner.id, Arc::downgrade(&self.inner))
    }

    /// Render the control
    ///
    /// `type` and `name` come first and may be overridden by pass-through
    /// attributes; `accept` always reflects the settings.
    pub fn render(&self) -> InputElement {
        let mut element = InputElement::new(self.input_ref());
        element.set("type", "file");
        element.set("name", INPUT_NAME);
        for (name, value) in &self.inner.attributes {
            element.set(name, value);
        }
        element.set("accept", &self.inner.settings.accept);
        element
    }

    /// Handle a change event, running the read on the runtime
    ///
    /// Steps up to validation happen before this returns. `None` means no
    /// read was started.
    pub fn handle_change(&self, event: ChangeEvent) -> Option<JoinHandle<SelectionOutcome>> {
        let pending = self.begin(&event).ok()?;

        let runtime = match self.inner.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => runtime,
            None => {
                error!("No tokio runtime available to read '{}'", pending.info.name);
                (self.inner.on_error)(ReaderError::Runtime(format!(
                    "no tokio runtime available to read '{}'",
                    pending.info.name
                )));
                return None;
            }
        };

        Some(runtime.spawn(pending.complete()))
    }

    /// Handle a change event and wait for it to finish
    ///
    /// Fires the same callbacks in the same order as [`Self::handle_change`].
    pub async fn process_change(&self, event: ChangeEvent) -> SelectionOutcome {
        match self.begin(&event) {
            Ok(pending) => pending.complete().await,
            Err(outcome) => outcome,
        }
    }

    /// Synchronous part of the pipeline, up to and including validation
    fn begin(&self, event: &ChangeEvent) -> Result<PendingRead, SelectionOutcome> {
        let inner = &self.inner;

        if let Some(on_change) = &inner.on_change {
            on_change(event);
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(file) = event.first() else {
            debug!("Change event without files, nothing to read");
            return Err(SelectionOutcome::NoFile);
        };

        if event.files().len() > 1 {
            debug!(
                "Ignoring {} additional selected files",
                event.files().len() - 1
            );
        }

        let info = file.info();
        let settings = &inner.settings;

        if settings.strict && !accepts_media_type(&settings.accept, &info.media_type) {
            warn!(
                "Rejected '{}': type '{}' not in '{}'",
                info.name, info.media_type, settings.accept
            );
            (inner.on_error)(ReaderError::StrictMode {
                media_type: info.media_type.clone(),
                accept: settings.accept.clone(),
            });
            return Err(SelectionOutcome::Rejected);
        }

        Ok(PendingRead {
            inner: Arc::clone(inner),
            file: Arc::clone(file),
            info,
            generation,
        })
    }
}

impl PendingRead {
    fn is_stale(&self) -> bool {
        self.inner.settings.latest_only
            && self.inner.generation.load(Ordering::SeqCst) != self.generation
    }

    async fn complete(self) -> SelectionOutcome {
        let settings = &self.inner.settings;

        let bytes = match self.file.read_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                if self.is_stale() {
                    debug!("Dropping read failure of superseded selection '{}'", self.info.name);
                    return SelectionOutcome::Stale;
                }
                warn!("Failed to read '{}': {}", self.info.name, e);
                (self.inner.on_error)(e);
                return SelectionOutcome::ReadFailed;
            }
        };

        if self.is_stale() {
            debug!("Dropping superseded selection '{}'", self.info.name);
            return SelectionOutcome::Stale;
        }

        let decoded = decode_text(&bytes, &settings.encoding);
        let on_error = Arc::clone(&self.inner.on_error);
        let hook = move |error: ParseError| {
            debug!("Parser reported: {}", error);
            on_error(ReaderError::Parse(error));
        };
        let config = ParseConfig::new(&settings.parser_options, decoded.encoding.name(), &hook);
        let result = self.inner.parser.parse(&decoded.text, &config);

        let records = result.data.unwrap_or_default();
        let count = records.len();
        info!(
            "Loaded '{}': {} records ({} bytes, {})",
            self.info.name,
            count,
            self.info.size,
            decoded.encoding.name()
        );

        if let Some(on_file_loaded) = &self.inner.on_file_loaded {
            on_file_loaded(records, self.info.clone(), Arc::clone(&self.file));
        }

        SelectionOutcome::Loaded { records: count }
    }
}

impl fmt::Debug for FileCsvInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCsvInput")
            .field("id", &self.inner.id)
            .field("settings", &self.inner.settings)
            .field("attributes", &self.inner.attributes)
            .finish()
    }
}
