//! Reader component tests
//!
//! Drives the full selection-to-callback pipeline with in-memory and
//! on-disk files and records every callback in firing order.

#[cfg(test)]
mod tests {
    use crate::core::csv_input::{FileCsvInput, FileCsvInputBuilder};
    use crate::core::element::INPUT_NAME;
    use crate::core::host::{ChangeEvent, HostFile, LocalFile, MemoryFile};
    use crate::core::models::{FileInfo, ParsedRecord, ReaderError, ReaderResult, SelectionOutcome};
    use crate::parsers::csv_parser::{
        CsvParser, ParseConfig, ParseError, ParseErrorCode, ParseErrorKind, ParseMeta,
        ParseResult, ParserOptions,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Callback observed by the recorder
    #[derive(Debug, Clone)]
    enum Fired {
        Change(usize),
        Error(String),
        Loaded {
            records: Vec<ParsedRecord>,
            info: FileInfo,
            file_name: String,
        },
    }

    #[derive(Clone, Default)]
    struct Recorder {
        fired: Arc<Mutex<Vec<Fired>>>,
    }

    impl Recorder {
        fn fired(&self) -> Vec<Fired> {
            self.fired.lock().clone()
        }

        fn errors(&self) -> Vec<String> {
            self.fired()
                .into_iter()
                .filter_map(|fired| match fired {
                    Fired::Error(message) => Some(message),
                    _ => None,
                })
                .collect()
        }

        fn loaded(&self) -> Vec<(Vec<ParsedRecord>, FileInfo, String)> {
            self.fired()
                .into_iter()
                .filter_map(|fired| match fired {
                    Fired::Loaded {
                        records,
                        info,
                        file_name,
                    } => Some((records, info, file_name)),
                    _ => None,
                })
                .collect()
        }
    }

    fn build_input(
        recorder: &Recorder,
        configure: impl FnOnce(FileCsvInputBuilder) -> FileCsvInputBuilder,
    ) -> FileCsvInput {
        let on_change = recorder.clone();
        let on_error = recorder.clone();
        let on_loaded = recorder.clone();

        let builder = FileCsvInput::builder()
            .on_change(move |event: &ChangeEvent| {
                on_change.fired.lock().push(Fired::Change(event.files().len()));
            })
            .on_error(move |error: ReaderError| {
                on_error.fired.lock().push(Fired::Error(error.to_string()));
            })
            .on_file_loaded(move |records, info, file: Arc<dyn HostFile>| {
                on_loaded.fired.lock().push(Fired::Loaded {
                    records,
                    info,
                    file_name: file.name().to_string(),
                });
            });

        configure(builder).build().unwrap()
    }

    fn csv_file(name: &str, media_type: &str, contents: &'static str) -> ChangeEvent {
        let file = MemoryFile::new(name, media_type, contents).with_last_modified(1_700_000_000_000);
        ChangeEvent::single(file)
    }

    #[test]
    fn test_render_defaults() {
        let input = build_input(&Recorder::default(), |b| b.attribute("data-testid", "csvreader"));
        let element = input.render();

        assert_eq!(element.tag(), "input");
        assert_eq!(element.attribute("type"), Some("file"));
        assert_eq!(element.attribute("name"), Some(INPUT_NAME));
        assert_eq!(element.attribute("name"), Some("w-csv-reader-input"));
        assert_eq!(element.attribute("accept"), Some(".csv, text/csv"));
        assert_eq!(element.attribute("data-testid"), Some("csvreader"));
        assert_eq!(
            element.to_html(),
            r#"<input type="file" name="w-csv-reader-input" data-testid="csvreader" accept=".csv, text/csv" />"#
        );
    }

    #[test]
    fn test_render_overrides_and_escaping() {
        let input = build_input(&Recorder::default(), |b| {
            b.accept(".tsv")
                .attribute("name", "upload")
                .attribute("title", "Pick \"one\" <file>")
                .attribute("onchange", "alert(1)")
        });
        let element = input.render();

        assert_eq!(element.attribute("name"), Some("upload"));
        assert_eq!(element.attribute("accept"), Some(".tsv"));
        assert_eq!(element.attribute("onchange"), None);
        assert!(element
            .to_html()
            .contains(r#"title="Pick &quot;one&quot; &lt;file&gt;""#));
    }

    #[test]
    fn test_accept_attribute_sets_accept_types() {
        let input = build_input(&Recorder::default(), |b| b.attribute("accept", "text/csv"));
        assert_eq!(input.settings().accept, "text/csv");
        assert_eq!(input.render().attribute("accept"), Some("text/csv"));
    }

    #[test]
    fn test_input_ref_is_stable() {
        let input = build_input(&Recorder::default(), |b| b);
        let first = input.render();
        let second = input.render();

        assert_eq!(first.input_ref(), second.input_ref());
        assert_eq!(first.input_ref().id(), input.id());
        assert!(first.input_ref().is_attached());
    }

    #[test]
    fn test_hostile_attribute_names_are_dropped() {
        let input = build_input(&Recorder::default(), |b| {
            b.attribute("x\" onfocus=\"alert(1)", "v")
                .attribute("x onchange", "alert(1)")
                .attribute("data-testid", "csvreader")
        });

        assert_eq!(
            input.render().to_html(),
            r#"<input type="file" name="w-csv-reader-input" data-testid="csvreader" accept=".csv, text/csv" />"#
        );
    }

    #[test]
    fn test_invalid_settings_fail_build() {
        let options = ParserOptions {
            quote_char: '\n',
            ..Default::default()
        };
        let result = FileCsvInput::builder().parser_options(options).build();
        assert!(matches!(result, Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_empty_accept_and_unknown_encoding_build() {
        let input = FileCsvInput::builder()
            .accept("")
            .encoding("x-user-defined-bogus")
            .build()
            .unwrap();

        assert_eq!(input.render().attribute("accept"), Some(""));
    }

    #[tokio::test]
    async fn test_strict_mode_with_empty_accept_rejects_typed_files() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.accept("").strict(true));

        let outcome = input
            .process_change(csv_file("people.csv", "text/csv", "a,b\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Rejected);
        assert_eq!(
            recorder.errors(),
            vec!["[strict mode] Accept type not respected: got 'text/csv' but not in ''".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_encoding_decodes_as_utf8() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.encoding("x-user-defined-bogus"));

        let outcome = input
            .process_change(csv_file("menu.csv", "text/csv", "name\ncafé\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 2 });
        assert!(recorder.errors().is_empty());
        assert_eq!(recorder.loaded()[0].0[1], json!(["café"]));
    }

    #[tokio::test]
    async fn test_empty_selection_fires_only_change() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.strict(true));

        let outcome = input.process_change(ChangeEvent::empty()).await;

        assert_eq!(outcome, SelectionOutcome::NoFile);
        assert!(matches!(recorder.fired().as_slice(), [Fired::Change(0)]));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_plain_text() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.strict(true));

        let outcome = input
            .process_change(csv_file("notes.txt", "text/plain", "a,b\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Rejected);
        assert_eq!(
            recorder.errors(),
            vec!["[strict mode] Accept type not respected: got 'text/plain' but not in '.csv, text/csv'".to_string()]
        );
        assert!(recorder.loaded().is_empty());
        assert!(matches!(recorder.fired()[0], Fired::Change(1)));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_empty_media_type() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.strict(true));

        let outcome = input.process_change(csv_file("data", "", "a,b\n")).await;

        assert_eq!(outcome, SelectionOutcome::Rejected);
        assert_eq!(recorder.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_strict_mode_accepts_listed_type() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.strict(true));

        let outcome = input
            .process_change(csv_file("people.csv", "text/csv", "a,b\n1,2\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 2 });
        assert!(recorder.errors().is_empty());
    }

    #[tokio::test]
    async fn test_non_strict_loads_plain_text() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);

        let outcome = input
            .process_change(csv_file("notes.txt", "text/plain", "a,b\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 1 });
        let loaded = recorder.loaded();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1.media_type, "text/plain");
        assert_eq!(loaded[0].2, "notes.txt");
    }

    #[tokio::test]
    async fn test_default_parse_and_file_info() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);
        let text = "a,b\n1,2\n";

        input
            .process_change(csv_file("people.csv", "text/csv", text))
            .await;

        let loaded = recorder.loaded();
        assert_eq!(loaded.len(), 1);
        let (records, info, _) = &loaded[0];
        assert_eq!(records, &vec![json!(["a", "b"]), json!(["1", "2"])]);
        assert_eq!(
            info,
            &FileInfo {
                name: "people.csv".to_string(),
                size: text.len() as u64,
                media_type: "text/csv".to_string(),
                modified_at: 1_700_000_000_000,
            }
        );
    }

    #[tokio::test]
    async fn test_first_file_only() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);
        let files: Vec<Arc<dyn HostFile>> = vec![
            Arc::new(MemoryFile::new("first.csv", "text/csv", "x\n")),
            Arc::new(MemoryFile::new("second.csv", "text/csv", "y\n")),
        ];

        input.process_change(ChangeEvent::from_files(files)).await;

        let loaded = recorder.loaded();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].2, "first.csv");
        assert!(matches!(recorder.fired()[0], Fired::Change(2)));
    }

    #[tokio::test]
    async fn test_change_fires_before_other_callbacks() {
        let recorder = Recorder::default();
        let strict = build_input(&recorder, |b| b.strict(true));
        strict
            .process_change(csv_file("a.txt", "text/plain", "x"))
            .await;
        strict
            .process_change(csv_file("b.csv", "text/csv", "x"))
            .await;

        let fired = recorder.fired();
        assert_eq!(fired.len(), 4);
        assert!(matches!(fired[0], Fired::Change(1)));
        assert!(matches!(fired[1], Fired::Error(_)));
        assert!(matches!(fired[2], Fired::Change(1)));
        assert!(matches!(fired[3], Fired::Loaded { .. }));
    }

    #[tokio::test]
    async fn test_handle_change_runs_sync_part_before_returning() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.strict(true));

        let handle = input.handle_change(csv_file("a.txt", "text/plain", "x"));
        assert!(handle.is_none());
        assert_eq!(recorder.fired().len(), 2);

        let handle = input
            .handle_change(csv_file("b.csv", "text/csv", "a,b\n"))
            .expect("read spawned");
        assert!(matches!(recorder.fired()[2], Fired::Change(1)));
        assert_eq!(handle.await.unwrap(), SelectionOutcome::Loaded { records: 1 });
        assert_eq!(recorder.loaded().len(), 1);
    }

    #[test]
    fn test_handle_change_without_runtime_reports_error() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);

        let handle = input.handle_change(csv_file("a.csv", "text/csv", "x"));

        assert!(handle.is_none());
        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no tokio runtime"));
    }

    #[test]
    fn test_explicit_runtime_handle() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.runtime(runtime.handle().clone()));

        let handle = input
            .handle_change(csv_file("a.csv", "text/csv", "a\n"))
            .expect("read spawned");
        let outcome = runtime.block_on(handle).unwrap();

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 1 });
    }

    #[tokio::test]
    async fn test_same_file_twice_is_idempotent() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);
        let file: Arc<dyn HostFile> = Arc::new(
            MemoryFile::new("people.csv", "text/csv", "a,b\n1,2\n").with_last_modified(7),
        );

        input
            .process_change(ChangeEvent::from_files(vec![file.clone()]))
            .await;
        input
            .process_change(ChangeEvent::from_files(vec![file]))
            .await;

        let loaded = recorder.loaded();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, loaded[1].0);
        assert_eq!(loaded[0].1, loaded[1].1);
    }

    #[tokio::test]
    async fn test_parse_errors_precede_loaded() {
        let recorder = Recorder::default();
        let options = ParserOptions {
            header: true,
            ..Default::default()
        };
        let input = build_input(&recorder, |b| b.parser_options(options));

        let outcome = input
            .process_change(csv_file("people.csv", "text/csv", "name,age\nAda\nLinus,28\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 2 });
        let fired = recorder.fired();
        assert_eq!(fired.len(), 3);
        assert!(matches!(&fired[1], Fired::Error(message) if message.contains("Too few fields")));
        match &fired[2] {
            Fired::Loaded { records, .. } => {
                assert_eq!(records[0], json!({"name": "Ada"}));
                assert_eq!(records[1], json!({"name": "Linus", "age": "28"}));
            }
            other => panic!("expected loaded callback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_encoding_is_applied() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.encoding("windows-1252"));
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("name\ncafé\n");
        let file = MemoryFile::new("menu.csv", "text/csv", bytes.into_owned());

        input.process_change(ChangeEvent::single(file)).await;

        assert_eq!(recorder.loaded()[0].0[1], json!(["café"]));
    }

    /// Parser that returns no data and reports one error
    struct SilentParser;

    impl CsvParser for SilentParser {
        fn parse(&self, _text: &str, config: &ParseConfig<'_>) -> ParseResult {
            assert_eq!(config.encoding, "UTF-8");
            config.report(ParseError {
                kind: ParseErrorKind::Record,
                code: ParseErrorCode::InvalidRecord,
                message: "unreadable".to_string(),
                row: None,
            });
            ParseResult {
                data: None,
                errors: Vec::new(),
                meta: ParseMeta::default(),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_parser_data_defaults_to_empty() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.parser(Arc::new(SilentParser)));

        let outcome = input
            .process_change(csv_file("a.csv", "text/csv", "a,b\n"))
            .await;

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 0 });
        assert_eq!(recorder.errors(), vec!["Parsing error: unreadable".to_string()]);
        assert_eq!(recorder.loaded()[0].0, Vec::<ParsedRecord>::new());
    }

    /// File whose read fails
    #[derive(Debug)]
    struct BrokenFile;

    #[async_trait]
    impl HostFile for BrokenFile {
        fn name(&self) -> &str {
            "broken.csv"
        }

        fn size(&self) -> u64 {
            10
        }

        fn media_type(&self) -> &str {
            "text/csv"
        }

        fn last_modified(&self) -> i64 {
            0
        }

        async fn read_bytes(&self) -> ReaderResult<Bytes> {
            Err(ReaderError::Read {
                name: "broken.csv".to_string(),
                message: "device unplugged".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_read_failure_goes_to_error_callback() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);

        let outcome = input.process_change(ChangeEvent::single(BrokenFile)).await;

        assert_eq!(outcome, SelectionOutcome::ReadFailed);
        assert_eq!(
            recorder.errors(),
            vec!["Failed to read 'broken.csv': device unplugged".to_string()]
        );
        assert!(recorder.loaded().is_empty());
    }

    /// File whose read waits until released
    #[derive(Debug)]
    struct GatedFile {
        name: &'static str,
        contents: &'static str,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl HostFile for GatedFile {
        fn name(&self) -> &str {
            self.name
        }

        fn size(&self) -> u64 {
            self.contents.len() as u64
        }

        fn media_type(&self) -> &str {
            "text/csv"
        }

        fn last_modified(&self) -> i64 {
            0
        }

        async fn read_bytes(&self) -> ReaderResult<Bytes> {
            self.gate.notified().await;
            Ok(Bytes::from_static(self.contents.as_bytes()))
        }
    }

    fn gated(name: &'static str, contents: &'static str) -> (ChangeEvent, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let event = ChangeEvent::single(GatedFile {
            name,
            contents,
            gate: gate.clone(),
        });
        (event, gate)
    }

    #[tokio::test]
    async fn test_overlapping_reads_both_deliver_by_default() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);

        let (slow, slow_gate) = gated("slow.csv", "s\n");
        let (fast, fast_gate) = gated("fast.csv", "f\n");
        let slow_handle = input.handle_change(slow).unwrap();
        let fast_handle = input.handle_change(fast).unwrap();

        fast_gate.notify_one();
        assert_eq!(fast_handle.await.unwrap(), SelectionOutcome::Loaded { records: 1 });
        slow_gate.notify_one();
        assert_eq!(slow_handle.await.unwrap(), SelectionOutcome::Loaded { records: 1 });

        let names: Vec<String> = recorder.loaded().into_iter().map(|l| l.2).collect();
        assert_eq!(names, vec!["fast.csv".to_string(), "slow.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_latest_only_drops_stale_completion() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b.latest_only(true));

        let (slow, slow_gate) = gated("slow.csv", "s\n");
        let (fast, fast_gate) = gated("fast.csv", "f\n");
        let slow_handle = input.handle_change(slow).unwrap();
        let fast_handle = input.handle_change(fast).unwrap();

        fast_gate.notify_one();
        slow_gate.notify_one();
        let (slow_outcome, fast_outcome) = futures::future::join(slow_handle, fast_handle).await;

        assert_eq!(slow_outcome.unwrap(), SelectionOutcome::Stale);
        assert_eq!(fast_outcome.unwrap(), SelectionOutcome::Loaded { records: 1 });
        let loaded = recorder.loaded();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].2, "fast.csv");
    }

    #[tokio::test]
    async fn test_input_ref_select_drives_pipeline() {
        let recorder = Recorder::default();
        let input = build_input(&recorder, |b| b);
        let input_ref = input.render().input_ref().clone();

        let file: Arc<dyn HostFile> = Arc::new(MemoryFile::new("a.csv", "text/csv", "a\n"));
        let handle = input_ref.select(vec![file]).expect("read spawned");

        assert_eq!(handle.await.unwrap(), SelectionOutcome::Loaded { records: 1 });
        assert_eq!(recorder.loaded().len(), 1);
    }

    #[tokio::test]
    async fn test_detached_input_ref_is_inert() {
        let input = build_input(&Recorder::default(), |b| b);
        let input_ref = input.input_ref();
        drop(input);

        assert!(!input_ref.is_attached());
        let file: Arc<dyn HostFile> = Arc::new(MemoryFile::new("a.csv", "text/csv", "a\n"));
        assert!(input_ref.select(vec![file]).is_none());
    }

    #[tokio::test]
    async fn test_local_file_end_to_end() {
        let recorder = Recorder::default();
        let options = ParserOptions {
            header: true,
            dynamic_typing: true,
            ..Default::default()
        };
        let input = build_input(&recorder, |b| b.strict(true).parser_options(options));

        let mut temp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        temp.write_all("id;name\n1;Ada\n2;Grace\n".as_bytes()).unwrap();
        temp.flush().unwrap();
        let file = LocalFile::open(temp.path()).await.unwrap();

        let handle = input.handle_change(ChangeEvent::single(file)).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SelectionOutcome::Loaded { records: 2 });
        let loaded = recorder.loaded();
        assert_eq!(loaded[0].0[1], json!({"id": 2, "name": "Grace"}));
        assert_eq!(loaded[0].1.media_type, "text/csv");
        assert_eq!(loaded[0].1.size, 22);
    }
}
