//! Turning scanner output into files in the private document area.

use crate::data::document::{DocumentFormat, DocumentKind, ScannedDocument};
use async_trait::async_trait;
use snafu::{OptionExt, ResultExt, Snafu};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, process::Command};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ScanError {
    #[snafu(display("Dokumen harus berupa PDF atau JPEG"))]
    UnsupportedFormat,
    #[snafu(display("Dokumen kosong"))]
    EmptyDocument,
    #[snafu(display("Unable to write scanned document to {:?}", path))]
    WriteDocument {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Unable to read scanner output {:?}", path))]
    ReadScannerOutput {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Unable to launch scanner {:?}", program))]
    LaunchScanner {
        source: std::io::Error,
        program: PathBuf,
    },
    #[snafu(display("Scanner exited with {}", status))]
    ScannerFailed { status: std::process::ExitStatus },
    #[snafu(display(
        "Tidak ada pemindai yang dikonfigurasi, silakan impor file PDF/JPEG dari galeri"
    ))]
    NoScannerConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Captured(ScannedDocument),
    Cancelled,
    Failed(String),
}

impl From<ScanError> for ScanOutcome {
    fn from(e: ScanError) -> Self {
        warn!(?e, "Scan failed");
        Self::Failed(e.to_string())
    }
}

impl From<Result<ScannedDocument, ScanError>> for ScanOutcome {
    fn from(value: Result<ScannedDocument, ScanError>) -> Self {
        match value {
            Ok(doc) => Self::Captured(doc),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
pub trait ScanCapture: Send + Sync {
    async fn capture(&self, kind: DocumentKind) -> ScanOutcome;
}

/// The application's private document area. Files land here fully written before anyone gets a
/// [`ScannedDocument`] pointing at them, and are never removed by us.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn persist(
        &self,
        kind: DocumentKind,
        bytes: &[u8],
    ) -> Result<ScannedDocument, ScanError> {
        snafu::ensure!(!bytes.is_empty(), EmptyDocumentSnafu);
        let format = DocumentFormat::sniff(bytes).context(UnsupportedFormatSnafu)?;

        let stem = kind.file_stem();
        let mut millis = jiff::Timestamp::now().as_millisecond();

        //two scans in the same millisecond shouldn't clobber each other
        let (path, mut file) = loop {
            let path = self
                .root
                .join(format!("{stem}_{millis}.{}", format.extension()));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
                Err(source) => return Err(ScanError::WriteDocument { source, path }),
            }
        };

        file.write_all(bytes)
            .await
            .context(WriteDocumentSnafu { path: path.clone() })?;
        file.sync_all()
            .await
            .context(WriteDocumentSnafu { path: path.clone() })?;

        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(?path, ?kind, size = bytes.len(), "Stored scanned document");

        Ok(ScannedDocument {
            local_path: path,
            display_name,
            size_bytes: bytes.len() as u64,
            format,
        })
    }

    ///byte-for-byte copy of something the scanner left lying around
    pub async fn copy_from(
        &self,
        kind: DocumentKind,
        source: &Path,
    ) -> Result<ScannedDocument, ScanError> {
        let bytes = tokio::fs::read(source)
            .await
            .context(ReadScannerOutputSnafu { path: source })?;
        self.persist(kind, &bytes).await
    }
}

/// Drives an external scanning program.
///
/// The program gets the slot label and an output path as arguments, and the scanner options as
/// environment variables. Exit 0 with something written is a capture, exit 0 with nothing written
/// (or exit 130, ie. interrupted) is the operator backing out, anything else is a failure.
#[derive(Debug, Clone)]
pub struct CommandScanner {
    program: PathBuf,
    store: DocumentStore,
}

impl CommandScanner {
    pub const CANCELLED_EXIT_CODE: i32 = 130;
    pub const PAGE_LIMIT: u32 = 100;

    pub fn new(program: impl Into<PathBuf>, store: DocumentStore) -> Self {
        Self {
            program: program.into(),
            store,
        }
    }

    fn scratch_path(&self, kind: DocumentKind) -> PathBuf {
        std::env::temp_dir().join(format!(
            "induk_{}_{}_{}.partial",
            std::process::id(),
            kind.file_stem(),
            jiff::Timestamp::now().as_millisecond()
        ))
    }

    async fn run(&self, kind: DocumentKind, scratch: &Path) -> Result<ScanOutcome, ScanError> {
        let status = Command::new(&self.program)
            .arg(kind.slot_label())
            .arg(scratch)
            .env("INDUK_SCANNER_MODE", "full")
            .env("INDUK_GALLERY_IMPORT", "1")
            .env("INDUK_PAGE_LIMIT", Self::PAGE_LIMIT.to_string())
            .env("INDUK_RESULT_FORMATS", "jpeg,pdf")
            .stdin(Stdio::null())
            .status()
            .await
            .context(LaunchScannerSnafu {
                program: self.program.clone(),
            })?;

        if status.code() == Some(Self::CANCELLED_EXIT_CODE) {
            return Ok(ScanOutcome::Cancelled);
        }
        snafu::ensure!(status.success(), ScannerFailedSnafu { status });

        match tokio::fs::metadata(scratch).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => return Ok(ScanOutcome::Cancelled),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ScanOutcome::Cancelled),
            Err(source) => {
                return Err(ScanError::ReadScannerOutput {
                    source,
                    path: scratch.to_path_buf(),
                });
            }
        }

        self.store
            .copy_from(kind, scratch)
            .await
            .map(ScanOutcome::Captured)
    }
}

#[async_trait]
impl ScanCapture for CommandScanner {
    async fn capture(&self, kind: DocumentKind) -> ScanOutcome {
        let scratch = self.scratch_path(kind);
        debug!(program = ?self.program, ?scratch, ?kind, "Launching scanner");

        let outcome = match self.run(kind, &scratch).await {
            Ok(outcome) => outcome,
            Err(e) => e.into(),
        };

        match tokio::fs::remove_file(&scratch).await {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                warn!(?e, ?scratch, "Unable to remove scanner scratch file");
            }
            _ => {}
        }

        outcome
    }
}

/// Stand-in when no scanning program is configured - documents can still be imported.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredScanner;

#[async_trait]
impl ScanCapture for UnconfiguredScanner {
    async fn capture(&self, _kind: DocumentKind) -> ScanOutcome {
        ScanError::NoScannerConfigured.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::document::test_fixtures::{JPEG_BYTES, PDF_BYTES};

    #[tokio::test]
    async fn persist_writes_bytes_under_slot_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let doc = store
            .persist(DocumentKind::Register, PDF_BYTES)
            .await
            .unwrap();

        assert!(doc.local_path.starts_with(dir.path()));
        assert!(doc.display_name.starts_with("buku_induk_"));
        assert!(doc.display_name.ends_with(".pdf"));
        assert_eq!(doc.size_bytes, PDF_BYTES.len() as u64);
        assert_eq!(doc.format, DocumentFormat::Pdf);
        assert_eq!(std::fs::read(&doc.local_path).unwrap(), PDF_BYTES);
    }

    #[tokio::test]
    async fn repeated_scans_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let mut paths = Vec::new();
        for _ in 0..5 {
            paths.push(
                store
                    .persist(DocumentKind::Diploma, JPEG_BYTES)
                    .await
                    .unwrap()
                    .local_path,
            );
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
        assert!(
            paths
                .iter()
                .all(|p| p.extension().is_some_and(|ext| ext == "jpg"))
        );
    }

    #[tokio::test]
    async fn persist_rejects_non_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        assert!(matches!(
            store.persist(DocumentKind::Register, b"hello").await,
            Err(ScanError::UnsupportedFormat)
        ));
        assert!(matches!(
            store.persist(DocumentKind::Register, &[]).await,
            Err(ScanError::EmptyDocument)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unconfigured_scanner_fails_with_hint() {
        let ScanOutcome::Failed(message) = UnconfiguredScanner.capture(DocumentKind::Diploma).await
        else {
            panic!("expected failure");
        };
        assert!(message.contains("impor"));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("scanner.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_scanner_copies_output_into_store() {
        let scripts = tempfile::tempdir().unwrap();
        let fixture = scripts.path().join("page.pdf");
        std::fs::write(&fixture, PDF_BYTES).unwrap();
        let program = write_script(
            scripts.path(),
            &format!(
                "[ \"$1\" = \"Ijazah\" ] || exit 3\n[ \"$INDUK_PAGE_LIMIT\" = \"100\" ] || exit 4\ncp {:?} \"$2\"",
                fixture
            ),
        );

        let store_dir = tempfile::tempdir().unwrap();
        let scanner = CommandScanner::new(program, DocumentStore::new(store_dir.path()));

        let ScanOutcome::Captured(doc) = scanner.capture(DocumentKind::Diploma).await else {
            panic!("expected a captured document");
        };
        assert!(doc.local_path.starts_with(store_dir.path()));
        assert!(doc.display_name.starts_with("ijazah_"));
        assert_eq!(std::fs::read(&doc.local_path).unwrap(), PDF_BYTES);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_scanner_cancellation_and_failure() {
        let scripts = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(store_dir.path());

        let backed_out = CommandScanner::new(write_script(scripts.path(), "exit 0"), store.clone());
        assert_eq!(
            backed_out.capture(DocumentKind::Register).await,
            ScanOutcome::Cancelled
        );

        let interrupted =
            CommandScanner::new(write_script(scripts.path(), "exit 130"), store.clone());
        assert_eq!(
            interrupted.capture(DocumentKind::Register).await,
            ScanOutcome::Cancelled
        );

        let broken = CommandScanner::new(write_script(scripts.path(), "exit 2"), store.clone());
        assert!(matches!(
            broken.capture(DocumentKind::Register).await,
            ScanOutcome::Failed(_)
        ));

        let missing = CommandScanner::new(scripts.path().join("nope"), store);
        assert!(matches!(
            missing.capture(DocumentKind::Register).await,
            ScanOutcome::Failed(_)
        ));

        assert_eq!(std::fs::read_dir(store_dir.path()).unwrap().count(), 0);
    }
}
