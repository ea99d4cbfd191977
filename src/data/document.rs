use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Register,
    Diploma,
}

impl DocumentKind {
    pub const ALL: [Self; 2] = [Self::Register, Self::Diploma];

    pub const fn slot_label(self) -> &'static str {
        match self {
            Self::Register => "Buku Induk",
            Self::Diploma => "Ijazah",
        }
    }

    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Diploma => "diploma",
        }
    }

    ///used as the prefix for stored files, eg. `buku_induk_1714550400000.pdf`
    pub fn file_stem(self) -> String {
        self.slot_label().to_lowercase().replace(' ', "_")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Jpeg,
}

impl DocumentFormat {
    /// Sniffs the magic bytes - the scanner only ever produces combined PDFs or JPEG pages.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match infer::get(bytes)?.mime_type() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDocument {
    pub local_path: PathBuf,
    pub display_name: String,
    pub size_bytes: u64,
    pub format: DocumentFormat,
}

impl ScannedDocument {
    pub fn size_kib(&self) -> u64 {
        self.size_bytes / 1024
    }
}

/// The two document slots of a form session, replaced wholesale on re-scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Documents {
    pub register: Option<ScannedDocument>,
    pub diploma: Option<ScannedDocument>,
}

impl Documents {
    pub const fn get(&self, kind: DocumentKind) -> Option<&ScannedDocument> {
        match kind {
            DocumentKind::Register => self.register.as_ref(),
            DocumentKind::Diploma => self.diploma.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, kind: DocumentKind) -> &mut Option<ScannedDocument> {
        match kind {
            DocumentKind::Register => &mut self.register,
            DocumentKind::Diploma => &mut self.diploma,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentKind, &ScannedDocument)> {
        DocumentKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|doc| (kind, doc)))
    }

    pub const fn is_empty(&self) -> bool {
        self.register.is_none() && self.diploma.is_none()
    }
}

#[cfg(test)]
pub mod test_fixtures {
    pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";
    pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
}
