//! The form session: one student record, two document slots, and the rules for when any of it
//! may change. Everything here is a plain state transition - the controller does the I/O.

use crate::{
    data::{
        document::{DocumentKind, Documents, ScannedDocument},
        is_alphanumeric_field,
        student::{Gender, StudentRecord},
    },
    service::{SearchOutcome, ServiceError},
};
use bitflags::bitflags;
use jiff::civil::Date;
use snafu::Snafu;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Busy {
    #[default]
    Idle,
    Searching,
    Saving,
}

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct MissingFields: u8 {
        const IDENTIFIER =    0b0000_0001;
        const NAME =          0b0000_0010;
        const DATE_OF_BIRTH = 0b0000_0100;
    }
}

impl MissingFields {
    pub fn as_nice_list(&self) -> impl Iterator<Item = &'static str> {
        self.iter().filter_map(|x| match x {
            Self::IDENTIFIER => Some("Nomor induk wajib diisi"),
            Self::NAME => Some("Nama siswa wajib diisi"),
            Self::DATE_OF_BIRTH => Some("Tanggal lahir wajib diisi"),
            _ => None,
        })
    }
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum FormError {
    #[snafu(display("Masukkan nomor induk"))]
    BlankIdentifier,
    #[snafu(display("{}", match busy {
        Busy::Searching => "Sedang mencari, harap tunggu",
        _ => "Sedang menyimpan, harap tunggu",
    }))]
    Busy { busy: Busy },
    #[snafu(display("Cari nomor induk terlebih dahulu"))]
    SearchRequired,
    #[snafu(display("Pemindaian belum selesai, harap tunggu"))]
    ScanPending,
    #[snafu(display("Data siswa ditemukan dan tidak dapat diubah"))]
    ReadOnly,
    #[snafu(display("{}", if missing.contains(MissingFields::IDENTIFIER) {
        "Nomor induk wajib diisi"
    } else {
        "Lengkapi data wajib"
    }))]
    IncompleteRecord { missing: MissingFields },
    #[snafu(display("No {:?} in flight", expected))]
    NothingInFlight { expected: Busy },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A short message for the operator, shown once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&FormError> for Notice {
    fn from(value: &FormError) -> Self {
        Self::error(value.to_string())
    }
}

/// What gets sent on save - a snapshot, so edits can't race the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub record: StudentRecord,
    pub documents: Documents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub record: StudentRecord,
    pub found: bool,
    pub search_attempted: bool,
    pub documents: Documents,
    pub busy: Busy,
    ///bumped whenever the session is thrown away, so late scan results can be told apart
    session: u64,
    pending_scans: u32,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    ///record fields (not the identifier) can be typed into
    pub const fn fields_editable(&self) -> bool {
        self.search_attempted && !self.found && matches!(self.busy, Busy::Idle)
    }

    pub fn can_search(&self) -> bool {
        matches!(self.busy, Busy::Idle)
            && !self.is_scanning()
            && !self.record.identifier.trim().is_empty()
    }

    ///a capture or import for this session hasn't come back yet
    pub const fn is_scanning(&self) -> bool {
        self.pending_scans > 0
    }

    fn ensure_no_pending_scans(&self) -> Result<(), FormError> {
        snafu::ensure!(!self.is_scanning(), ScanPendingSnafu);
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), FormError> {
        match self.busy {
            Busy::Idle => Ok(()),
            busy => Err(FormError::Busy { busy }),
        }
    }

    fn ensure_searched(&self) -> Result<(), FormError> {
        self.ensure_idle()?;
        snafu::ensure!(self.search_attempted, SearchRequiredSnafu);
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), FormError> {
        self.ensure_searched()?;
        snafu::ensure!(!self.found, ReadOnlySnafu);
        Ok(())
    }

    fn reset(&mut self) {
        let session = self.session.wrapping_add(1);
        *self = Self {
            session,
            ..Self::default()
        };
    }

    /// One keystroke in the identifier field. Returns whether the new value was taken.
    ///
    /// Changing the identifier after a search throws the whole session away, the operator is now
    /// talking about a different student.
    pub fn edit_identifier(&mut self, value: &str) -> Result<bool, FormError> {
        self.ensure_idle()?;
        if !is_alphanumeric_field(value) {
            return Ok(false);
        }
        if value == self.record.identifier {
            return Ok(true);
        }

        if self.search_attempted {
            self.reset();
        }
        self.record.identifier = value.to_string();
        Ok(true)
    }

    pub fn edit_national_number(&mut self, value: &str) -> Result<bool, FormError> {
        self.ensure_editable()?;
        if !is_alphanumeric_field(value) {
            return Ok(false);
        }
        self.record.national_number = value.to_string();
        Ok(true)
    }

    pub fn edit_name(&mut self, value: &str) -> Result<(), FormError> {
        self.ensure_editable()?;
        self.record.name = value.to_string();
        Ok(())
    }

    pub fn select_gender(&mut self, gender: Gender) -> Result<(), FormError> {
        self.ensure_editable()?;
        self.record.gender = gender;
        Ok(())
    }

    pub fn select_date_of_birth(&mut self, date: Option<Date>) -> Result<(), FormError> {
        self.ensure_editable()?;
        self.record.date_of_birth = date;
        self.record.unparsed_date_of_birth = None;
        Ok(())
    }

    /// Checked before launching the scanner, so the operator doesn't scan for nothing. Hands back
    /// the session the result belongs to.
    ///
    /// Searching and saving wait until every scan has come back, so a capture never lands in the
    /// middle of either.
    pub fn begin_scan(&mut self) -> Result<u64, FormError> {
        self.ensure_searched()?;
        self.pending_scans += 1;
        Ok(self.session)
    }

    /// Returns whether the scan still belongs to the current session. Scans from a session that
    /// has since been reset were already forgotten by the reset.
    pub fn end_scan(&mut self, session: u64) -> bool {
        if session != self.session {
            return false;
        }
        self.pending_scans = self.pending_scans.saturating_sub(1);
        true
    }

    pub fn attach_document(
        &mut self,
        kind: DocumentKind,
        document: ScannedDocument,
    ) -> Result<(), FormError> {
        snafu::ensure!(self.search_attempted, SearchRequiredSnafu);
        *self.documents.slot_mut(kind) = Some(document);
        Ok(())
    }

    pub fn clear_document(&mut self, kind: DocumentKind) -> Result<(), FormError> {
        self.ensure_searched()?;
        *self.documents.slot_mut(kind) = None;
        Ok(())
    }

    /// Moves to `Searching` and hands back the identifier to look up.
    pub fn begin_search(&mut self) -> Result<String, FormError> {
        self.ensure_idle()?;
        self.ensure_no_pending_scans()?;
        let identifier = self.record.identifier.trim();
        snafu::ensure!(!identifier.is_empty(), BlankIdentifierSnafu);

        let identifier = identifier.to_string();
        self.busy = Busy::Searching;
        Ok(identifier)
    }

    pub fn finish_search(
        &mut self,
        result: Result<SearchOutcome, &ServiceError>,
    ) -> Result<Notice, FormError> {
        snafu::ensure!(
            self.busy == Busy::Searching,
            NothingInFlightSnafu {
                expected: Busy::Searching
            }
        );
        self.busy = Busy::Idle;

        Ok(match result {
            Ok(SearchOutcome::Found(details)) => {
                self.record.populate(details);
                self.found = true;
                self.search_attempted = true;
                Notice::success("Data siswa ditemukan")
            }
            Ok(SearchOutcome::NotFound) => {
                if self.found {
                    self.record.clear_details();
                }
                self.found = false;
                self.search_attempted = true;
                Notice::info("Data tidak ditemukan, silakan isi manual")
            }
            Err(e) => Notice::error(format!("Error: {e}")),
        })
    }

    pub fn missing_for_save(&self) -> MissingFields {
        let mut missing = MissingFields::empty();
        if self.record.identifier.trim().is_empty() {
            missing |= MissingFields::IDENTIFIER;
        }
        if !self.found {
            if self.record.name.trim().is_empty() {
                missing |= MissingFields::NAME;
            }
            if self.record.date_of_birth.is_none() {
                missing |= MissingFields::DATE_OF_BIRTH;
            }
        }
        missing
    }

    /// Moves to `Saving` and hands back what should be sent.
    pub fn begin_save(&mut self) -> Result<SaveRequest, FormError> {
        self.ensure_idle()?;
        self.ensure_no_pending_scans()?;
        let missing = self.missing_for_save();
        snafu::ensure!(missing.is_empty(), IncompleteRecordSnafu { missing });

        self.busy = Busy::Saving;
        Ok(SaveRequest {
            record: self.record.clone(),
            documents: self.documents.clone(),
        })
    }

    /// A brand new student clears the whole form for the next one. An existing student stays on
    /// screen, only their document slots are emptied.
    pub fn finish_save(&mut self, result: Result<(), &ServiceError>) -> Result<Notice, FormError> {
        snafu::ensure!(
            self.busy == Busy::Saving,
            NothingInFlightSnafu {
                expected: Busy::Saving
            }
        );
        self.busy = Busy::Idle;

        Ok(match result {
            Ok(()) => {
                if self.found {
                    self.documents = Documents::default();
                } else {
                    self.reset();
                }
                Notice::success("Data berhasil disimpan")
            }
            Err(e) => Notice::error(format!("Error: {e}")),
        })
    }
}
