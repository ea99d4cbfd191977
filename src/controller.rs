//! Single-owner form controller.
//!
//! One task owns the [`FormState`]. Route handlers send it [`Command`]s through a [`FormHandle`]
//! and wait on a oneshot for the [`Reply`]. Anything slow (the remote service, the scanner, writing
//! an imported document) runs on its own task, and its result comes back to the controller as a
//! [`Completion`] which is applied there - the form is never touched from anywhere else.

use crate::{
    data::{document::DocumentKind, student::Gender},
    error::{ControllerGoneSnafu, IndukResult},
    form::{FormError, FormState, Notice},
    scanner::{DocumentStore, ScanCapture, ScanOutcome},
    service::{SearchOutcome, ServiceResult, StudentDirectory},
};
use jiff::civil::Date;
use snafu::OptionExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub type Responder<T> = oneshot::Sender<T>;

const COMMAND_BUFFER: usize = 32;

/// The form as it stands after a command, plus anything the operator should be told.
#[derive(Debug, Clone)]
pub struct Reply {
    pub form: FormState,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEdit {
    NationalNumber(String),
    Name(String),
    Gender(Gender),
    DateOfBirth(Option<Date>),
}

pub enum Command {
    Snapshot {
        respond: Responder<FormState>,
    },
    EditIdentifier {
        value: String,
        respond: Responder<Reply>,
    },
    EditRecord {
        edits: Vec<RecordEdit>,
        respond: Responder<Reply>,
    },
    Search {
        respond: Responder<Reply>,
    },
    /// Launch the scanner for a slot.
    Capture {
        kind: DocumentKind,
        respond: Responder<Reply>,
    },
    /// A PDF/JPEG picked from the gallery rather than scanned.
    Import {
        kind: DocumentKind,
        bytes: Vec<u8>,
        respond: Responder<Reply>,
    },
    ClearDocument {
        kind: DocumentKind,
        respond: Responder<Reply>,
    },
    Save {
        respond: Responder<Reply>,
    },
}

enum Completion {
    Searched {
        result: ServiceResult<SearchOutcome>,
        respond: Responder<Reply>,
    },
    Saved {
        result: ServiceResult<()>,
        respond: Responder<Reply>,
    },
    Scanned {
        kind: DocumentKind,
        session: u64,
        outcome: ScanOutcome,
        respond: Responder<Reply>,
    },
}

#[derive(Clone, Debug)]
pub struct FormHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl FormHandle {
    async fn send_and_wait<T>(&self, make_cmd: impl FnOnce(Responder<T>) -> Command) -> IndukResult<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make_cmd(tx))
            .await
            .ok()
            .context(ControllerGoneSnafu)?;
        rx.await.ok().context(ControllerGoneSnafu)
    }

    pub async fn snapshot(&self) -> IndukResult<FormState> {
        self.send_and_wait(|respond| Command::Snapshot { respond })
            .await
    }

    pub async fn edit_identifier(&self, value: String) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::EditIdentifier { value, respond })
            .await
    }

    pub async fn edit_record(&self, edits: Vec<RecordEdit>) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::EditRecord { edits, respond })
            .await
    }

    pub async fn search(&self) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::Search { respond })
            .await
    }

    pub async fn capture(&self, kind: DocumentKind) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::Capture { kind, respond })
            .await
    }

    pub async fn import(&self, kind: DocumentKind, bytes: Vec<u8>) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::Import {
            kind,
            bytes,
            respond,
        })
        .await
    }

    pub async fn clear_document(&self, kind: DocumentKind) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::ClearDocument { kind, respond })
            .await
    }

    pub async fn save(&self) -> IndukResult<Reply> {
        self.send_and_wait(|respond| Command::Save { respond })
            .await
    }
}

pub struct FormController {
    form: FormState,
    directory: Arc<dyn StudentDirectory>,
    scanner: Arc<dyn ScanCapture>,
    store: DocumentStore,
    completions_tx: mpsc::UnboundedSender<Completion>,
}

impl FormController {
    /// Starts the controller task with an empty form. The task ends once every handle is gone.
    pub fn spawn(
        directory: Arc<dyn StudentDirectory>,
        scanner: Arc<dyn ScanCapture>,
        store: DocumentStore,
    ) -> FormHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let controller = Self {
            form: FormState::new(),
            directory,
            scanner,
            store,
            completions_tx,
        };
        tokio::spawn(controller.run(cmd_rx, completions_rx));

        FormHandle { cmd_tx }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!("Form controller started");
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                Some(done) = completions.recv() => self.complete(done),
            }
        }
        info!("Form controller stopped");
    }

    fn reply(&self, respond: Responder<Reply>, notice: Option<Notice>) {
        let reply = Reply {
            form: self.form.clone(),
            notice,
        };
        if respond.send(reply).is_err() {
            debug!("Requester went away before the reply");
        }
    }

    fn rejected(&self, respond: Responder<Reply>, e: &FormError) {
        debug!(?e, "Form action rejected");
        self.reply(respond, Some(e.into()));
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Snapshot { respond } => {
                let _ = respond.send(self.form.clone());
            }
            Command::EditIdentifier { value, respond } => {
                match self.form.edit_identifier(&value) {
                    Ok(accepted) => {
                        if !accepted {
                            trace!(?value, "Identifier keystroke rejected");
                        }
                        self.reply(respond, None);
                    }
                    Err(e) => self.rejected(respond, &e),
                }
            }
            Command::EditRecord { edits, respond } => match self.apply_edits(edits) {
                Ok(()) => self.reply(respond, None),
                Err(e) => self.rejected(respond, &e),
            },
            Command::Search { respond } => match self.form.begin_search() {
                Ok(identifier) => {
                    info!(?identifier, "Searching for student");
                    let directory = self.directory.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = directory.search(&identifier).await;
                        let _ = completions.send(Completion::Searched { result, respond });
                    });
                }
                Err(e) => self.rejected(respond, &e),
            },
            Command::Capture { kind, respond } => match self.form.begin_scan() {
                Ok(session) => {
                    let scanner = self.scanner.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let outcome = scanner.capture(kind).await;
                        let _ = completions.send(Completion::Scanned {
                            kind,
                            session,
                            outcome,
                            respond,
                        });
                    });
                }
                Err(e) => self.rejected(respond, &e),
            },
            Command::Import {
                kind,
                bytes,
                respond,
            } => match self.form.begin_scan() {
                Ok(session) => {
                    let store = self.store.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let outcome = store.persist(kind, &bytes).await.into();
                        let _ = completions.send(Completion::Scanned {
                            kind,
                            session,
                            outcome,
                            respond,
                        });
                    });
                }
                Err(e) => self.rejected(respond, &e),
            },
            Command::ClearDocument { kind, respond } => {
                match self.form.clear_document(kind) {
                    Ok(()) => self.reply(respond, None),
                    Err(e) => self.rejected(respond, &e),
                }
            }
            Command::Save { respond } => match self.form.begin_save() {
                Ok(request) => {
                    info!(
                        identifier = ?request.record.identifier,
                        found = self.form.found,
                        documents = request.documents.iter().count(),
                        "Saving student"
                    );
                    let directory = self.directory.clone();
                    let completions = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = directory
                            .save(&request.record, &request.documents)
                            .await;
                        let _ = completions.send(Completion::Saved { result, respond });
                    });
                }
                Err(e) => self.rejected(respond, &e),
            },
        }
    }

    fn apply_edits(&mut self, edits: Vec<RecordEdit>) -> Result<(), FormError> {
        for edit in edits {
            match edit {
                RecordEdit::NationalNumber(value) => {
                    if !self.form.edit_national_number(&value)? {
                        trace!(?value, "NISN keystroke rejected");
                    }
                }
                RecordEdit::Name(value) => self.form.edit_name(&value)?,
                RecordEdit::Gender(gender) => self.form.select_gender(gender)?,
                RecordEdit::DateOfBirth(date) => self.form.select_date_of_birth(date)?,
            }
        }
        Ok(())
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Searched { result, respond } => {
                if let Err(e) = &result {
                    error!(?e, "Error searching student");
                }
                let notice = self.form.finish_search(result.as_ref().cloned());
                self.reply_with(respond, notice);
            }
            Completion::Saved { result, respond } => {
                if let Err(e) = &result {
                    error!(?e, "Error saving student data");
                }
                let notice = self.form.finish_save(result.as_ref().copied());
                self.reply_with(respond, notice);
            }
            Completion::Scanned {
                kind,
                session,
                outcome,
                respond,
            } => {
                let notice = self.apply_scan(kind, session, outcome);
                self.reply(respond, notice);
            }
        }
    }

    fn reply_with(&self, respond: Responder<Reply>, notice: Result<Notice, FormError>) {
        match notice {
            Ok(notice) => self.reply(respond, Some(notice)),
            Err(e) => {
                //only reachable if busy got out of step with what's in flight
                error!(?e, "Completion arrived with nothing in flight");
                self.reply(respond, Some((&e).into()));
            }
        }
    }

    fn apply_scan(
        &mut self,
        kind: DocumentKind,
        session: u64,
        outcome: ScanOutcome,
    ) -> Option<Notice> {
        let current = self.form.end_scan(session);
        match outcome {
            ScanOutcome::Cancelled => {
                debug!(?kind, "Scan cancelled");
                None
            }
            ScanOutcome::Failed(message) => Some(Notice::error(format!("Error: {message}"))),
            ScanOutcome::Captured(document) if !current => {
                warn!(?kind, path = ?document.local_path, "Scan finished for a form that has since been reset");
                Some(Notice::info(
                    "Formulir sudah berganti, hasil pindaian tidak dipakai",
                ))
            }
            ScanOutcome::Captured(document) => {
                let name = document.display_name.clone();
                match self.form.attach_document(kind, document) {
                    Ok(()) => Some(Notice::success(format!(
                        "{} tersimpan: {name}",
                        kind.slot_label()
                    ))),
                    Err(e) => Some((&e).into()),
                }
            }
        }
    }
}
