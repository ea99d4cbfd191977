use crate::{
    config::RuntimeConfiguration,
    controller::{FormController, FormHandle},
    error::IndukResult,
    scanner::{CommandScanner, DocumentStore, ScanCapture, UnconfiguredScanner},
    service::RemoteServiceClient,
};
use maud::{DOCTYPE, Markup, html};
use std::{ops::Deref, sync::Arc};

#[derive(Clone, Debug)]
pub struct IndukState {
    form: FormHandle,
    config: RuntimeConfiguration,
}

impl IndukState {
    pub fn new(config: RuntimeConfiguration) -> IndukResult<Self> {
        let directory = Arc::new(RemoteServiceClient::new(config.service_config())?);

        let storage = config.storage_config();
        let store = DocumentStore::new(storage.data_dir.clone());
        let scanner: Arc<dyn ScanCapture> = match &storage.scanner_command {
            Some(program) => {
                info!(?program, "Using external scanner");
                Arc::new(CommandScanner::new(program.clone(), store.clone()))
            }
            None => {
                warn!("No scanner configured, documents can only be imported");
                Arc::new(UnconfiguredScanner)
            }
        };
        info!(data_dir = ?store.root(), "Scanned documents are kept locally");

        Ok(Self {
            form: FormController::spawn(directory, scanner, store),
            config,
        })
    }

    pub fn has_scanner(&self) -> bool {
        self.config.storage_config().scanner_command.is_some()
    }

    #[allow(clippy::unused_self)] //in case self is ever needed :), and to allow direct html! usage
    pub fn render(&self, markup: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="id" {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Induk" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center text-white p-4" {
                    (markup)
                }
            }
        }
    }
}

impl Deref for IndukState {
    type Target = FormHandle;

    fn deref(&self) -> &Self::Target {
        &self.form
    }
}
