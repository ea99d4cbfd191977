use crate::data::document::DocumentKind;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::html;
use snafu::Snafu;
use std::path::PathBuf;

pub type IndukResult<T> = Result<T, IndukError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IndukError {
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unknown time zone `{}`", name))]
    BadTimeZone { source: jiff::Error, name: String },
    #[snafu(display("Unable to create data directory {:?}", path))]
    CreateDataDir {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Unable to build HTTP client"))]
    BuildHttpClient { source: reqwest::Error },
    #[snafu(display("Form controller is no longer running"))]
    ControllerGone,
    #[snafu(display("Error with multipart form input"))]
    Multipart {
        source: axum::extract::multipart::MultipartError,
    },
    #[snafu(display("No document has been scanned for {}", kind.slot_label()))]
    MissingDocument { kind: DocumentKind },
    #[snafu(display("Unable to read document {:?}", path))]
    ReadDocument {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl IntoResponse for IndukError {
    fn into_response(self) -> Response {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found

        let basic_error = |desc| {
            html! {
                div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                    strong class="font-bold" {"Induk Error "}
                    span {(desc)}
                }
            }
        };

        let status_code = match &self {
            Self::BadEnvVar { .. } | Self::BadTimeZone { .. } | Self::CreateDataDir { .. } => ISE,
            Self::BuildHttpClient { .. } => ISE,
            Self::ControllerGone => ISE,
            Self::Multipart { source } => source.status(),
            Self::MissingDocument { .. } => NF,
            Self::ReadDocument { .. } => ISE,
        };

        error!(?self, "Error!");
        (status_code, Html(basic_error(self.to_string()))).into_response()
    }
}
