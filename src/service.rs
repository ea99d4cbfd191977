//! Client for the spreadsheet-backed web service.
//!
//! The service is a single endpoint that takes a JSON body with an `action` of either `search` or
//! `save`. Scanned documents go along inside the `save` body as base64 strings.

use crate::{
    config::ServiceConfig,
    data::{
        document::{DocumentKind, Documents},
        student::{Gender, StudentDetails, StudentRecord, parse_remote_date_of_birth},
    },
    error::{BuildHttpClientSnafu, IndukResult},
};
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer, Serialize};
use jiff::tz::TimeZone;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu};
use std::path::PathBuf;

const JSON_UTF8: &str = "application/json; charset=utf-8";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    #[snafu(display("{source}"))]
    Transport { source: reqwest::Error },
    #[snafu(display("{status}: {body}"))]
    Status { status: u16, body: String },
    #[snafu(display("Malformed response from the student service: {source}"))]
    Decode { source: serde_json::Error },
    #[snafu(display("Malformed response from the student service: `found` without `student`"))]
    MissingStudent,
    #[snafu(display("Unable to encode request"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Unable to read scanned document {:?}", path))]
    ReadDocument {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(StudentDetails),
    NotFound,
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn search(&self, identifier: &str) -> ServiceResult<SearchOutcome>;
    async fn save(&self, record: &StudentRecord, documents: &Documents) -> ServiceResult<()>;
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ServiceRequest<'a> {
    Search { nomor_induk: &'a str },
    Save(SavePayload<'a>),
}

#[derive(Serialize)]
struct SavePayload<'a> {
    nomor_induk: &'a str,
    nisn: &'a str,
    student_name: &'a str,
    gender: Gender,
    dob: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    buku_induk_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buku_induk_filename: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ijazah_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ijazah_filename: Option<&'a str>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    found: Value,
    #[serde(default)]
    student: Option<RemoteStudent>,
}

#[derive(Deserialize)]
struct RemoteStudent {
    #[serde(default, deserialize_with = "lenient_string")]
    nisn: String,
    #[serde(default, deserialize_with = "lenient_string")]
    student_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    gender: String,
    #[serde(default, deserialize_with = "lenient_string")]
    dob: String,
}

///spreadsheet cells come back as whatever type the sheet guessed - numbers for NISNs, mostly
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn is_truthy(found: &Value) -> bool {
    match found {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

impl RemoteStudent {
    /// Cells the sheet filled in some other way than we expect don't stop the student being
    /// found - the gender falls back to the default and the date is kept as written.
    fn into_details(self, time_zone: &TimeZone) -> StudentDetails {
        let Self {
            nisn,
            student_name,
            gender,
            dob,
        } = self;

        let gender = if gender.trim().is_empty() {
            Gender::default()
        } else {
            Gender::from_wire_str(&gender).unwrap_or_else(|| {
                warn!(?gender, "Unexpected gender from the student service");
                Gender::default()
            })
        };

        let (date_of_birth, unparsed_date_of_birth) =
            match parse_remote_date_of_birth(&dob, time_zone) {
                Ok(date) => (date, None),
                Err(e) => {
                    warn!(?e, ?dob, "Unexpected date of birth from the student service");
                    (None, Some(dob))
                }
            };

        StudentDetails {
            national_number: nisn,
            name: student_name,
            gender,
            date_of_birth,
            unparsed_date_of_birth,
        }
    }
}

pub struct RemoteServiceClient {
    http: reqwest::Client,
    config: std::sync::Arc<ServiceConfig>,
}

impl RemoteServiceClient {
    pub fn new(config: std::sync::Arc<ServiceConfig>) -> IndukResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.call_timeout)
            .build()
            .context(BuildHttpClientSnafu)?;

        Ok(Self { http, config })
    }

    async fn post(&self, request: &ServiceRequest<'_>) -> ServiceResult<reqwest::Response> {
        let body = serde_json::to_vec(request).context(EncodeSnafu)?;
        debug!(bytes = body.len(), "Sending request to student service");

        self.http
            .post(self.config.endpoint())
            .header(CONTENT_TYPE, JSON_UTF8)
            .body(body)
            .send()
            .await
            .context(TransportSnafu)
    }

    async fn ensure_success(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn encode_document(
        documents: &Documents,
        kind: DocumentKind,
    ) -> ServiceResult<Option<(String, &str)>> {
        let Some(doc) = documents.get(kind) else {
            return Ok(None);
        };

        let bytes = tokio::fs::read(&doc.local_path)
            .await
            .context(ReadDocumentSnafu {
                path: doc.local_path.clone(),
            })?;
        Ok(Some((BASE64_STANDARD.encode(bytes), doc.display_name.as_str())))
    }
}

#[async_trait]
impl StudentDirectory for RemoteServiceClient {
    async fn search(&self, identifier: &str) -> ServiceResult<SearchOutcome> {
        let response = self
            .post(&ServiceRequest::Search {
                nomor_induk: identifier,
            })
            .await?;
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await.context(TransportSnafu)?;
        debug!(body = %String::from_utf8_lossy(&body), "Search response");

        let SearchResponse { found, student } = if body.iter().all(u8::is_ascii_whitespace) {
            SearchResponse {
                found: Value::Null,
                student: None,
            }
        } else {
            serde_json::from_slice(&body).context(DecodeSnafu)?
        };

        if !is_truthy(&found) {
            return Ok(SearchOutcome::NotFound);
        }

        let student = student.context(MissingStudentSnafu)?;
        Ok(SearchOutcome::Found(
            student.into_details(&self.config.time_zone),
        ))
    }

    async fn save(&self, record: &StudentRecord, documents: &Documents) -> ServiceResult<()> {
        if documents.is_empty() {
            debug!(identifier = ?record.identifier, "Saving without any documents");
        }
        let register = Self::encode_document(documents, DocumentKind::Register).await?;
        let diploma = Self::encode_document(documents, DocumentKind::Diploma).await?;

        let (buku_induk_base64, buku_induk_filename) = register.unzip();
        let (ijazah_base64, ijazah_filename) = diploma.unzip();

        let payload = SavePayload {
            nomor_induk: &record.identifier,
            nisn: &record.national_number,
            student_name: &record.name,
            gender: record.gender,
            dob: record.date_of_birth_wire(),
            buku_induk_base64,
            buku_induk_filename,
            ijazah_base64,
            ijazah_filename,
        };

        let response = self.post(&ServiceRequest::Save(payload)).await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::document::{DocumentFormat, ScannedDocument, test_fixtures::PDF_BYTES};
    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
    };
    use jiff::civil::date;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Recorded {
        bodies: Arc<Mutex<Vec<Value>>>,
        content_types: Arc<Mutex<Vec<String>>>,
    }

    async fn spawn_service(recorded: Recorded, reply: fn(&Value) -> Response) -> String {
        let handler = move |State(recorded): State<Recorded>,
                            headers: HeaderMap,
                            Json(body): Json<Value>| async move {
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            recorded.content_types.lock().unwrap().push(content_type);
            let response = reply(&body);
            recorded.bodies.lock().unwrap().push(body);
            response
        };

        let app = Router::new()
            .route("/exec", post(handler))
            .with_state(recorded);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{addr}/exec")
    }

    fn client(endpoint: String) -> RemoteServiceClient {
        RemoteServiceClient::new(Arc::new(ServiceConfig::with_endpoint(endpoint))).unwrap()
    }

    #[tokio::test]
    async fn search_not_found_when_flag_absent_or_false() {
        let recorded = Recorded::default();
        let url = spawn_service(recorded.clone(), |body| {
            if body["nomor_induk"] == "A123" {
                Json(serde_json::json!({"found": false})).into_response()
            } else {
                Json(serde_json::json!({})).into_response()
            }
        })
        .await;
        let client = client(url);

        assert_eq!(client.search("A123").await.unwrap(), SearchOutcome::NotFound);
        assert_eq!(client.search("B9").await.unwrap(), SearchOutcome::NotFound);

        let bodies = recorded.bodies.lock().unwrap();
        assert_eq!(
            bodies[0],
            serde_json::json!({"action": "search", "nomor_induk": "A123"})
        );
        assert!(
            recorded
                .content_types
                .lock()
                .unwrap()
                .iter()
                .all(|ct| ct == JSON_UTF8)
        );
    }

    #[tokio::test]
    async fn search_found_populates_details() {
        let url = spawn_service(Recorded::default(), |_| {
            Json(serde_json::json!({
                "found": true,
                "student": {"nisn": "001", "student_name": "Budi", "gender": "laki-laki", "dob": "2010-05-01"}
            }))
            .into_response()
        })
        .await;

        let outcome = client(url).search("A123").await.unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::Found(StudentDetails {
                national_number: "001".into(),
                name: "Budi".into(),
                gender: Gender::Male,
                date_of_birth: Some(date(2010, 5, 1)),
                unparsed_date_of_birth: None,
            })
        );
    }

    #[tokio::test]
    async fn search_tolerates_spreadsheet_typed_cells() {
        let url = spawn_service(Recorded::default(), |_| {
            Json(serde_json::json!({
                "found": "true",
                "student": {"nisn": 9_876_543, "student_name": "Sari", "gender": "perempuan", "dob": "2011-02-02T17:00:00.000Z"}
            }))
            .into_response()
        })
        .await;

        let SearchOutcome::Found(details) = client(url).search("S1").await.unwrap() else {
            panic!("expected a found student");
        };
        assert_eq!(details.national_number, "9876543");
        assert_eq!(details.gender, Gender::Female);
        assert_eq!(details.date_of_birth, Some(date(2011, 2, 3)));
    }

    #[tokio::test]
    async fn odd_cells_do_not_hide_a_student() {
        let url = spawn_service(Recorded::default(), |_| {
            Json(serde_json::json!({
                "found": true,
                "student": {"nisn": "002", "student_name": "Rina", "gender": "L", "dob": "01/05/2010"}
            }))
            .into_response()
        })
        .await;

        let SearchOutcome::Found(details) = client(url).search("R1").await.unwrap() else {
            panic!("expected a found student");
        };
        assert_eq!(details.name, "Rina");
        assert_eq!(details.gender, Gender::Male);
        assert_eq!(details.date_of_birth, None);
        assert_eq!(details.unparsed_date_of_birth.as_deref(), Some("01/05/2010"));
    }

    #[tokio::test]
    async fn search_errors_are_surfaced() {
        let malformed = spawn_service(Recorded::default(), |_| {
            (StatusCode::OK, "<html>not json</html>").into_response()
        })
        .await;
        assert!(matches!(
            client(malformed).search("A1").await,
            Err(ServiceError::Decode { .. })
        ));

        let missing = spawn_service(Recorded::default(), |_| {
            Json(serde_json::json!({"found": true})).into_response()
        })
        .await;
        assert!(matches!(
            client(missing).search("A1").await,
            Err(ServiceError::MissingStudent)
        ));

        let failing = spawn_service(Recorded::default(), |_| {
            (StatusCode::BAD_GATEWAY, "upstream down").into_response()
        })
        .await;
        let err = client(failing).search("A1").await.unwrap_err();
        assert_eq!(err.to_string(), "502: upstream down");
    }

    #[tokio::test]
    async fn search_reports_unreachable_service() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(matches!(
            client(format!("http://{addr}/exec")).search("A1").await,
            Err(ServiceError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn save_embeds_only_present_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ijazah_1.pdf");
        std::fs::write(&path, PDF_BYTES).unwrap();

        let recorded = Recorded::default();
        let url = spawn_service(recorded.clone(), |_| {
            Json(serde_json::json!({"status": "ok"})).into_response()
        })
        .await;

        let record = StudentRecord {
            identifier: "A123".into(),
            national_number: "001".into(),
            name: "Budi".into(),
            gender: Gender::Female,
            date_of_birth: Some(date(2010, 5, 1)),
            unparsed_date_of_birth: None,
        };
        let documents = Documents {
            register: None,
            diploma: Some(ScannedDocument {
                local_path: path,
                display_name: "ijazah_1.pdf".into(),
                size_bytes: PDF_BYTES.len() as u64,
                format: DocumentFormat::Pdf,
            }),
        };

        client(url).save(&record, &documents).await.unwrap();

        let bodies = recorded.bodies.lock().unwrap();
        let body = bodies[0].as_object().unwrap();
        assert_eq!(body["action"], "save");
        assert_eq!(body["nomor_induk"], "A123");
        assert_eq!(body["nisn"], "001");
        assert_eq!(body["student_name"], "Budi");
        assert_eq!(body["gender"], "perempuan");
        assert_eq!(body["dob"], "2010-05-01");
        assert_eq!(body["ijazah_filename"], "ijazah_1.pdf");
        assert_eq!(
            BASE64_STANDARD
                .decode(body["ijazah_base64"].as_str().unwrap())
                .unwrap(),
            PDF_BYTES
        );
        assert!(!body.contains_key("buku_induk_base64"));
        assert!(!body.contains_key("buku_induk_filename"));
    }

    #[tokio::test]
    async fn save_failure_carries_status_and_body() {
        let url = spawn_service(Recorded::default(), |_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Sheet is locked").into_response()
        })
        .await;

        let err = client(url)
            .save(
                &StudentRecord {
                    identifier: "A123".into(),
                    ..Default::default()
                },
                &Documents::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "500: Sheet is locked");
    }

    #[tokio::test]
    async fn save_fails_locally_when_document_vanished() {
        let url = spawn_service(Recorded::default(), |_| StatusCode::OK.into_response()).await;
        let documents = Documents {
            register: Some(ScannedDocument {
                local_path: "/definitely/not/here.pdf".into(),
                display_name: "here.pdf".into(),
                size_bytes: 0,
                format: DocumentFormat::Pdf,
            }),
            diploma: None,
        };

        assert!(matches!(
            client(url)
                .save(&StudentRecord::default(), &documents)
                .await,
            Err(ServiceError::ReadDocument { .. })
        ));
    }
}
