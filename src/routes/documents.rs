use crate::{
    data::document::DocumentKind,
    error::{IndukResult, MissingDocumentSnafu, MultipartSnafu, ReadDocumentSnafu},
    form::Notice,
    routes::index::{render_form, render_reply},
    state::IndukState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
};
use maud::Markup;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};

#[derive(Deserialize)]
pub struct CaptureQuery {
    again: Option<bool>,
}

pub async fn internal_post_capture(
    State(state): State<IndukState>,
    Path(kind): Path<DocumentKind>,
    Query(CaptureQuery { again }): Query<CaptureQuery>,
) -> IndukResult<Markup> {
    if again.unwrap_or(false) {
        let reply = state.clear_document(kind).await?;
        if reply.notice.is_some() {
            return Ok(render_reply(&state, reply));
        }
    }

    let reply = state.capture(kind).await?;
    Ok(render_reply(&state, reply))
}

pub async fn internal_put_import(
    State(state): State<IndukState>,
    Path(kind): Path<DocumentKind>,
    mut multipart: Multipart,
) -> IndukResult<Markup> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await.context(MultipartSnafu)? {
        if field.name() != Some("document") {
            continue;
        }
        bytes = Some(field.bytes().await.context(MultipartSnafu)?);
        break;
    }

    let Some(bytes) = bytes else {
        let form = state.snapshot().await?;
        return Ok(render_form(
            &form,
            Some(&Notice::error("Pilih file PDF atau JPEG terlebih dahulu")),
            state.has_scanner(),
        ));
    };

    debug!(?kind, len = bytes.len(), "Importing document from gallery");
    let reply = state.import(kind, bytes.to_vec()).await?;
    Ok(render_reply(&state, reply))
}

pub async fn internal_delete_document(
    State(state): State<IndukState>,
    Path(kind): Path<DocumentKind>,
) -> IndukResult<Markup> {
    let reply = state.clear_document(kind).await?;
    Ok(render_reply(&state, reply))
}

pub async fn get_document(
    State(state): State<IndukState>,
    Path(kind): Path<DocumentKind>,
) -> IndukResult<impl IntoResponse> {
    let form = state.snapshot().await?;
    let document = form
        .documents
        .get(kind)
        .context(MissingDocumentSnafu { kind })?;

    let bytes = tokio::fs::read(&document.local_path)
        .await
        .context(ReadDocumentSnafu {
            path: document.local_path.clone(),
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, document.format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", document.display_name),
            ),
        ],
        bytes,
    ))
}
