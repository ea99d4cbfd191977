use crate::{
    controller::Reply,
    error::IndukResult,
    form::Notice,
    routes::index::{render_form, render_reply},
    state::IndukState,
};
use axum::{Form, extract::State};
use maud::Markup;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct IdentifierForm {
    #[serde(default)]
    nomor_induk: String,
}

pub async fn internal_post_identifier(
    State(state): State<IndukState>,
    Form(IdentifierForm { nomor_induk }): Form<IdentifierForm>,
) -> IndukResult<Markup> {
    let reply = state.edit_identifier(nomor_induk).await?;
    Ok(render_reply(&state, reply))
}

/// Why the identifier that was just typed can't be searched, if it can't.
fn search_blocked(submitted: &str, reply: &Reply) -> Option<Notice> {
    if let Some(notice) = &reply.notice {
        return Some(notice.clone());
    }
    (reply.form.record.identifier != submitted)
        .then(|| Notice::info("Nomor induk hanya boleh berisi huruf dan angka"))
}

pub async fn internal_post_search(
    State(state): State<IndukState>,
    Form(IdentifierForm { nomor_induk }): Form<IdentifierForm>,
) -> IndukResult<Markup> {
    //the debounced input may not have fired yet
    let reply = state.edit_identifier(nomor_induk.clone()).await?;
    if let Some(notice) = search_blocked(&nomor_induk, &reply) {
        return Ok(render_form(&reply.form, Some(&notice), state.has_scanner()));
    }

    let reply = state.search().await?;
    Ok(render_reply(&state, reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormState;

    fn reply_with_identifier(identifier: &str) -> Reply {
        let mut form = FormState::new();
        form.edit_identifier(identifier).unwrap();
        Reply { form, notice: None }
    }

    #[test]
    fn accepted_identifier_goes_ahead() {
        assert_eq!(search_blocked("A123", &reply_with_identifier("A123")), None);
    }

    #[test]
    fn rejected_keystroke_does_not_search_the_old_identifier() {
        let notice = search_blocked("A12-3", &reply_with_identifier("A12")).unwrap();
        assert_eq!(
            notice,
            Notice::info("Nomor induk hanya boleh berisi huruf dan angka")
        );
    }

    #[test]
    fn refusal_from_the_form_is_passed_on() {
        let mut reply = reply_with_identifier("A1");
        reply.notice = Some(Notice::error("Sedang menyimpan, harap tunggu"));
        assert_eq!(
            search_blocked("A1", &reply),
            Some(Notice::error("Sedang menyimpan, harap tunggu"))
        );
    }
}
