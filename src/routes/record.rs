use crate::{
    controller::RecordEdit,
    data::student::{Gender, parse_date_of_birth},
    error::IndukResult,
    form::Notice,
    routes::index::{render_form, render_reply},
    state::IndukState,
};
use axum::{Form, extract::State};
use maud::Markup;
use serde::Deserialize;

/// Disabled inputs aren't submitted, so everything is optional.
#[derive(Deserialize, Debug, Default)]
pub struct RecordForm {
    nisn: Option<String>,
    student_name: Option<String>,
    gender: Option<Gender>,
    dob: Option<String>,
}

impl RecordForm {
    fn into_edits(self) -> Result<Vec<RecordEdit>, jiff::Error> {
        let mut edits = vec![];
        if let Some(nisn) = self.nisn {
            edits.push(RecordEdit::NationalNumber(nisn));
        }
        if let Some(name) = self.student_name {
            edits.push(RecordEdit::Name(name));
        }
        if let Some(gender) = self.gender {
            edits.push(RecordEdit::Gender(gender));
        }
        if let Some(dob) = self.dob {
            edits.push(RecordEdit::DateOfBirth(parse_date_of_birth(&dob)?));
        }
        Ok(edits)
    }
}

pub async fn internal_post_record(
    State(state): State<IndukState>,
    Form(form): Form<RecordForm>,
) -> IndukResult<Markup> {
    let edits = match form.into_edits() {
        Ok(edits) => edits,
        Err(e) => {
            warn!(?e, "Unparseable date of birth");
            let form = state.snapshot().await?;
            return Ok(render_form(
                &form,
                Some(&Notice::error("Tanggal lahir tidak valid")),
                state.has_scanner(),
            ));
        }
    };

    let reply = state.edit_record(edits).await?;
    Ok(render_reply(&state, reply))
}
