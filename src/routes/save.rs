use crate::{error::IndukResult, routes::index::render_reply, state::IndukState};
use axum::extract::State;
use maud::Markup;

pub async fn internal_post_save(State(state): State<IndukState>) -> IndukResult<Markup> {
    let reply = state.save().await?;
    Ok(render_reply(&state, reply))
}
