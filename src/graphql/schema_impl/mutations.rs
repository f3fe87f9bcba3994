use async_graphql::{Context, Object, ID};

use crate::{
    app_state::AppState,
    graphql::helpers::{gql, parse_id},
    models::{domain::question::AnswerLabel, dto::response::SessionView},
};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Records an answer for the current question. Repeated calls keep the
    /// first answer.
    async fn select_answer(
        &self,
        ctx: &Context<'_>,
        id: ID,
        label: AnswerLabel,
    ) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.select_answer(&id, label).await)
    }

    async fn next_question(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.next_question(&id).await)
    }

    async fn toggle_explanation(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.toggle_explanation(&id).await)
    }

    async fn request_results(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.request_results(&id).await)
    }

    async fn reset_session(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.reset_session(&id).await)
    }

    /// Generates one more batch and waits for it.
    async fn request_more_questions(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.request_more_questions(&id).await)
    }

    async fn clear_document(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.clear_document(&id).await)?;
        Ok(true)
    }
}
