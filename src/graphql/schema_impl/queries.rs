use async_graphql::{Context, Object, ID};

use crate::{
    app_state::AppState,
    graphql::helpers::{gql, parse_id},
    models::dto::response::SessionView,
};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn session(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<SessionView> {
        let state = ctx.data::<AppState>()?;
        let id = gql(parse_id(&id))?;
        gql(state.session_service.get_session(&id).await)
    }
}
