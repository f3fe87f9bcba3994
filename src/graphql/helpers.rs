use async_graphql::ErrorExtensions;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Helper to parse UUID from GraphQL ID string
pub fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::ValidationError("Invalid UUID format".to_string()))
}

/// Converts a service result into a GraphQL result that carries the error code
pub fn gql<T>(result: AppResult<T>) -> async_graphql::Result<T> {
    result.map_err(|e| e.extend())
}
