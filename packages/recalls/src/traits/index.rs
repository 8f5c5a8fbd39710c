//! Search-index collaborator.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::projection::RecallProjection;

/// Receives denormalized projections of displayable recalls.
///
/// The core pushes a projection after every successful extraction of a
/// `published` or `verified` record; it never depends on the index's query
/// capabilities.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index_recall(&self, projection: &RecallProjection) -> StoreResult<()>;
}
