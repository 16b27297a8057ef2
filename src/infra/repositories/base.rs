//! Query helpers shared by the stores and the transaction-scoped repositories.

use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select};

use crate::errors::AppResult;
use crate::types::PaginationParams;

/// Fetch one page of `select` together with the total row count.
pub(crate) async fn fetch_page<E, C>(
    select: Select<E>,
    db: &C,
    params: &PaginationParams,
) -> AppResult<(Vec<E::Model>, u64)>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync,
    C: ConnectionTrait,
{
    let paginator = select.paginate(db, params.limit());
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(params.page.saturating_sub(1)).await?;
    Ok((data, total))
}
