use sqlx::MySqlPool;

use crate::error::ApiResult;
use crate::model::task::{AreaTask, pick_checklist};
use crate::utils::area_classifier::AreaCategory;

async fn rows_for(
    pool: &MySqlPool,
    category: AreaCategory,
    customer: Option<&str>,
) -> ApiResult<Vec<AreaTask>> {
    let rows = sqlx::query_as::<_, AreaTask>(
        r#"
        SELECT id, area_category, customer_name, task_name, is_required, sort_order
        FROM area_tasks
        WHERE area_category = ? AND (customer_name IS NULL OR customer_name = ?)
        "#,
    )
    .bind(category.as_ref())
    .bind(customer)
    .fetch_all(pool)
    .await?;

    Ok(pick_checklist(rows, customer))
}

/// Tasks for an area; categories nobody configured fall back to the general list.
pub async fn load(
    pool: &MySqlPool,
    category: AreaCategory,
    customer: Option<&str>,
) -> ApiResult<Vec<AreaTask>> {
    let tasks = rows_for(pool, category, customer).await?;
    if !tasks.is_empty() || category == AreaCategory::General {
        return Ok(tasks);
    }

    tracing::debug!(category = category.as_ref(), "No tasks configured, using general list");
    rows_for(pool, AreaCategory::General, customer).await
}
