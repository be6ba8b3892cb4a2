use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::OnceCell;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::name_match::CleanerIdentity;

pub type Roster = Arc<Vec<CleanerIdentity>>;

/// Single-entry cache: the whole roster is small and always read together.
static ROSTER_CACHE: OnceCell<Cache<(), Roster>> = OnceCell::new();

const DEFAULT_TTL_SECS: u64 = 60;

fn cache() -> &'static Cache<(), Roster> {
    ROSTER_CACHE.get_or_init(|| build(DEFAULT_TTL_SECS))
}

fn build(ttl_secs: u64) -> Cache<(), Roster> {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
}

/// Sets the TTL before first use; later calls are ignored.
pub fn configure(ttl_secs: u64) {
    let _ = ROSTER_CACHE.set(build(ttl_secs));
}

async fn load(pool: &MySqlPool) -> Result<Roster> {
    let mut stream = sqlx::query_as::<_, (u64, String, Option<String>)>(
        r#"
        SELECT id, name, mobile
        FROM cleaners
        ORDER BY id
        "#,
    )
    .fetch(pool);

    let mut roster = Vec::new();
    while let Some(row) = stream.next().await {
        let (id, name, mobile) = row?;
        roster.push(CleanerIdentity { id, name, mobile });
    }

    Ok(Arc::new(roster))
}

/// Cached roster; a failed load is logged and yields an empty roster.
pub async fn roster(pool: &MySqlPool) -> Roster {
    let loaded = cache()
        .try_get_with((), async { load(pool).await.map_err(|e| e.to_string()) })
        .await;

    match loaded {
        Ok(roster) => roster,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load cleaner roster");
            Arc::new(Vec::new())
        }
    }
}

/// Drop the cached roster after a cleaner write.
pub async fn invalidate() {
    cache().invalidate(&()).await;
}

pub async fn warmup_roster_cache(pool: &MySqlPool) -> Result<()> {
    let roster = load(pool).await?;
    let count = roster.len();
    cache().insert((), roster).await;

    log::info!("Roster cache warmup complete: {} cleaners", count);
    Ok(())
}
