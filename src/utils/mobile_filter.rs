use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{PoisonError, RwLock};

use crate::utils::name_match::normalize_mobile;

/// Expected capacity and false-positive rate.
/// Tune these based on real roster sizes.
const FILTER_CAPACITY: usize = 50_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static MOBILE_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

fn key(mobile: &str) -> Option<String> {
    normalize_mobile(mobile)
}

/// Check if a mobile might already be registered (false positives possible)
pub fn might_exist(mobile: &str) -> bool {
    let Some(key) = key(mobile) else {
        return false;
    };
    MOBILE_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&key)
}

pub fn insert(mobile: &str) {
    if let Some(key) = key(mobile) {
        MOBILE_FILTER
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&key);
    }
}

pub fn remove(mobile: &str) {
    if let Some(key) = key(mobile) {
        MOBILE_FILTER
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }
}

/// true  => mobile is free
/// false => a cleaner already uses it
pub async fn is_mobile_available(mobile: &str, pool: &MySqlPool) -> bool {
    // Cuckoo filter gives a fast negative
    if !might_exist(mobile) {
        return true;
    }

    // Stored numbers are free text, so compare on the normalised form.
    let Some(wanted) = key(mobile) else {
        return true;
    };
    let suffix = format!("%{}", &wanted[wanted.len().saturating_sub(7)..]);

    let candidates = sqlx::query_scalar::<_, String>("SELECT mobile FROM cleaners WHERE mobile LIKE ?")
        .bind(&suffix)
        .fetch_all(pool)
        .await;

    match candidates {
        Ok(rows) => !rows.iter().any(|m| key(m).as_deref() == Some(wanted.as_str())),
        Err(e) => {
            tracing::error!(error = %e, "Mobile lookup failed");
            // the unique key still guards the insert
            true
        }
    }
}

/// Warm up the mobile filter using streaming + batching
pub async fn warmup_mobile_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>("SELECT mobile FROM cleaners").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (mobile,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        if let Some(key) = key(&mobile) {
            batch.push(key);
            total += 1;
        }

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("Mobile filter warmup complete: {} cleaners", total);
    Ok(())
}

fn insert_batch(keys: &[String]) {
    let mut filter = MOBILE_FILTER.write().unwrap_or_else(PoisonError::into_inner);

    for key in keys {
        filter.add(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_on_normalised_numbers() {
        insert("+44 7911 123456");
        assert!(might_exist("07911123456"));
        assert!(might_exist("0044 7911 123 456"));

        remove("07911 123456");
        assert!(!might_exist("+447911123456"));
    }

    #[test]
    fn unparseable_numbers_are_never_present() {
        assert!(!might_exist("n/a"));
    }
}
