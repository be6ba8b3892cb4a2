use sqlx::MySqlPool;

use crate::error::ApiResult;
use crate::model::qr_code::QrCodeRecord;
use crate::qr::QrPayload;

/// A scanned payload after stored metadata has been applied.
#[derive(Debug, Clone)]
pub struct ResolvedScan {
    pub payload: QrPayload,
    pub qr_code_id: Option<u64>,
}

pub async fn find_by_uid(pool: &MySqlPool, code_uid: &str) -> ApiResult<Option<QrCodeRecord>> {
    let record = sqlx::query_as::<_, QrCodeRecord>(
        r#"
        SELECT id, code_uid, qr_type, customer_name, building_name, area_label,
               area_category, metadata, NULL AS qr_image, created_by, created_at
        FROM building_qr_codes
        WHERE code_uid = ?
        "#,
    )
    .bind(code_uid)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Codes we issued are looked up so the stored metadata overrides what was printed.
/// Unknown codes are still usable with whatever they carry.
pub async fn resolve(pool: &MySqlPool, payload: QrPayload) -> ApiResult<ResolvedScan> {
    let Some(code_uid) = payload.code_uid.as_deref() else {
        return Ok(ResolvedScan {
            payload,
            qr_code_id: None,
        });
    };

    match find_by_uid(pool, code_uid).await? {
        Some(record) => Ok(ResolvedScan {
            payload: record.payload(),
            qr_code_id: Some(record.id),
        }),
        None => {
            tracing::warn!(code_uid, "Scanned QR code is not registered");
            Ok(ResolvedScan {
                payload,
                qr_code_id: None,
            })
        }
    }
}
