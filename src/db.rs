use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};
use crate::models::{ReportData, SaveOutcome, SavedReportSummary};

pub const LIST_LIMIT: i64 = 15;

/// Most recently saved first; re-saving a report moves it to the top.
const LIST_REPORTS_SQL: &str =
    "SELECT id, title, created_at FROM reports ORDER BY updated_at DESC, created_at DESC LIMIT $1";

pub async fn init_db(pool: &PgPool) -> ReportResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ReportError::Store(e.to_string()))?;
    Ok(())
}

/// Title used when the caller does not supply one.
pub fn default_title(data: &ReportData) -> String {
    let date = data.saved_at.format("%Y-%m-%d");
    match data
        .customer_info
        .as_ref()
        .map(|c| c.display_name())
        .filter(|name| !name.is_empty())
    {
        Some(name) => format!("{name} - {date}"),
        None => format!("Installation report - {date}"),
    }
}

pub fn resolve_title(title: Option<&str>, data: &ReportData) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_string(),
        None => default_title(data),
    }
}

pub fn validate_for_save(data: &ReportData) -> Result<(), String> {
    if data.customer_info.is_none() {
        return Err("Customer information is required before saving".to_string());
    }
    Ok(())
}

/// Inserts a new report or replaces an existing one. Concurrent saves of the
/// same id are last-write-wins.
pub async fn save_report(
    pool: &PgPool,
    id: Option<Uuid>,
    title: Option<&str>,
    data: &ReportData,
) -> SaveOutcome {
    if let Err(message) = validate_for_save(data) {
        return SaveOutcome::failed(message);
    }

    let id = id.unwrap_or_else(Uuid::new_v4);
    let title = resolve_title(title, data);

    let result = sqlx::query(
        r#"
        INSERT INTO reports (id, title, data)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
        SET title = EXCLUDED.title, data = EXCLUDED.data, updated_at = NOW()
        "#,
    )
    .bind(id)
    .bind(&title)
    .bind(Json(data))
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            tracing::info!(%id, %title, "saved report");
            SaveOutcome::saved(id)
        }
        Err(err) => {
            tracing::warn!(%id, error = %err, "report save failed");
            SaveOutcome::failed(format!("Failed to save report: {err}"))
        }
    }
}

pub async fn load_report(pool: &PgPool, id: Uuid) -> ReportResult<(String, ReportData)> {
    let row = sqlx::query("SELECT title, data FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ReportError::NotFound(format!("report {id}")))?;

    let title: String = row.try_get("title")?;
    let Json(data): Json<ReportData> = row.try_get("data")?;
    Ok((title, data))
}

pub async fn list_reports(pool: &PgPool) -> ReportResult<Vec<SavedReportSummary>> {
    let records = sqlx::query(LIST_REPORTS_SQL)
        .bind(LIST_LIMIT)
        .fetch_all(pool)
        .await?;

    let mut reports = Vec::with_capacity(records.len());
    for row in records {
        reports.push(SavedReportSummary {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
        });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomerInfo;
    use chrono::{TimeZone, Utc};

    fn data(customer: Option<CustomerInfo>) -> ReportData {
        ReportData {
            customer_info: customer,
            installation_data: Vec::new(),
            toilet_count: 0,
            report_notes: String::new(),
            saved_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn save_requires_customer_info() {
        assert!(validate_for_save(&data(None)).is_err());
        assert!(validate_for_save(&data(Some(CustomerInfo::default()))).is_ok());
    }

    #[test]
    fn default_title_prefers_property_name() {
        let customer = CustomerInfo {
            customer_name: "Dana Reyes".to_string(),
            property_name: "Cedar Court".to_string(),
            ..CustomerInfo::default()
        };
        assert_eq!(default_title(&data(Some(customer))), "Cedar Court - 2026-03-14");
        assert_eq!(
            default_title(&data(Some(CustomerInfo::default()))),
            "Installation report - 2026-03-14"
        );
    }

    #[test]
    fn explicit_title_wins_unless_blank() {
        let d = data(None);
        assert_eq!(resolve_title(Some(" Spring audit "), &d), "Spring audit");
        assert_eq!(resolve_title(Some("  "), &d), "Installation report - 2026-03-14");
    }

    #[test]
    fn listing_follows_last_save() {
        assert!(LIST_REPORTS_SQL.contains("ORDER BY updated_at DESC"));
        assert!(LIST_REPORTS_SQL.ends_with("LIMIT $1"));
    }
}
