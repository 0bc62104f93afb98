use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ReportError;
use crate::models::RawAttendanceRow;
use crate::window::YearMonth;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts a July 2025 month of weekday attendance for a small team.
pub async fn seed(pool: &PgPool) -> anyhow::Result<u64> {
    let employees = [
        ("E101", "Avery Lee"),
        ("E102", "Jules Moreno"),
        ("E103", "Kiara Patel"),
        ("E104", "Noah Fischer"),
        ("E105", "Priya Raman"),
        ("E106", "Tomas Silva"),
    ];

    let month = YearMonth::new(2025, 7)?;
    let mut inserted = 0u64;

    for (idx, (employee_id, name)) in employees.iter().enumerate() {
        for date in weekdays(month) {
            let status = seed_status(idx, date);
            let result = sqlx::query(
                r#"
                INSERT INTO attendance.attendance_logs
                (employee_id, name, date, status, source_key)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(*employee_id)
            .bind(*name)
            .bind(date)
            .bind(status)
            .bind(format!("seed-{employee_id}-{date}"))
            .execute(pool)
            .await?;
            inserted += result.rows_affected();
        }
    }

    Ok(inserted)
}

fn weekdays(month: YearMonth) -> impl Iterator<Item = NaiveDate> {
    let end = month.next_first_day();
    std::iter::successors(Some(month.first_day()), |day| Some(*day + Duration::days(1)))
        .take_while(move |day| *day < end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
}

fn seed_status(employee_idx: usize, date: NaiveDate) -> &'static str {
    match (date.day() as usize + employee_idx * 3) % 11 {
        0 => "Absent",
        1 if employee_idx % 2 == 0 => "Leave",
        4 if employee_idx == 3 => "Absent",
        _ => "Present",
    }
}

/// All rows dated inside `month`, in insertion order.
pub async fn fetch_month(
    pool: &PgPool,
    month: YearMonth,
) -> Result<Vec<RawAttendanceRow>, ReportError> {
    let records = sqlx::query(
        r#"
        SELECT employee_id, name, to_char(date, 'YYYY-MM-DD') AS date, status
        FROM attendance.attendance_logs
        WHERE date >= $1 AND date < $2
        ORDER BY id
        "#,
    )
    .bind(month.first_day())
    .bind(month.next_first_day())
    .fetch_all(pool)
    .await
    .map_err(|err| ReportError::source_unavailable(format!("querying attendance for {month}"), err))?;

    let mut rows = Vec::with_capacity(records.len());
    for (idx, row) in records.iter().enumerate() {
        rows.push(RawAttendanceRow {
            row: idx + 1,
            employee_id: column(row, "employee_id")?,
            name: column(row, "name")?,
            date: column(row, "date")?,
            status: column(row, "status")?,
        });
    }

    debug!(%month, rows = rows.len(), "fetched attendance rows");
    Ok(rows)
}

fn column(row: &sqlx::postgres::PgRow, name: &str) -> Result<Option<String>, ReportError> {
    row.try_get(name)
        .map_err(|err| ReportError::source_unavailable(format!("decoding column {name}"), err))
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        employee_id: String,
        name: String,
        date: NaiveDate,
        status: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", idx + 1))?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO attendance.attendance_logs
            (employee_id, name, date, status, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(&row.employee_id)
        .bind(&row.name)
        .bind(row.date)
        .bind(&row.status)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "imported attendance rows");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekdays_skip_weekends() {
        let month = YearMonth::new(2025, 7).unwrap();
        let days: Vec<NaiveDate> = weekdays(month).collect();
        assert_eq!(days.len(), 23);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert!(days
            .iter()
            .all(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn seed_statuses_mix_outcomes() {
        let month = YearMonth::new(2025, 7).unwrap();
        let statuses: Vec<&str> = (0..6)
            .flat_map(|idx| weekdays(month).map(move |day| seed_status(idx, day)))
            .collect();
        assert!(statuses.contains(&"Present"));
        assert!(statuses.contains(&"Absent"));
        assert!(statuses.contains(&"Leave"));
    }
}
