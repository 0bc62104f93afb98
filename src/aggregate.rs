use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::ReportError;
use crate::models::{AttendanceRecord, EmployeeSummary, RankedSubset, SummaryTable, PRESENT};

/// Occurrences of one status for one employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub employee_id: String,
    pub name: String,
    pub status: String,
    pub count: u32,
}

/// Builds the wide summary table for a month of records.
pub fn aggregate(records: &[AttendanceRecord]) -> Result<SummaryTable, ReportError> {
    check_identities(records)?;

    let statuses = status_vocabulary(records);
    let counts = group_counts(records);
    let rows = pivot_wide(&counts, &statuses)
        .into_iter()
        .map(|(employee_id, name, counts)| {
            let total_days = counts.values().sum();
            let attendance_pct = attendance_pct(&counts, total_days);
            EmployeeSummary {
                employee_id,
                name,
                counts,
                total_days,
                attendance_pct,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        employees = rows.len(),
        statuses = statuses.len(),
        "aggregated attendance records"
    );

    Ok(SummaryTable { statuses, rows })
}

/// Fails when one employee_id is recorded under more than one name.
pub fn check_identities(records: &[AttendanceRecord]) -> Result<(), ReportError> {
    let mut names: HashMap<&str, &str> = HashMap::new();

    for record in records {
        let known = names
            .entry(record.employee_id.as_str())
            .or_insert(record.name.as_str());
        if *known != record.name {
            return Err(ReportError::IdentityConflict {
                employee_id: record.employee_id.clone(),
                first_name: known.to_string(),
                conflicting_name: record.name.clone(),
            });
        }
    }

    Ok(())
}

/// Distinct statuses in first-seen order.
pub fn status_vocabulary(records: &[AttendanceRecord]) -> Vec<String> {
    let mut statuses: Vec<String> = Vec::new();
    for record in records {
        if !statuses.iter().any(|status| *status == record.status) {
            statuses.push(record.status.clone());
        }
    }
    statuses
}

/// Counts records per (employee_id, name, status), keeping first-seen order.
pub fn group_counts(records: &[AttendanceRecord]) -> Vec<StatusCount> {
    let mut index: HashMap<(&str, &str, &str), usize> = HashMap::new();
    let mut counts: Vec<StatusCount> = Vec::new();

    for record in records {
        let key = (
            record.employee_id.as_str(),
            record.name.as_str(),
            record.status.as_str(),
        );
        let slot = *index.entry(key).or_insert_with(|| {
            counts.push(StatusCount {
                employee_id: record.employee_id.clone(),
                name: record.name.clone(),
                status: record.status.clone(),
                count: 0,
            });
            counts.len() - 1
        });
        counts[slot].count += 1;
    }

    counts
}

/// Reshapes grouped counts to one entry per employee with every status
/// present. A status the employee never had is zero, not absent.
pub fn pivot_wide(
    counts: &[StatusCount],
    statuses: &[String],
) -> Vec<(String, String, BTreeMap<String, u32>)> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: Vec<(String, String, BTreeMap<String, u32>)> = Vec::new();

    for entry in counts {
        let key = (entry.employee_id.as_str(), entry.name.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            let zeroed = statuses.iter().map(|status| (status.clone(), 0)).collect();
            rows.push((entry.employee_id.clone(), entry.name.clone(), zeroed));
            rows.len() - 1
        });
        *rows[slot].2.entry(entry.status.clone()).or_insert(0) += entry.count;
    }

    rows
}

/// Share of `Present` days, rounded to two decimals. Zero when the
/// employee has no days or the status never occurs.
pub fn attendance_pct(counts: &BTreeMap<String, u32>, total_days: u32) -> f64 {
    if total_days == 0 {
        return 0.0;
    }
    let present = counts.get(PRESENT).copied().unwrap_or(0);
    round2(f64::from(present) / f64::from(total_days))
}

/// Top `n` rows by attendance percentage. Ties keep table order.
pub fn rank(table: &SummaryTable, n: usize) -> RankedSubset {
    let mut ranked = table.rows.clone();
    ranked.sort_by(|a, b| {
        b.attendance_pct
            .partial_cmp(&a.attendance_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(n);
    ranked
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn record(employee_id: &str, name: &str, day: u32, status: &str) -> AttendanceRecord {
        AttendanceRecord {
            employee_id: employee_id.to_string(),
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            status: status.to_string(),
        }
    }

    fn mixed_month() -> Vec<AttendanceRecord> {
        vec![
            record("E1", "Alice", 1, "Present"),
            record("E2", "Bram", 1, "Absent"),
            record("E1", "Alice", 2, "Leave"),
            record("E3", "Chen", 1, "Present"),
            record("E2", "Bram", 2, "Present"),
            record("E1", "Alice", 3, "Present"),
            record("E3", "Chen", 2, "Present"),
            record("E2", "Bram", 3, "Absent"),
        ]
    }

    #[test]
    fn single_employee_half_present() {
        let records = vec![
            record("E1", "Alice", 1, "Present"),
            record("E1", "Alice", 2, "Absent"),
        ];

        let table = aggregate(&records).unwrap();
        assert_eq!(table.statuses, vec!["Present", "Absent"]);
        assert_eq!(table.len(), 1);

        let row = &table.rows[0];
        assert_eq!(row.employee_id, "E1");
        assert_eq!(row.name, "Alice");
        assert_eq!(row.count("Present"), 1);
        assert_eq!(row.count("Absent"), 1);
        assert_eq!(row.total_days, 2);
        assert_eq!(row.attendance_pct, 0.5);
    }

    #[test]
    fn full_attendance_ties_keep_input_order() {
        let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let names = ["Ines", "Jon", "Kai", "Lena", "Milo"];
        let mut records = Vec::new();
        for day in 0..20 {
            for (idx, name) in names.iter().enumerate() {
                records.push(AttendanceRecord {
                    employee_id: format!("E{idx}"),
                    name: name.to_string(),
                    date: start + Duration::days(day),
                    status: "Present".to_string(),
                });
            }
        }

        let table = aggregate(&records).unwrap();
        assert!(table.rows.iter().all(|row| row.attendance_pct == 1.0));
        assert!(table.rows.iter().all(|row| row.total_days == 20));

        let ranked = rank(&table, 5);
        let ranked_names: Vec<&str> = ranked.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(ranked_names, names);
    }

    #[test]
    fn no_present_days_yields_zero() {
        let records = vec![
            record("E4", "Dana", 1, "Absent"),
            record("E4", "Dana", 2, "Leave"),
            record("E5", "Eli", 1, "Present"),
        ];

        let table = aggregate(&records).unwrap();
        let dana = table.rows.iter().find(|row| row.employee_id == "E4").unwrap();
        assert_eq!(dana.count("Present"), 0);
        assert!(dana.counts.contains_key("Present"));
        assert_eq!(dana.attendance_pct, 0.0);
    }

    #[test]
    fn vocabulary_without_present_is_zero_everywhere() {
        let records = vec![
            record("E1", "Alice", 1, "Remote"),
            record("E2", "Bram", 1, "Absent"),
        ];

        let table = aggregate(&records).unwrap();
        assert!(!table.statuses.iter().any(|status| status == PRESENT));
        assert!(table.rows.iter().all(|row| row.attendance_pct == 0.0));
    }

    #[test]
    fn empty_window_is_not_an_error() {
        let table = aggregate(&[]).unwrap();
        assert!(table.is_empty());
        assert!(table.statuses.is_empty());
        assert!(rank(&table, 5).is_empty());
    }

    #[test]
    fn identity_conflict_is_reported() {
        let records = vec![
            record("E9", "Bob", 1, "Present"),
            record("E9", "Robert", 2, "Present"),
        ];

        let err = aggregate(&records).unwrap_err();
        match err {
            ReportError::IdentityConflict {
                employee_id,
                first_name,
                conflicting_name,
            } => {
                assert_eq!(employee_id, "E9");
                assert_eq!(first_name, "Bob");
                assert_eq!(conflicting_name, "Robert");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_are_zero_filled_and_totals_match_record_counts() {
        let records = mixed_month();
        let table = aggregate(&records).unwrap();

        assert_eq!(table.statuses, vec!["Present", "Absent", "Leave"]);
        for row in &table.rows {
            assert_eq!(row.counts.len(), table.statuses.len());
            assert_eq!(row.counts.values().sum::<u32>(), row.total_days);
            let in_window = records
                .iter()
                .filter(|r| r.employee_id == row.employee_id)
                .count() as u32;
            assert_eq!(row.total_days, in_window);
            assert!((0.0..=1.0).contains(&row.attendance_pct));
        }

        let chen = table.rows.iter().find(|row| row.name == "Chen").unwrap();
        assert_eq!(chen.count("Absent"), 0);
        assert_eq!(chen.count("Leave"), 0);
    }

    #[test]
    fn rows_follow_first_seen_employee_order() {
        let table = aggregate(&mixed_month()).unwrap();
        let ids: Vec<&str> = table.rows.iter().map(|row| row.employee_id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2", "E3"]);
    }

    #[test]
    fn percentages_round_to_two_decimals() {
        let table = aggregate(&mixed_month()).unwrap();
        let alice = &table.rows[0];
        assert_eq!(alice.total_days, 3);
        assert_eq!(alice.attendance_pct, 0.67);
        let bram = &table.rows[1];
        assert_eq!(bram.attendance_pct, 0.33);
    }

    #[test]
    fn aggregate_is_idempotent() {
        let records = mixed_month();
        assert_eq!(aggregate(&records).unwrap(), aggregate(&records).unwrap());
    }

    #[test]
    fn group_counts_uses_three_keys() {
        let counts = group_counts(&mixed_month());
        let alice_present = counts
            .iter()
            .find(|c| c.employee_id == "E1" && c.status == "Present")
            .unwrap();
        assert_eq!(alice_present.count, 2);
        assert_eq!(counts.len(), 5);
    }

    #[test]
    fn rank_sorts_descending_and_truncates() {
        let table = aggregate(&mixed_month()).unwrap();

        let ranked = rank(&table, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Chen");
        assert_eq!(ranked[1].name, "Alice");

        let all = rank(&table, 10);
        assert_eq!(all.len(), table.len());
        assert!(all
            .windows(2)
            .all(|pair| pair[0].attendance_pct >= pair[1].attendance_pct));
    }

    #[test]
    fn rank_is_stable_for_equal_percentages() {
        let records = vec![
            record("E1", "Alice", 1, "Present"),
            record("E1", "Alice", 2, "Absent"),
            record("E2", "Bram", 1, "Present"),
            record("E3", "Chen", 1, "Absent"),
            record("E3", "Chen", 2, "Present"),
        ];
        let table = aggregate(&records).unwrap();

        let ranked = rank(&table, 5);
        let names: Vec<&str> = ranked.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["Bram", "Alice", "Chen"]);
    }

    #[test]
    fn exact_halves_round_to_even() {
        let one_eighth = BTreeMap::from([("Present".to_string(), 1), ("Absent".to_string(), 7)]);
        assert_eq!(attendance_pct(&one_eighth, 8), 0.12);

        let five_eighths = BTreeMap::from([("Present".to_string(), 5), ("Absent".to_string(), 3)]);
        assert_eq!(attendance_pct(&five_eighths, 8), 0.62);

        let three_eighths = BTreeMap::from([("Present".to_string(), 3), ("Leave".to_string(), 5)]);
        assert_eq!(attendance_pct(&three_eighths, 8), 0.38);
    }

    #[test]
    fn zero_total_days_guarded() {
        let counts = BTreeMap::from([("Present".to_string(), 0)]);
        assert_eq!(attendance_pct(&counts, 0), 0.0);
    }
}
