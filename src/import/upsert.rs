use super::sheet::SheetRow;
use crate::error::AppError;
use crate::records::{self, DuplicatePolicy, NewArrear, NewAttendance, NewStudent, SubjectFields, SubjectKind};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub rows: usize,
    pub inserted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<usize>,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Inserted,
    Skipped,
    /// Row lacked its key fields; dropped without counting.
    Ignored,
    /// A snapshot row was written; `matched` tells whether a student was updated too.
    Logged { matched: bool },
}

#[derive(Debug, Default)]
struct Tally {
    rows: usize,
    inserted: usize,
    skipped: usize,
    matched: usize,
    unmatched: usize,
    failures: Vec<RowFailure>,
}

/// Runs `apply` for every row inside its own transaction. A failing row is
/// rolled back and recorded; the rest of the batch still runs.
fn run_rows<F>(conn: &Connection, rows: &[SheetRow], mut apply: F) -> Tally
where
    F: FnMut(&Connection, &SheetRow) -> Result<RowOutcome, AppError>,
{
    let mut tally = Tally {
        rows: rows.len(),
        ..Tally::default()
    };
    for row in rows {
        let result = conn
            .unchecked_transaction()
            .map_err(AppError::from)
            .and_then(|tx| {
                let outcome = apply(&*tx, row)?;
                tx.commit()?;
                Ok(outcome)
            });
        match result {
            Ok(RowOutcome::Inserted) => tally.inserted += 1,
            Ok(RowOutcome::Skipped) => tally.skipped += 1,
            Ok(RowOutcome::Ignored) => debug!(row = row.line, "row missing key fields, ignored"),
            Ok(RowOutcome::Logged { matched }) => {
                tally.inserted += 1;
                if matched {
                    tally.matched += 1;
                } else {
                    tally.unmatched += 1;
                }
            }
            Err(e) => {
                warn!(row = row.line, error = %e, "row failed");
                tally.failures.push(RowFailure {
                    row: row.line,
                    message: e.to_string(),
                });
            }
        }
    }
    tally
}

fn required_reg_number(row: &SheetRow) -> Result<&str, AppError> {
    row.field("reg no")
        .ok_or_else(|| AppError::validation("missing reg no"))
}

pub fn import_students(conn: &Connection, rows: &[SheetRow]) -> ImportSummary {
    let tally = run_rows(conn, rows, |conn, row| {
        let (Some(reg), Some(name)) = (row.field("reg no"), row.field("name")) else {
            return Ok(RowOutcome::Ignored);
        };
        let email = row.text("email");
        if DuplicatePolicy::RegNumberOrEmail
            .find(conn, reg, email)?
            .is_some()
        {
            return Ok(RowOutcome::Skipped);
        }
        records::insert_student(
            conn,
            &NewStudent {
                reg_number: reg,
                name,
                email,
                department: row.text("dep"),
                semester: row.text("sem"),
            },
        )?;
        Ok(RowOutcome::Inserted)
    });
    ImportSummary {
        rows: tally.rows,
        inserted: tally.inserted,
        skipped: Some(tally.skipped),
        failures: tally.failures,
        ..ImportSummary::default()
    }
}

/// Splits an `arrear sub` cell such as `"CS301, CS305"` into codes.
pub fn parse_arrear_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn import_arrears(conn: &Connection, rows: &[SheetRow]) -> ImportSummary {
    let tally = run_rows(conn, rows, |conn, row| {
        let reg = required_reg_number(row)?;
        let codes = parse_arrear_codes(row.text("arrear sub"));
        let matched = records::set_student_arrears(conn, reg, &codes)? > 0;
        records::insert_arrear(
            conn,
            &NewArrear {
                reg_number: reg,
                name: row.text("name"),
                department: row.text("dep"),
                semester: row.text("sem"),
                subject_codes: &codes,
            },
        )?;
        if !matched {
            debug!(row = row.line, reg_number = reg, "arrear row has no matching student");
        }
        Ok(RowOutcome::Logged { matched })
    });
    ImportSummary {
        rows: tally.rows,
        inserted: tally.inserted,
        unmatched: Some(tally.unmatched),
        failures: tally.failures,
        ..ImportSummary::default()
    }
}

pub fn import_subjects(conn: &Connection, rows: &[SheetRow]) -> ImportSummary {
    let tally = run_rows(conn, rows, |conn, row| {
        let Some(code) = row.field("subject code") else {
            return Ok(RowOutcome::Ignored);
        };
        if records::find_subject_by_code(conn, code)?.is_some() {
            return Ok(RowOutcome::Skipped);
        }
        let kind = match row.field("type") {
            Some(raw) => SubjectKind::parse(raw)
                .ok_or_else(|| AppError::validation(format!("unknown subject type: {raw}")))?,
            None => SubjectKind::Regular,
        };
        records::insert_subject(
            conn,
            &SubjectFields {
                code: code.to_string(),
                name: row.text("subject name").to_string(),
                department: row.text("dept").to_string(),
                semester: row.text("sem").to_string(),
                fees: row.text("cost").to_string(),
                exam_schedule: row.text("exam schedule").to_string(),
                kind,
            },
        )?;
        Ok(RowOutcome::Inserted)
    });
    ImportSummary {
        rows: tally.rows,
        inserted: tally.inserted,
        skipped: Some(tally.skipped),
        failures: tally.failures,
        ..ImportSummary::default()
    }
}

/// `"Paid"`, `" paid "` and `"PAID"` count as paid; anything else does not.
pub fn fees_paid_from_status(raw: Option<&str>) -> bool {
    raw.map(|s| s.trim().to_lowercase() == "paid")
        .unwrap_or(false)
}

/// Percentages are taken as given; a missing or non-numeric cell clears the value.
pub fn parse_percentage(raw: Option<&str>) -> Option<f64> {
    raw.map(|s| s.trim().trim_end_matches('%').trim())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

pub fn import_attendance(conn: &Connection, rows: &[SheetRow]) -> ImportSummary {
    let tally = run_rows(conn, rows, |conn, row| {
        let reg = required_reg_number(row)?;
        let fees_paid = fees_paid_from_status(row.field("fees status"));
        let percentage = parse_percentage(row.field("percentage"));
        let matched = records::set_student_attendance(conn, reg, percentage, fees_paid)? > 0;
        records::insert_attendance(
            conn,
            &NewAttendance {
                reg_number: reg,
                name: row.text("name"),
                department: row.text("dep"),
                semester: row.text("sem"),
                email: row.text("email"),
                percentage,
                fees_paid,
            },
        )?;
        Ok(RowOutcome::Logged { matched })
    });
    ImportSummary {
        rows: tally.rows,
        inserted: tally.inserted,
        updated: Some(tally.matched),
        failures: tally.failures,
        ..ImportSummary::default()
    }
}
