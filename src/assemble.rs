//! Builds the merged subject list a student sits: curriculum subjects for the
//! student's department and semester, followed by arrear subjects resolved
//! from the latest arrear snapshot.

use crate::error::AppError;
use crate::records::{self, ExamRecord, Student, Subject};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

pub const NOT_SCHEDULED: &str = "Not Scheduled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectOrigin {
    Regular,
    Arrear,
}

impl SubjectOrigin {
    pub fn label(self) -> &'static str {
        match self {
            SubjectOrigin::Regular => "Regular",
            SubjectOrigin::Arrear => "Arrear",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSubject {
    pub code: String,
    pub name: String,
    pub fees: String,
    pub exam_schedule: String,
    #[serde(rename = "type")]
    pub origin: SubjectOrigin,
}

impl TicketSubject {
    fn from_subject(s: Subject, origin: SubjectOrigin) -> Self {
        let exam_schedule = if s.exam_schedule.trim().is_empty() {
            NOT_SCHEDULED.to_string()
        } else {
            s.exam_schedule
        };
        TicketSubject {
            code: s.code,
            name: s.name,
            fees: s.fees,
            exam_schedule,
            origin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPolicy {
    /// Persist an exam record from the curriculum if the student has none.
    CreateIfMissing,
    /// Never write; fall back to the curriculum when no exam record exists.
    ReadOnly,
}

fn regular_subjects(
    conn: &Connection,
    student: &Student,
    policy: ExamPolicy,
) -> Result<Vec<Subject>, AppError> {
    if let Some(ExamRecord { subject_ids, .. }) = records::find_exam(conn, &student.id)? {
        return records::subjects_by_ids(conn, &subject_ids);
    }
    let curriculum = records::subjects_for_curriculum(conn, &student.department, &student.semester)?;
    if policy == ExamPolicy::CreateIfMissing && !curriculum.is_empty() {
        let ids: Vec<String> = curriculum.iter().map(|s| s.id.clone()).collect();
        let exam = records::insert_exam(conn, &student.id, &ids)?;
        info!(student_id = %student.id, exam_id = %exam.id, subjects = ids.len(), "exam record created");
    }
    Ok(curriculum)
}

/// Regular subjects first, then arrears; an arrear code already listed as
/// regular is not repeated. Fails with not-found when both lists are empty.
pub fn assemble_subjects(
    conn: &Connection,
    student: &Student,
    policy: ExamPolicy,
) -> Result<Vec<TicketSubject>, AppError> {
    let regular = regular_subjects(conn, student, policy)?;
    let arrear_codes = records::latest_arrear_codes(conn, &student.reg_number)?.unwrap_or_default();
    let arrears = records::subjects_by_codes(conn, &arrear_codes)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(regular.len() + arrears.len());
    for s in regular {
        seen.insert(s.code.clone());
        merged.push(TicketSubject::from_subject(s, SubjectOrigin::Regular));
    }
    for s in arrears {
        if seen.insert(s.code.clone()) {
            merged.push(TicketSubject::from_subject(s, SubjectOrigin::Arrear));
        }
    }

    if merged.is_empty() {
        return Err(AppError::not_found("No subjects found for this student"));
    }
    Ok(merged)
}
