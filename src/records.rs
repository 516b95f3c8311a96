use crate::error::AppError;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn list_column(r: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = r.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn list_json(items: &[String]) -> Result<String, AppError> {
    Ok(serde_json::to_string(items)?)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ---------------------------------------------------------------------------
// Students

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub reg_number: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub semester: String,
    pub attendance: Option<f64>,
    pub fees_paid: bool,
    pub exam_registered: bool,
    pub exam_subjects: Vec<String>,
    pub arrears: Vec<String>,
    pub created_at: String,
}

const STUDENT_COLUMNS: &str = "id, reg_number, name, email, department, semester, attendance,
     fees_paid, exam_registered, exam_subjects, arrears, created_at";

fn student_from_row(r: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        reg_number: r.get(1)?,
        name: r.get(2)?,
        email: r.get(3)?,
        department: r.get(4)?,
        semester: r.get(5)?,
        attendance: r.get(6)?,
        fees_paid: r.get::<_, i64>(7)? != 0,
        exam_registered: r.get::<_, i64>(8)? != 0,
        exam_subjects: list_column(r, 9)?,
        arrears: list_column(r, 10)?,
        created_at: r.get(11)?,
    })
}

pub struct NewStudent<'a> {
    pub reg_number: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub department: &'a str,
    pub semester: &'a str,
}

/// How an imported student row is matched against existing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Same registration number, or same email when the row has one.
    RegNumberOrEmail,
}

impl DuplicatePolicy {
    pub fn find(
        self,
        conn: &Connection,
        reg_number: &str,
        email: &str,
    ) -> Result<Option<Student>, AppError> {
        self.find_other(conn, reg_number, email, None)
    }

    /// Like `find`, but never reports the student `except_id` itself.
    pub fn find_other(
        self,
        conn: &Connection,
        reg_number: &str,
        email: &str,
        except_id: Option<&str>,
    ) -> Result<Option<Student>, AppError> {
        match self {
            DuplicatePolicy::RegNumberOrEmail => {
                let sql = format!(
                    "SELECT {STUDENT_COLUMNS} FROM students
                     WHERE (reg_number = ?1 OR (?2 <> '' AND email = ?2))
                       AND (?3 IS NULL OR id <> ?3)
                     ORDER BY rowid
                     LIMIT 1"
                );
                Ok(conn
                    .query_row(&sql, params![reg_number, email, except_id], student_from_row)
                    .optional()?)
            }
        }
    }
}

pub fn insert_student(conn: &Connection, s: &NewStudent) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, reg_number, name, email, department, semester,
                              attendance, fees_paid, exam_registered, exam_subjects, arrears, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 0, 0, 0, '[]', '[]', ?)",
        params![
            id,
            s.reg_number,
            s.name,
            s.email,
            s.department,
            s.semester,
            now()
        ],
    )?;
    Ok(id)
}

pub fn find_student(conn: &Connection, id: &str) -> Result<Option<Student>, AppError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    Ok(conn.query_row(&sql, [id], student_from_row).optional()?)
}

pub fn list_students(conn: &Connection) -> Result<Vec<Student>, AppError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY reg_number, rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Admin-editable student fields. Registration state and arrears are not
/// edited here.
#[derive(Debug, Clone)]
pub struct StudentFields {
    pub reg_number: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub semester: String,
    pub attendance: Option<f64>,
    pub fees_paid: bool,
}

impl From<Student> for StudentFields {
    fn from(s: Student) -> Self {
        StudentFields {
            reg_number: s.reg_number,
            name: s.name,
            email: s.email,
            department: s.department,
            semester: s.semester,
            attendance: s.attendance,
            fees_paid: s.fees_paid,
        }
    }
}

pub fn update_student(conn: &Connection, id: &str, f: &StudentFields) -> Result<usize, AppError> {
    Ok(conn.execute(
        "UPDATE students
         SET reg_number = ?, name = ?, email = ?, department = ?, semester = ?,
             attendance = ?, fees_paid = ?
         WHERE id = ?",
        params![
            f.reg_number,
            f.name,
            f.email,
            f.department,
            f.semester,
            f.attendance,
            f.fees_paid as i64,
            id
        ],
    )?)
}

/// Removes a student and its exam record. Arrear and attendance snapshots are
/// history and stay.
pub fn delete_student(conn: &Connection, id: &str) -> Result<usize, AppError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM exams WHERE student_id = ?", [id])?;
    let removed = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(removed)
}

/// Replaces the arrear list of every student with this registration number.
/// Returns how many students matched.
pub fn set_student_arrears(
    conn: &Connection,
    reg_number: &str,
    codes: &[String],
) -> Result<usize, AppError> {
    Ok(conn.execute(
        "UPDATE students SET arrears = ? WHERE reg_number = ?",
        params![list_json(codes)?, reg_number],
    )?)
}

/// Overwrites the live attendance and fee status. Returns how many students matched.
pub fn set_student_attendance(
    conn: &Connection,
    reg_number: &str,
    attendance: Option<f64>,
    fees_paid: bool,
) -> Result<usize, AppError> {
    Ok(conn.execute(
        "UPDATE students SET attendance = ?, fees_paid = ? WHERE reg_number = ?",
        params![attendance, fees_paid as i64, reg_number],
    )?)
}

pub fn set_student_registration(
    conn: &Connection,
    student_id: &str,
    subject_codes: &[String],
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE students SET exam_registered = 1, exam_subjects = ? WHERE id = ?",
        params![list_json(subject_codes)?, student_id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subjects

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Regular,
    Arrear,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Regular => "regular",
            SubjectKind::Arrear => "arrear",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "regular" => Some(SubjectKind::Regular),
            "arrear" => Some(SubjectKind::Arrear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    pub department: String,
    pub semester: String,
    pub fees: String,
    pub exam_schedule: String,
    #[serde(rename = "type")]
    pub kind: SubjectKind,
    pub created_at: String,
}

const SUBJECT_COLUMNS: &str =
    "id, code, name, department, semester, fees, exam_schedule, kind, created_at";

fn subject_from_row(r: &Row) -> rusqlite::Result<Subject> {
    let kind: String = r.get(7)?;
    Ok(Subject {
        id: r.get(0)?,
        code: r.get(1)?,
        name: r.get(2)?,
        department: r.get(3)?,
        semester: r.get(4)?,
        fees: r.get(5)?,
        exam_schedule: r.get(6)?,
        kind: SubjectKind::parse(&kind).unwrap_or(SubjectKind::Regular),
        created_at: r.get(8)?,
    })
}

/// Editable subject fields, shared by import, admin create and admin update.
#[derive(Debug, Clone)]
pub struct SubjectFields {
    pub code: String,
    pub name: String,
    pub department: String,
    pub semester: String,
    pub fees: String,
    pub exam_schedule: String,
    pub kind: SubjectKind,
}

impl From<Subject> for SubjectFields {
    fn from(s: Subject) -> Self {
        SubjectFields {
            code: s.code,
            name: s.name,
            department: s.department,
            semester: s.semester,
            fees: s.fees,
            exam_schedule: s.exam_schedule,
            kind: s.kind,
        }
    }
}

pub fn insert_subject(conn: &Connection, f: &SubjectFields) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, code, name, department, semester, fees, exam_schedule, kind, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            f.code,
            f.name,
            f.department,
            f.semester,
            f.fees,
            f.exam_schedule,
            f.kind.as_str(),
            now()
        ],
    )?;
    Ok(id)
}

pub fn update_subject(conn: &Connection, id: &str, f: &SubjectFields) -> Result<usize, AppError> {
    Ok(conn.execute(
        "UPDATE subjects
         SET code = ?, name = ?, department = ?, semester = ?, fees = ?, exam_schedule = ?, kind = ?
         WHERE id = ?",
        params![
            f.code,
            f.name,
            f.department,
            f.semester,
            f.fees,
            f.exam_schedule,
            f.kind.as_str(),
            id
        ],
    )?)
}

pub fn delete_subject(conn: &Connection, id: &str) -> Result<usize, AppError> {
    Ok(conn.execute("DELETE FROM subjects WHERE id = ?", [id])?)
}

pub fn find_subject(conn: &Connection, id: &str) -> Result<Option<Subject>, AppError> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?");
    Ok(conn.query_row(&sql, [id], subject_from_row).optional()?)
}

pub fn find_subject_by_code(conn: &Connection, code: &str) -> Result<Option<Subject>, AppError> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE code = ?");
    Ok(conn.query_row(&sql, [code], subject_from_row).optional()?)
}

pub fn list_subjects(
    conn: &Connection,
    department: Option<&str>,
    semester: Option<&str>,
) -> Result<Vec<Subject>, AppError> {
    let sql = format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects
         WHERE (?1 IS NULL OR department = ?1) AND (?2 IS NULL OR semester = ?2)
         ORDER BY code"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![department, semester], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Subjects of a department/semester curriculum, in insertion order.
pub fn subjects_for_curriculum(
    conn: &Connection,
    department: &str,
    semester: &str,
) -> Result<Vec<Subject>, AppError> {
    let sql = format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects
         WHERE department = ? AND semester = ?
         ORDER BY rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![department, semester], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn subjects_where_in(
    conn: &Connection,
    column: &str,
    keys: &[String],
    key_of: fn(&Subject) -> &str,
) -> Result<Vec<Subject>, AppError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE {column} IN ({})",
        placeholders(keys.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map(params_from_iter(keys.iter()), subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    // Keep the caller's order; unknown keys drop out.
    let mut by_key: HashMap<String, Subject> = found
        .into_iter()
        .map(|s| (key_of(&s).to_string(), s))
        .collect();
    Ok(keys.iter().filter_map(|k| by_key.remove(k)).collect())
}

pub fn subjects_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<Subject>, AppError> {
    subjects_where_in(conn, "id", ids, |s| s.id.as_str())
}

pub fn subjects_by_codes(conn: &Connection, codes: &[String]) -> Result<Vec<Subject>, AppError> {
    subjects_where_in(conn, "code", codes, |s| s.code.as_str())
}

// ---------------------------------------------------------------------------
// Arrear and attendance snapshots

pub struct NewArrear<'a> {
    pub reg_number: &'a str,
    pub name: &'a str,
    pub department: &'a str,
    pub semester: &'a str,
    pub subject_codes: &'a [String],
}

pub fn insert_arrear(conn: &Connection, a: &NewArrear) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO arrears(id, reg_number, name, department, semester, subject_codes, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            a.reg_number,
            a.name,
            a.department,
            a.semester,
            list_json(a.subject_codes)?,
            now()
        ],
    )?;
    Ok(id)
}

/// Subject codes from the most recent arrear snapshot for a registration number.
pub fn latest_arrear_codes(
    conn: &Connection,
    reg_number: &str,
) -> Result<Option<Vec<String>>, AppError> {
    Ok(conn
        .query_row(
            "SELECT subject_codes FROM arrears WHERE reg_number = ? ORDER BY rowid DESC LIMIT 1",
            [reg_number],
            |r| list_column(r, 0),
        )
        .optional()?)
}

pub struct NewAttendance<'a> {
    pub reg_number: &'a str,
    pub name: &'a str,
    pub department: &'a str,
    pub semester: &'a str,
    pub email: &'a str,
    pub percentage: Option<f64>,
    pub fees_paid: bool,
}

pub fn insert_attendance(conn: &Connection, a: &NewAttendance) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO attendance(id, reg_number, name, department, semester, email, percentage, fees_paid, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            a.reg_number,
            a.name,
            a.department,
            a.semester,
            a.email,
            a.percentage,
            a.fees_paid as i64,
            now()
        ],
    )?;
    Ok(id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub percentage: Option<f64>,
    pub fees_paid: bool,
    pub created_at: String,
}

pub fn attendance_history(
    conn: &Connection,
    reg_number: &str,
) -> Result<Vec<AttendanceEntry>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT percentage, fees_paid, created_at
         FROM attendance
         WHERE reg_number = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([reg_number], |r| {
            Ok(AttendanceEntry {
                percentage: r.get(0)?,
                fees_paid: r.get::<_, i64>(1)? != 0,
                created_at: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Exams

#[derive(Debug, Clone)]
pub struct ExamRecord {
    pub id: String,
    pub subject_ids: Vec<String>,
}

pub fn find_exam(conn: &Connection, student_id: &str) -> Result<Option<ExamRecord>, AppError> {
    Ok(conn
        .query_row(
            "SELECT id, subject_ids FROM exams WHERE student_id = ?",
            [student_id],
            |r| {
                Ok(ExamRecord {
                    id: r.get(0)?,
                    subject_ids: list_column(r, 1)?,
                })
            },
        )
        .optional()?)
}

pub fn insert_exam(
    conn: &Connection,
    student_id: &str,
    subject_ids: &[String],
) -> Result<ExamRecord, AppError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO exams(id, student_id, subject_ids, created_at) VALUES(?, ?, ?, ?)",
        params![id, student_id, list_json(subject_ids)?, now()],
    )?;
    Ok(ExamRecord {
        id,
        subject_ids: subject_ids.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Bulk

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub students: usize,
    pub arrears: usize,
    pub subjects: usize,
    pub attendance: usize,
    pub exams: usize,
}

const BULK_TABLES: [&str; 5] = ["students", "arrears", "subjects", "attendance", "exams"];

fn counts_from(values: [usize; 5]) -> RecordCounts {
    RecordCounts {
        students: values[0],
        arrears: values[1],
        subjects: values[2],
        attendance: values[3],
        exams: values[4],
    }
}

pub fn count_all(conn: &Connection) -> Result<RecordCounts, AppError> {
    let mut values = [0usize; 5];
    for (slot, table) in values.iter_mut().zip(BULK_TABLES) {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        *slot = n as usize;
    }
    Ok(counts_from(values))
}

/// Deletes every record of every kind. Each table is cleared independently.
pub fn delete_all(conn: &Connection) -> Result<RecordCounts, AppError> {
    let mut values = [0usize; 5];
    for (slot, table) in values.iter_mut().zip(BULK_TABLES) {
        *slot = conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    Ok(counts_from(values))
}
