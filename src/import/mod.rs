pub mod sheet;
pub mod upsert;

use crate::error::AppError;
use crate::uploads;
use rusqlite::Connection;
use serde::Serialize;
use sheet::{SheetFormat, SheetRow};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};
use upsert::ImportSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    StudentList,
    ArrearList,
    Attendance,
    #[serde(rename = "subjectname")]
    SubjectName,
}

impl UploadType {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadType::StudentList => "student_list",
            UploadType::ArrearList => "arrear_list",
            UploadType::Attendance => "attendance",
            UploadType::SubjectName => "subjectname",
        }
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadType {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "student_list" => Ok(UploadType::StudentList),
            "arrear_list" => Ok(UploadType::ArrearList),
            "attendance" => Ok(UploadType::Attendance),
            "subjectname" => Ok(UploadType::SubjectName),
            _ => Err(AppError::validation("Invalid upload type")),
        }
    }
}

/// Sends normalized rows to the upsert routine for their upload type.
pub fn route_rows(conn: &Connection, upload_type: UploadType, rows: &[SheetRow]) -> ImportSummary {
    match upload_type {
        UploadType::StudentList => upsert::import_students(conn, rows),
        UploadType::ArrearList => upsert::import_arrears(conn, rows),
        UploadType::Attendance => upsert::import_attendance(conn, rows),
        UploadType::SubjectName => upsert::import_subjects(conn, rows),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub upload_type: UploadType,
    pub summary: ImportSummary,
}

/// Full upload pipeline: stage the file, check extension and type, parse,
/// normalize and upsert. The staged copy is gone when this returns, whatever
/// the outcome.
pub fn import_file(
    conn: &Connection,
    workspace: &Path,
    source: &Path,
    file_name: &str,
    upload_type: Option<&str>,
) -> Result<ImportReport, AppError> {
    if !source.is_file() {
        return Err(AppError::validation("No file uploaded"));
    }
    let extension = uploads::extension_of(file_name);
    let staged = uploads::stage_upload(workspace, source, &extension)?;

    let result = process_staged(conn, staged.path(), file_name, &extension, upload_type);
    if let Err(e) = staged.close() {
        warn!(error = %e, "failed to remove staged upload");
    }
    result
}

fn process_staged(
    conn: &Connection,
    staged: &Path,
    file_name: &str,
    extension: &str,
    upload_type: Option<&str>,
) -> Result<ImportReport, AppError> {
    let format = SheetFormat::from_extension(extension)
        .ok_or_else(|| AppError::validation("Unsupported file type"))?;
    let upload_type: UploadType = upload_type.unwrap_or("").parse()?;
    let rows = sheet::read_rows(staged, format)?;
    info!(file = file_name, upload_type = %upload_type, rows = rows.len(), "processing upload");
    let summary = route_rows(conn, upload_type, &rows);
    Ok(ImportReport {
        upload_type,
        summary,
    })
}
