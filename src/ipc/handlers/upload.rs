use crate::error::AppError;
use crate::import;
use crate::ipc::error::{respond, HandlerResult};
use crate::ipc::helpers::{get_optional_text, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::records;
use crate::uploads;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_upload_import(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let workspace = state.workspace_path()?;

    let file_path = PathBuf::from(get_required_str(&req.params, "filePath")?);
    // The client's original name decides the extension; default to the path itself.
    let file_name = get_optional_text(&req.params, "fileName")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            file_path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });
    let upload_type = get_optional_text(&req.params, "uploadType")?;

    let report = import::import_file(
        conn,
        workspace,
        &file_path,
        &file_name,
        upload_type.as_deref(),
    )?;
    info!(
        upload_type = %report.upload_type,
        inserted = report.summary.inserted,
        failures = report.summary.failures.len(),
        "upload processed"
    );
    Ok(json!({
        "message": "File processed successfully",
        "uploadType": report.upload_type,
        "summary": report.summary,
    }))
}

fn handle_delete_all(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let workspace = state.workspace_path()?;

    let files_removed = uploads::clear_uploads(workspace).map_err(AppError::from)?;
    let deleted = records::delete_all(conn)?;
    info!(
        files = files_removed,
        students = deleted.students,
        arrears = deleted.arrears,
        subjects = deleted.subjects,
        attendance = deleted.attendance,
        exams = deleted.exams,
        "all uploaded data deleted"
    );
    Ok(json!({
        "message": "All uploaded files and data deleted",
        "deleted": deleted,
        "filesRemoved": files_removed,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "upload.import" => Some(respond(&req.id, handle_upload_import(state, req))),
        "data.deleteAll" => Some(respond(&req.id, handle_delete_all(state, req))),
        _ => None,
    }
}
