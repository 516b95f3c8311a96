use crate::error::AppError;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{get_optional_text, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, SubjectFields, SubjectKind};
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::info;

fn parse_kind(params: &Value) -> Result<Option<SubjectKind>, HandlerErr> {
    match get_optional_text(params, "type")? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => SubjectKind::parse(&raw)
            .map(Some)
            .ok_or_else(|| HandlerErr::from(AppError::validation("type must be regular or arrear"))),
    }
}

fn ensure_code_free(conn: &Connection, code: &str, except_id: Option<&str>) -> Result<(), HandlerErr> {
    if let Some(existing) = records::find_subject_by_code(conn, code)? {
        if except_id != Some(existing.id.as_str()) {
            return Err(HandlerErr::with_details(
                AppError::Conflict("Subject code already exists".to_string()),
                json!({ "subjectId": existing.id, "code": code }),
            ));
        }
    }
    Ok(())
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let department = get_optional_text(&req.params, "department")?;
    let semester = get_optional_text(&req.params, "semester")?;
    let subjects = records::list_subjects(conn, department.as_deref(), semester.as_deref())?;
    Ok(json!({ "subjects": subjects }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let p = &req.params;
    let fields = SubjectFields {
        code: get_required_str(p, "code")?,
        name: get_required_str(p, "name")?,
        department: get_optional_text(p, "department")?.unwrap_or_default(),
        semester: get_optional_text(p, "semester")?.unwrap_or_default(),
        fees: get_optional_text(p, "fees")?.unwrap_or_default(),
        exam_schedule: get_optional_text(p, "examSchedule")?.unwrap_or_default(),
        kind: parse_kind(p)?.unwrap_or(SubjectKind::Regular),
    };
    ensure_code_free(conn, &fields.code, None)?;

    let id = records::insert_subject(conn, &fields)?;
    let subject = records::find_subject(conn, &id)?
        .ok_or_else(|| AppError::not_found("subject not found"))?;
    info!(code = %subject.code, "subject added");
    Ok(json!({ "message": "Subject added successfully", "subject": subject }))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let p = &req.params;
    let subject_id = get_required_str(p, "subjectId")?;
    let Some(current) = records::find_subject(conn, &subject_id)? else {
        return Err(AppError::not_found("subject not found").into());
    };

    let mut fields = SubjectFields::from(current);
    if let Some(code) = get_optional_text(p, "code")? {
        if code.is_empty() {
            return Err(AppError::validation("code must not be empty").into());
        }
        fields.code = code;
    }
    if let Some(v) = get_optional_text(p, "name")? {
        fields.name = v;
    }
    if let Some(v) = get_optional_text(p, "department")? {
        fields.department = v;
    }
    if let Some(v) = get_optional_text(p, "semester")? {
        fields.semester = v;
    }
    if let Some(v) = get_optional_text(p, "fees")? {
        fields.fees = v;
    }
    if let Some(v) = get_optional_text(p, "examSchedule")? {
        fields.exam_schedule = v;
    }
    if let Some(kind) = parse_kind(p)? {
        fields.kind = kind;
    }
    ensure_code_free(conn, &fields.code, Some(&subject_id))?;

    records::update_subject(conn, &subject_id, &fields)?;
    let subject = records::find_subject(conn, &subject_id)?
        .ok_or_else(|| AppError::not_found("subject not found"))?;
    Ok(json!({ "subject": subject }))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let subject_id = get_required_str(&req.params, "subjectId")?;
    if records::delete_subject(conn, &subject_id)? == 0 {
        return Err(AppError::not_found("subject not found").into());
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => handle_subjects_list(state, req),
        "subjects.create" => handle_subjects_create(state, req),
        "subjects.update" => handle_subjects_update(state, req),
        "subjects.delete" => handle_subjects_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
