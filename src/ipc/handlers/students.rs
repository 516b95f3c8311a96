use crate::assemble::{self, ExamPolicy};
use crate::eligibility;
use crate::error::AppError;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{get_nullable_f64, get_optional_bool, get_optional_text, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, DuplicatePolicy, StudentFields};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn ensure_identity_free(
    conn: &Connection,
    fields: &StudentFields,
    student_id: &str,
) -> Result<(), HandlerErr> {
    if let Some(existing) = DuplicatePolicy::RegNumberOrEmail.find_other(
        conn,
        &fields.reg_number,
        &fields.email,
        Some(student_id),
    )? {
        return Err(HandlerErr::with_details(
            AppError::Conflict("Another student has this registration number or email".to_string()),
            json!({
                "studentId": existing.id,
                "regNumber": existing.reg_number,
                "email": existing.email,
            }),
        ));
    }
    Ok(())
}

fn handle_students_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let students: Vec<serde_json::Value> = records::list_students(conn)?
        .into_iter()
        .map(|s| {
            let eligibility = eligibility::view(s.attendance, s.fees_paid);
            json!({ "student": s, "eligibility": eligibility })
        })
        .collect();
    Ok(json!({ "students": students }))
}

/// Student-facing registration view: identity, eligibility, and the same
/// merged subject list the hall ticket carries. Reading never creates an exam
/// record.
fn handle_students_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let Some(student) = records::find_student(conn, &student_id)? else {
        return Err(AppError::not_found("Student not found").into());
    };

    let subjects = match assemble::assemble_subjects(conn, &student, ExamPolicy::ReadOnly) {
        Ok(list) => list,
        Err(AppError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let history = records::attendance_history(conn, &student.reg_number)?;
    let eligibility = eligibility::view(student.attendance, student.fees_paid);

    Ok(json!({
        "student": student,
        "eligibility": eligibility,
        "subjects": subjects,
        "attendanceHistory": history,
    }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let p = &req.params;
    let student_id = get_required_str(p, "studentId")?;
    let Some(current) = records::find_student(conn, &student_id)? else {
        return Err(AppError::not_found("Student not found").into());
    };

    let mut fields = StudentFields::from(current.clone());
    if let Some(reg) = get_optional_text(p, "regNumber")? {
        if reg.is_empty() {
            return Err(AppError::validation("regNumber must not be empty").into());
        }
        fields.reg_number = reg;
    }
    if let Some(name) = get_optional_text(p, "name")? {
        if name.is_empty() {
            return Err(AppError::validation("name must not be empty").into());
        }
        fields.name = name;
    }
    if let Some(v) = get_optional_text(p, "email")? {
        fields.email = v;
    }
    if let Some(v) = get_optional_text(p, "department")? {
        fields.department = v;
    }
    if let Some(v) = get_optional_text(p, "semester")? {
        fields.semester = v;
    }
    if let Some(v) = get_nullable_f64(p, "attendance")? {
        fields.attendance = v;
    }
    if let Some(v) = get_optional_bool(p, "feesPaid")? {
        fields.fees_paid = v;
    }
    if fields.reg_number != current.reg_number || fields.email != current.email {
        ensure_identity_free(conn, &fields, &student_id)?;
    }

    records::update_student(conn, &student_id, &fields)?;
    let student = records::find_student(conn, &student_id)?
        .ok_or_else(|| AppError::not_found("Student not found"))?;
    info!(student_id = %student.id, "student updated");
    let eligibility = eligibility::view(student.attendance, student.fees_paid);
    Ok(json!({
        "message": "Student updated successfully",
        "student": student,
        "eligibility": eligibility,
    }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let student_id = get_required_str(&req.params, "studentId")?;
    if records::delete_student(conn, &student_id)? == 0 {
        return Err(AppError::not_found("Student not found").into());
    }
    info!(student_id = %student_id, "student removed");
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.get" => handle_students_get(state, req),
        "students.update" => handle_students_update(state, req),
        "students.delete" => handle_students_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
