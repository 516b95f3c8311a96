use crate::eligibility;
use crate::error::AppError;
use crate::hallticket;
use crate::ipc::error::{respond, HandlerErr, HandlerResult};
use crate::ipc::helpers::{get_required_str, get_string_list};
use crate::ipc::types::{AppState, Request};
use crate::records;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;

fn handle_exam_register(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let requested = get_string_list(&req.params, "subjects")?;

    let Some(student) = records::find_student(conn, &student_id)? else {
        return Err(AppError::not_found("Student not found!").into());
    };
    // Eligibility is decided before the selection is even looked at.
    if let Err(why) = eligibility::check(student.attendance, student.fees_paid) {
        return Err(HandlerErr::with_details(
            AppError::Ineligible(why.message().to_string()),
            json!({ "reason": why }),
        ));
    }

    let mut seen = HashSet::new();
    let codes: Vec<String> = requested
        .into_iter()
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect();
    if codes.is_empty() {
        return Err(AppError::validation("select at least one subject").into());
    }
    let known = records::subjects_by_codes(conn, &codes)?;
    if known.len() != codes.len() {
        let known_codes: HashSet<&str> = known.iter().map(|s| s.code.as_str()).collect();
        let unknown: Vec<&String> = codes
            .iter()
            .filter(|c| !known_codes.contains(c.as_str()))
            .collect();
        return Err(HandlerErr::with_details(
            AppError::validation("unknown subject codes"),
            json!({ "unknown": unknown }),
        ));
    }

    records::set_student_registration(conn, &student.id, &codes)?;
    info!(student_id = %student.id, subjects = codes.len(), "student registered for exams");
    let student = records::find_student(conn, &student.id)?
        .ok_or_else(|| AppError::not_found("Student not found!"))?;
    Ok(json!({
        "message": "Successfully registered for exams",
        "student": student,
    }))
}

fn handle_hall_ticket_send(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = state.conn()?;
    let workspace = state.workspace_path()?;
    let student_id = get_required_str(&req.params, "studentId")?;
    info!(student_id = %student_id, "hall ticket requested");

    let Some(student) = records::find_student(conn, &student_id)? else {
        return Err(AppError::not_found("Student not found").into());
    };
    let report = hallticket::send_hall_ticket(conn, workspace, state.mailer.as_ref(), &student)?;
    Ok(json!({
        "message": "Hall Ticket sent successfully",
        "email": report.email,
        "attachment": report.attachment,
        "subjects": report.subjects,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "exam.register" => handle_exam_register(state, req),
        "hallTicket.send" => handle_hall_ticket_send(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
