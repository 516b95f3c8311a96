mod common;

use common::Sidecar;
use serde_json::json;

const ATTENDANCE_CSV: &str = "\
Reg No,Name,Dep,Sem,Email,Percentage,Fees Status
21CS001,Asha Raman,CSE,5,asha@example.edu,88,Paid
";

const ARREARS_CSV: &str = "\
Reg No,Name,Dep,Sem,Arrear Sub
21CS001,Asha Raman,CSE,5,CS305
";

fn seed(s: &mut Sidecar) {
    let _ = s.upload_ok("students.csv", common::STUDENTS_CSV, "student_list");
    let _ = s.upload_ok("subjects.csv", common::SUBJECTS_CSV, "subjectname");
    let _ = s.upload_ok("attendance.csv", ATTENDANCE_CSV, "attendance");
    let _ = s.upload_ok("arrears.csv", ARREARS_CSV, "arrear_list");
}

fn student_id(s: &mut Sidecar, reg: &str) -> String {
    s.student_by_reg(reg)["id"]
        .as_str()
        .expect("student id")
        .to_string()
}

#[test]
fn hall_ticket_lists_regular_then_arrear_subjects_and_is_mailed() {
    let mut s = Sidecar::start("examd-hallticket-send");
    seed(&mut s);
    let id = student_id(&mut s, "21CS001");

    let result = s.ok("hallTicket.send", json!({ "studentId": id }));
    assert_eq!(result["message"].as_str(), Some("Hall Ticket sent successfully"));
    assert_eq!(result["email"].as_str(), Some("asha@example.edu"));
    assert_eq!(
        result["attachment"].as_str(),
        Some(format!("hall_ticket_{}.pdf", id).as_str())
    );

    let subjects = result["subjects"].as_array().cloned().unwrap_or_default();
    let rows: Vec<(&str, &str)> = subjects
        .iter()
        .map(|v| (v["code"].as_str().unwrap_or(""), v["type"].as_str().unwrap_or("")))
        .collect();
    assert_eq!(
        rows,
        vec![("CS501", "regular"), ("CS502", "regular"), ("CS305", "arrear")]
    );
    assert_eq!(subjects[1]["examSchedule"].as_str(), Some("Not Scheduled"));
    assert_eq!(subjects[2]["examSchedule"].as_str(), Some("2025-05-14 AN"));

    let mails = s.sent_mails();
    assert_eq!(mails.len(), 1);
    assert!(mails[0].contains("asha@example.edu"));
    assert!(mails[0].contains("Your Hall Ticket"));
    assert!(mails[0].contains("hall_ticket_"));

    assert!(s.upload_dir_entries().is_empty(), "rendered ticket left behind");
    assert_eq!(s.counts()["exams"].as_u64(), Some(1));
}

#[test]
fn exam_record_is_created_once_and_reused() {
    let mut s = Sidecar::start("examd-hallticket-reuse");
    seed(&mut s);
    let id = student_id(&mut s, "21CS001");

    let _ = s.ok("hallTicket.send", json!({ "studentId": id }));
    // A subject added to the curriculum later does not change an existing exam record.
    let _ = s.ok(
        "subjects.create",
        json!({ "code": "CS503", "name": "Cloud Computing", "department": "CSE", "semester": "5" }),
    );
    let second = s.ok("hallTicket.send", json!({ "studentId": id }));
    assert_eq!(second["subjects"].as_array().map(|a| a.len()), Some(3));
    assert_eq!(s.counts()["exams"].as_u64(), Some(1));
    assert_eq!(s.sent_mails().len(), 2);
}

#[test]
fn registration_view_shows_the_same_subjects_without_writing() {
    let mut s = Sidecar::start("examd-hallticket-view");
    seed(&mut s);
    let id = student_id(&mut s, "21CS001");

    let view = s.ok("students.get", json!({ "studentId": id }));
    let codes: Vec<&str> = view["subjects"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v["code"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(codes, vec!["CS501", "CS502", "CS305"]);
    assert_eq!(view["eligibility"]["eligible"].as_bool(), Some(true));
    assert_eq!(s.counts()["exams"].as_u64(), Some(0));

    let (code, _) = s.fail("students.get", json!({ "studentId": "missing" }));
    assert_eq!(code, "not_found");
}

#[test]
fn student_without_subjects_gets_not_found() {
    let mut s = Sidecar::start("examd-hallticket-empty");
    let _ = s.upload_ok(
        "students.csv",
        "Reg No,Name,Email,Dep,Sem\n21ME001,Kiran,kiran@example.edu,MECH,3\n",
        "student_list",
    );
    let id = student_id(&mut s, "21ME001");

    let (code, error) = s.fail("hallTicket.send", json!({ "studentId": id }));
    assert_eq!(code, "not_found");
    assert_eq!(error["message"].as_str(), Some("No subjects found for this student"));
    assert!(s.sent_mails().is_empty());
    assert_eq!(s.counts()["exams"].as_u64(), Some(0));

    let view = s.ok("students.get", json!({ "studentId": id }));
    assert_eq!(view["subjects"], json!([]));
}

#[test]
fn student_without_email_is_rejected() {
    let mut s = Sidecar::start("examd-hallticket-no-email");
    let _ = s.upload_ok(
        "students.csv",
        "Reg No,Name,Email,Dep,Sem\n21CS010,Nomail,,CSE,5\n",
        "student_list",
    );
    let _ = s.upload_ok("subjects.csv", common::SUBJECTS_CSV, "subjectname");
    let id = student_id(&mut s, "21CS010");

    let (code, _) = s.fail("hallTicket.send", json!({ "studentId": id }));
    assert_eq!(code, "bad_params");
    assert!(s.upload_dir_entries().is_empty());
}

#[test]
fn mail_failure_reports_error_and_still_removes_the_ticket_file() {
    let mut s = Sidecar::start_with_env(
        "examd-hallticket-smtp-down",
        &[
            ("EXAMD_MAIL_TRANSPORT", "smtp"),
            ("EXAMD_SMTP_HOST", "127.0.0.1"),
            ("EXAMD_SMTP_PORT", "1"),
            ("EXAMD_SMTP_TLS", "false"),
        ],
    );
    seed(&mut s);
    let id = student_id(&mut s, "21CS001");

    let (code, error) = s.fail("hallTicket.send", json!({ "studentId": id }));
    assert_eq!(code, "mail_failed");
    assert_eq!(error["message"].as_str(), Some("could not send the email"));
    // The transport detail goes to the log, once.
    assert_eq!(s.log_text().matches("failed to send email").count(), 1);
    assert!(s.upload_dir_entries().is_empty(), "rendered ticket left behind");
    // The exam record written before mailing is kept.
    assert_eq!(s.counts()["exams"].as_u64(), Some(1));
}
