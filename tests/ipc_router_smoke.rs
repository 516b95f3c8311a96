mod common;

use common::Sidecar;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let mut s = Sidecar::start("examd-router-smoke");

    let health = s.ok("health", json!({}));
    assert_eq!(health["mailTransport"].as_str(), Some("file"));
    assert_eq!(health["counts"]["students"].as_u64(), Some(0));

    let _ = s.upload_ok("students.csv", common::STUDENTS_CSV, "student_list");
    let _ = s.upload_ok("subjects.csv", common::SUBJECTS_CSV, "subjectname");

    for method in [
        "subjects.list",
        "students.list",
        "students.get",
        "students.update",
        "students.delete",
        "subjects.create",
        "subjects.update",
        "subjects.delete",
        "exam.register",
        "hallTicket.send",
    ] {
        let value = s.call(method, json!({}));
        if value["ok"].as_bool() == Some(false) {
            assert_ne!(
                value["error"]["code"].as_str(),
                Some("not_implemented"),
                "unexpected unknown method for {}",
                method
            );
        }
    }

    let (code, _) = s.fail("grades.compute", json!({}));
    assert_eq!(code, "not_implemented");
}

#[test]
fn broken_lines_get_bad_json_and_the_loop_keeps_going() {
    let mut s = Sidecar::start("examd-bad-json");
    let value = s.send_line("{not json");
    assert_eq!(value["ok"].as_bool(), Some(false));
    assert_eq!(value["error"]["code"].as_str(), Some("bad_json"));

    let health = s.ok("health", json!({}));
    assert!(health["workspacePath"].as_str().is_some());
}

#[test]
fn data_methods_require_a_workspace() {
    let root = common::temp_dir("examd-no-workspace");
    let mut child = Command::new(env!("CARGO_BIN_EXE_examd"))
        .env_remove("EXAMD_CONFIG")
        .env_remove("EXAMD_WORKSPACE")
        .env("EXAMD_MAIL_TRANSPORT", "file")
        .env("EXAMD_MAIL_DIR", root.join("outbox"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examd");

    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));

    for (i, method) in ["students.list", "subjects.list", "data.deleteAll"].iter().enumerate() {
        let payload = json!({ "id": i.to_string(), "method": method, "params": {} });
        writeln!(stdin, "{}", payload).expect("write request");
        stdin.flush().expect("flush request");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read response line");
        let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value["error"]["code"].as_str(), Some("no_workspace"), "{}", method);
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(root);
}
