#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}-{}",
        prefix,
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// A running `examd` with a fresh workspace and a file-backed outbox.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    pub root: PathBuf,
    pub workspace: PathBuf,
    pub mail_dir: PathBuf,
}

impl Sidecar {
    pub fn start(prefix: &str) -> Self {
        Self::start_with_env(prefix, &[])
    }

    pub fn start_with_env(prefix: &str, env: &[(&str, &str)]) -> Self {
        let root = temp_dir(prefix);
        let workspace = root.join("workspace");
        let mail_dir = root.join("outbox");

        let log = std::fs::File::create(root.join("examd.log")).expect("create log file");
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_examd"));
        cmd.env_remove("EXAMD_CONFIG")
            .env("NO_COLOR", "1")
            .env_remove("EXAMD_WORKSPACE")
            .env("EXAMD_MAIL_TRANSPORT", "file")
            .env("EXAMD_MAIL_DIR", &mail_dir);
        for (k, v) in env {
            cmd.env(k, v);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log))
            .spawn()
            .expect("spawn examd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");

        let mut sidecar = Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            root,
            workspace,
            mail_dir,
        };
        let ws = sidecar.workspace.to_string_lossy().to_string();
        sidecar.ok("workspace.select", json!({ "path": ws }));
        sidecar
    }

    pub fn send_line(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn call(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.call(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Expects a failure; returns the error code and the error object.
    pub fn fail(&mut self, method: &str, params: Value) -> (String, Value) {
        let value = self.call(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().unwrap_or_else(|| json!({}));
        let code = error
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        (code, error)
    }

    /// Writes a file outside the workspace, the way a client hands over an upload.
    pub fn write_incoming(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let dir = self.root.join("incoming");
        std::fs::create_dir_all(&dir).expect("create incoming dir");
        let p = dir.join(name);
        std::fs::write(&p, contents).expect("write incoming file");
        p
    }

    pub fn upload(&mut self, name: &str, contents: impl AsRef<[u8]>, upload_type: &str) -> Value {
        let path = self.write_incoming(name, contents);
        self.call(
            "upload.import",
            json!({
                "filePath": path.to_string_lossy(),
                "fileName": name,
                "uploadType": upload_type,
            }),
        )
    }

    pub fn upload_ok(&mut self, name: &str, contents: impl AsRef<[u8]>, upload_type: &str) -> Value {
        let value = self.upload(name, contents, upload_type);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "upload {} failed: {}",
            name,
            value
        );
        value["result"]["summary"].clone()
    }

    /// Everything the sidecar has logged to stderr so far.
    pub fn log_text(&self) -> String {
        std::fs::read_to_string(self.root.join("examd.log")).unwrap_or_default()
    }

    pub fn upload_dir_entries(&self) -> Vec<PathBuf> {
        list_dir(&self.workspace.join("uploads"))
    }

    pub fn sent_mails(&self) -> Vec<String> {
        list_dir(&self.mail_dir)
            .into_iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("eml"))
            .map(|p| std::fs::read_to_string(p).expect("read mail"))
            .collect()
    }

    pub fn counts(&mut self) -> Value {
        self.ok("health", json!({}))["counts"].clone()
    }

    pub fn student_by_reg(&mut self, reg: &str) -> Value {
        let listed = self.ok("students.list", json!({}));
        listed["students"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry["student"].clone())
            .find(|s| s["regNumber"].as_str() == Some(reg))
            .unwrap_or_else(|| panic!("student {} not found", reg))
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn fixture(name: &str) -> Vec<u8> {
    let p = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(&p).unwrap_or_else(|e| panic!("read fixture {}: {}", p.display(), e))
}

pub const STUDENTS_CSV: &str = "\
Reg No,Name,Email,Dep,Sem
21CS001,Asha Raman,asha@example.edu,CSE,5
21CS002,Ravi Kumar,ravi@example.edu,CSE,5
21CS003,Meena Iyer,meena@example.edu,CSE,5
";

pub const SUBJECTS_CSV: &str = "\
Subject Code,Subject Name,Dept,Sem,Cost,Exam Schedule
CS501,Compiler Design,CSE,5,600,2025-05-10 FN
CS502,Computer Networks,CSE,5,600,
CS305,Data Structures,CSE,3,450,2025-05-14 AN
CS306,Discrete Maths,CSE,3,450,2025-05-16 FN
";
