use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "exam.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    // Records are linked by value (registration number, subject code), never by
    // declared foreign keys.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            reg_number TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            department TEXT NOT NULL DEFAULT '',
            semester TEXT NOT NULL DEFAULT '',
            attendance REAL,
            fees_paid INTEGER NOT NULL DEFAULT 0,
            exam_registered INTEGER NOT NULL DEFAULT 0,
            exam_subjects TEXT NOT NULL DEFAULT '[]',
            arrears TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_reg ON students(reg_number)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_email ON students(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            department TEXT NOT NULL DEFAULT '',
            semester TEXT NOT NULL DEFAULT '',
            fees TEXT NOT NULL DEFAULT '',
            exam_schedule TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL DEFAULT 'regular',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_dept_sem ON subjects(department, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS arrears(
            id TEXT PRIMARY KEY,
            reg_number TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            department TEXT NOT NULL DEFAULT '',
            semester TEXT NOT NULL DEFAULT '',
            subject_codes TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_arrears_reg ON arrears(reg_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            reg_number TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            department TEXT NOT NULL DEFAULT '',
            semester TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            percentage REAL,
            fees_paid INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_reg ON attendance(reg_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL UNIQUE,
            subject_ids TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}
