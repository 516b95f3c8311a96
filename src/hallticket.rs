use crate::assemble::{self, ExamPolicy, TicketSubject};
use crate::eligibility;
use crate::error::AppError;
use crate::mail::{AttachmentFile, Mailer, OutboundMail};
use crate::records::Student;
use crate::uploads;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 18.0;
const LINE: f32 = 7.0;

/// Column x offsets for code, name, type and schedule.
const COLUMNS: [f32; 4] = [MARGIN, MARGIN + 28.0, MARGIN + 110.0, MARGIN + 135.0];

struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> Cursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Cursor {
            doc,
            layer,
            y: PAGE_H - MARGIN,
        }
    }

    fn ensure_room(&mut self) {
        if self.y < MARGIN + LINE {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_H - MARGIN;
        }
    }

    fn text(&mut self, x: f32, size: f32, font: &IndirectFontRef, s: &str) {
        self.layer.use_text(s, size, Mm(x), Mm(self.y), font);
    }

    fn line(&mut self, size: f32, font: &IndirectFontRef, s: &str) {
        self.ensure_room();
        self.text(MARGIN, size, font, s);
        self.y -= LINE;
    }

    fn row(&mut self, size: f32, font: &IndirectFontRef, cells: [&str; 4]) {
        self.ensure_room();
        for (x, cell) in COLUMNS.iter().zip(cells) {
            self.text(*x, size, font, cell);
        }
        self.y -= LINE;
    }

    fn gap(&mut self, lines: f32) {
        self.y -= LINE * lines;
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

fn attendance_text(attendance: Option<f64>) -> String {
    match attendance {
        Some(v) => format!("{}%", crate::import::sheet::number_text(v)),
        None => "not recorded".to_string(),
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::Render(e.to_string())
}

/// Renders the hall ticket: heading, identity block, subject table and the
/// attendance/fee summary.
pub fn render_pdf(student: &Student, subjects: &[TicketSubject]) -> Result<Vec<u8>, AppError> {
    let (doc, page, layer) = PdfDocument::new("Hall Ticket", Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(render_err)?;

    let first_layer = doc.get_page(page).get_layer(layer);
    {
        let mut c = Cursor::new(&doc, first_layer);
        c.line(18.0, &bold, "Hall Ticket");
        c.gap(0.5);

        c.line(11.0, &regular, &format!("Name: {}", or_dash(&student.name)));
        c.line(11.0, &regular, &format!("Register No: {}", or_dash(&student.reg_number)));
        c.line(11.0, &regular, &format!("Department: {}", or_dash(&student.department)));
        c.line(11.0, &regular, &format!("Semester: {}", or_dash(&student.semester)));
        c.line(11.0, &regular, &format!("Email: {}", or_dash(&student.email)));
        c.gap(1.0);

        c.line(13.0, &bold, "Subjects to Write");
        c.row(10.0, &bold, ["Code", "Subject", "Type", "Schedule"]);
        for s in subjects {
            let name = clip(&s.name, 44);
            let schedule = clip(&s.exam_schedule, 30);
            c.row(
                10.0,
                &regular,
                [s.code.as_str(), or_dash(&name), s.origin.label(), schedule.as_str()],
            );
        }
        c.gap(1.0);

        c.line(
            11.0,
            &regular,
            &format!(
                "Attendance: {}    Fees Paid: {}",
                attendance_text(student.attendance),
                if student.fees_paid { "Yes" } else { "No" }
            ),
        );
        let status = match eligibility::check(student.attendance, student.fees_paid) {
            Ok(()) => "Eligible to sit the examinations".to_string(),
            Err(why) => format!("Not eligible: {}", why.message()),
        };
        c.line(11.0, &bold, &status);
    }

    doc.save_to_bytes().map_err(render_err)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub email: String,
    pub attachment: String,
    pub subjects: Vec<TicketSubject>,
}

/// Assembles, renders and mails a hall ticket. The rendered file lives in the
/// workspace upload directory only for the duration of this call.
pub fn send_hall_ticket(
    conn: &Connection,
    workspace: &Path,
    mailer: &dyn Mailer,
    student: &Student,
) -> Result<SendReport, AppError> {
    if student.email.trim().is_empty() {
        return Err(AppError::validation("Student has no email address"));
    }

    let subjects = assemble::assemble_subjects(conn, student, ExamPolicy::CreateIfMissing)?;
    let pdf = render_pdf(student, &subjects)?;

    let mut ticket_file = uploads::hall_ticket_file(workspace, &student.id)?;
    ticket_file.write_all(&pdf)?;
    ticket_file.flush()?;

    let attachment = format!("hall_ticket_{}.pdf", student.id);
    let mail = OutboundMail {
        to: student.email.clone(),
        subject: "Your Hall Ticket".to_string(),
        body: format!(
            "Hello {},\n\nYour hall ticket is ready. Please find the attached PDF.\n\nGood luck!\nExam Department",
            student.name
        ),
        attachment: AttachmentFile {
            file_name: attachment.clone(),
            path: ticket_file.path().to_path_buf(),
            content_type: "application/pdf",
        },
    };

    let sent = mailer.send(&mail);
    if let Err(e) = ticket_file.close() {
        warn!(error = %e, "failed to delete hall ticket file");
    }

    sent?;
    info!(student_id = %student.id, email = %student.email, "hall ticket sent");
    Ok(SendReport {
        email: student.email.clone(),
        attachment,
        subjects,
    })
}
