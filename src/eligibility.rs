use serde::Serialize;

/// Minimum attendance percentage required to sit exams.
pub const MIN_ATTENDANCE: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Ineligibility {
    LowAttendance,
    FeesUnpaid,
}

impl Ineligibility {
    pub fn message(self) -> &'static str {
        match self {
            Ineligibility::LowAttendance => "Attendance is less than 75%",
            Ineligibility::FeesUnpaid => "Fees are not paid",
        }
    }
}

/// The registration rule: attendance of at least 75% and fees paid.
///
/// A student with no recorded attendance counts as 0%. Attendance is checked
/// first, so a student failing both conditions is reported for attendance.
pub fn check(attendance: Option<f64>, fees_paid: bool) -> Result<(), Ineligibility> {
    let attendance = attendance.unwrap_or(0.0);
    // NaN compares false both ways; treat it as below the threshold.
    if !(attendance >= MIN_ATTENDANCE) {
        return Err(Ineligibility::LowAttendance);
    }
    if !fees_paid {
        return Err(Ineligibility::FeesUnpaid);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityView {
    pub eligible: bool,
    pub reason: Option<Ineligibility>,
    pub message: Option<&'static str>,
}

pub fn view(attendance: Option<f64>, fees_paid: bool) -> EligibilityView {
    match check(attendance, fees_paid) {
        Ok(()) => EligibilityView {
            eligible: true,
            reason: None,
            message: None,
        },
        Err(why) => EligibilityView {
            eligible: false,
            reason: Some(why),
            message: Some(why.message()),
        },
    }
}
