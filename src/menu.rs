use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;

/// A numbered console menu. Item `n` in `ITEMS` is chosen by typing `n + 1`.
pub trait Menu: Sized + Copy {
    const TITLE: &'static str;
    const ITEMS: &'static [&'static str];

    fn from_index(index: usize) -> Option<Self>;

    /// Map a typed line to a menu entry.
    fn parse(input: &str) -> Result<Self, InputError> {
        let n = parse_number(input)?;
        usize::try_from(n)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(Self::from_index)
            .ok_or(InputError::UnknownChoice(n))
    }

    fn render() -> String {
        let mut out = format!("\n--- {} ---\n", Self::TITLE);
        for (i, item) in Self::ITEMS.iter().enumerate() {
            out.push_str(&format!("{}. {item}\n", i + 1));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainChoice {
    Doctors,
    Patients,
    Appointments,
    AllData,
    AuditLog,
    Exit,
}

impl Menu for MainChoice {
    const TITLE: &'static str = "Main Menu";
    const ITEMS: &'static [&'static str] = &[
        "Doctor Operations",
        "Patient Operations",
        "Appointment Operations",
        "View All Data",
        "View Audit Log",
        "Exit",
    ];

    fn from_index(index: usize) -> Option<Self> {
        use MainChoice::*;
        [Doctors, Patients, Appointments, AllData, AuditLog, Exit].get(index).copied()
    }
}

impl MainChoice {
    /// Audit action recorded when the entry is selected. Exit is recorded by
    /// the session itself, which also ends on end of input.
    pub fn audit_action(self) -> Option<&'static str> {
        match self {
            MainChoice::Doctors => Some("ACCESSED_DOCTOR_OPERATIONS"),
            MainChoice::Patients => Some("ACCESSED_PATIENT_OPERATIONS"),
            MainChoice::Appointments => Some("ACCESSED_APPOINTMENT_OPERATIONS"),
            MainChoice::AllData => Some("VIEWED_ALL_DATA"),
            MainChoice::AuditLog => Some("VIEWED_AUDIT_LOG"),
            MainChoice::Exit => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorChoice {
    Add,
    ViewAll,
    Specialties,
    FindBySpecialty,
}

impl Menu for DoctorChoice {
    const TITLE: &'static str = "Doctor Operations";
    const ITEMS: &'static [&'static str] = &[
        "Add New Doctor",
        "View All Doctors",
        "View Medical Specialties",
        "Find Doctors by Specialty",
    ];

    fn from_index(index: usize) -> Option<Self> {
        use DoctorChoice::*;
        [Add, ViewAll, Specialties, FindBySpecialty].get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientChoice {
    Add,
    ViewAll,
}

impl Menu for PatientChoice {
    const TITLE: &'static str = "Patient Operations";
    const ITEMS: &'static [&'static str] = &["Add New Patient", "View All Patients"];

    fn from_index(index: usize) -> Option<Self> {
        use PatientChoice::*;
        [Add, ViewAll].get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentChoice {
    Schedule,
    ViewAll,
    UpdateStatus,
    ForDoctor,
    ForPatient,
}

impl Menu for AppointmentChoice {
    const TITLE: &'static str = "Appointment Operations";
    const ITEMS: &'static [&'static str] = &[
        "Schedule New Appointment",
        "View All Appointments",
        "Update Appointment Status",
        "View Appointments for Doctor",
        "View Appointments for Patient",
    ];

    fn from_index(index: usize) -> Option<Self> {
        use AppointmentChoice::*;
        [Schedule, ViewAll, UpdateStatus, ForDoctor, ForPatient].get(index).copied()
    }
}

/// Target status offered by "Update Appointment Status". SCHEDULED is not
/// offered since nothing moves back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChoice {
    Complete,
    Cancel,
}

impl Menu for StatusChoice {
    const TITLE: &'static str = "New Status";
    const ITEMS: &'static [&'static str] = &["COMPLETED", "CANCELLED"];

    fn from_index(index: usize) -> Option<Self> {
        [StatusChoice::Complete, StatusChoice::Cancel].get(index).copied()
    }
}

impl StatusChoice {
    pub fn status(self) -> AppointmentStatus {
        match self {
            StatusChoice::Complete => AppointmentStatus::Completed,
            StatusChoice::Cancel => AppointmentStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditChoice {
    Last10,
    Last20,
    Clear,
}

impl Menu for AuditChoice {
    const TITLE: &'static str = "Audit Log Operations";
    const ITEMS: &'static [&'static str] = &[
        "View Recent Audit Entries (Last 10)",
        "View Recent Audit Entries (Last 20)",
        "Clear Audit Log",
    ];

    fn from_index(index: usize) -> Option<Self> {
        use AuditChoice::*;
        [Last10, Last20, Clear].get(index).copied()
    }
}

// ── Field parsing ─────────────────────────────────────────────

pub fn parse_number(input: &str) -> Result<u64, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    trimmed
        .parse()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))
}

pub fn parse_date(input: &str) -> Result<NaiveDate, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| InputError::BadDate(trimmed.to_string()))
}

pub fn parse_date_time(input: &str) -> Result<NaiveDateTime, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }
    NaiveDateTime::parse_from_str(trimmed, DATE_TIME_FORMAT)
        .map_err(|_| InputError::BadDateTime(trimmed.to_string()))
}

/// Blank means "use the default reason".
pub fn parse_reason(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn parse_confirmation(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    NotANumber(String),
    BadDate(String),
    BadDateTime(String),
    UnknownChoice(u64),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Empty => write!(f, "input required"),
            InputError::NotANumber(s) => write!(f, "'{s}' is not a valid number"),
            InputError::BadDate(s) => write!(f, "'{s}' is not a date, use YYYY-MM-DD"),
            InputError::BadDateTime(s) => {
                write!(f, "'{s}' is not a date and time, use YYYY-MM-DD HH:mm")
            }
            InputError::UnknownChoice(n) => write!(f, "{n} is not a menu option"),
        }
    }
}

impl std::error::Error for InputError {}
