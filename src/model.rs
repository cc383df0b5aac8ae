use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub type PersonId = u64;
pub type AppointmentId = u64;

pub const DEFAULT_REASON: &str = "Routine Checkup";

/// Display format for appointment date-times, also the console input format.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {} {}, {}", self.street, self.city, self.zip_code, self.country)
    }
}

/// Medical specialty. Two specialties are the same iff their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Specialty(pub String);

impl Specialty {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Specialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attributes shared by doctors and patients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub contact: ContactInfo,
    pub address: Address,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Registration input: everything but the identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDetails {
    pub first_name: String,
    pub last_name: String,
    pub contact: ContactInfo,
    pub address: Address,
}

impl PersonDetails {
    pub(crate) fn into_person(self, id: PersonId) -> Person {
        Person {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            contact: self.contact,
            address: self.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub person: Person,
    pub specialty: Specialty,
}

impl Doctor {
    pub fn id(&self) -> PersonId {
        self.person.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub person: Person,
    pub date_of_birth: NaiveDate,
}

impl Patient {
    pub fn id(&self) -> PersonId {
        self.person.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Doctor,
    Patient,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Doctor => f.write_str("Doctor"),
            Role::Patient => f.write_str("Patient"),
        }
    }
}

/// A directory entry of either role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonRef<'a> {
    Doctor(&'a Doctor),
    Patient(&'a Patient),
}

impl<'a> PersonRef<'a> {
    pub fn role(&self) -> Role {
        match self {
            PersonRef::Doctor(_) => Role::Doctor,
            PersonRef::Patient(_) => Role::Patient,
        }
    }

    pub fn person(&self) -> &'a Person {
        match self {
            PersonRef::Doctor(d) => &d.person,
            PersonRef::Patient(p) => &p.person,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    /// SCHEDULED may move to COMPLETED or CANCELLED; nothing else moves.
    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        matches!(
            (self, target),
            (AppointmentStatus::Scheduled, AppointmentStatus::Completed)
                | (AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An appointment. Doctor and patient are fixed at construction; only the
/// status changes afterwards, and only through the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    id: AppointmentId,
    doctor_id: PersonId,
    patient_id: PersonId,
    date_time: NaiveDateTime,
    reason: String,
    status: AppointmentStatus,
}

impl Appointment {
    pub fn new(
        id: AppointmentId,
        doctor_id: PersonId,
        patient_id: PersonId,
        date_time: NaiveDateTime,
        reason: Option<String>,
    ) -> Self {
        Self {
            id,
            doctor_id,
            patient_id,
            date_time,
            reason: reason.unwrap_or_else(|| DEFAULT_REASON.to_string()),
            status: AppointmentStatus::Scheduled,
        }
    }

    pub fn id(&self) -> AppointmentId {
        self.id
    }

    pub fn doctor_id(&self) -> PersonId {
        self.doctor_id
    }

    pub fn patient_id(&self) -> PersonId {
        self.patient_id
    }

    pub fn date_time(&self) -> NaiveDateTime {
        self.date_time
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    /// Ledger ordering key: date-time first, id breaks ties.
    pub fn sort_key(&self) -> (NaiveDateTime, AppointmentId) {
        (self.date_time, self.id)
    }

    pub(crate) fn set_status(&mut self, status: AppointmentStatus) {
        self.status = status;
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    DoctorRegistered { doctor: Doctor },
    PatientRegistered { patient: Patient },
    AppointmentScheduled { appointment: Appointment },
    AppointmentCancelled { id: AppointmentId },
    AppointmentCompleted { id: AppointmentId },
}

impl Event {
    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Event::DoctorRegistered { .. } => "doctor_registered",
            Event::PatientRegistered { .. } => "patient_registered",
            Event::AppointmentScheduled { .. } => "appointment_scheduled",
            Event::AppointmentCancelled { .. } => "appointment_cancelled",
            Event::AppointmentCompleted { .. } => "appointment_completed",
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// An appointment with its participants' names resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentInfo {
    pub appointment: Appointment,
    pub doctor_name: String,
    pub patient_name: String,
}

impl std::fmt::Display for AppointmentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let a = &self.appointment;
        write!(
            f,
            "ID: {} | {} | {} | Doctor: {} (ID: {}) | Patient: {} (ID: {}) | Reason: '{}'",
            a.id(),
            a.date_time().format(DATE_TIME_FORMAT),
            a.status(),
            self.doctor_name,
            a.doctor_id(),
            self.patient_name,
            a.patient_id(),
            a.reason()
        )
    }
}
