use chrono::{NaiveDate, NaiveDateTime};

use crate::directory::Directory;
use crate::ledger::Ledger;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    UnknownDoctor(PersonId),
    UnknownPatient(PersonId),
    InvalidTime,
    SchedulingConflict {
        doctor_id: PersonId,
        date_time: NaiveDateTime,
    },
    NotFound(AppointmentId),
    InvalidTransition {
        id: AppointmentId,
        current: AppointmentStatus,
    },
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::UnknownDoctor(id) => write!(f, "doctor with ID {id} not found"),
            SchedulingError::UnknownPatient(id) => write!(f, "patient with ID {id} not found"),
            SchedulingError::InvalidTime => {
                write!(f, "appointment date/time must be in the future")
            }
            SchedulingError::SchedulingConflict { doctor_id, date_time } => write!(
                f,
                "doctor {doctor_id} already has an appointment at {}",
                date_time.format(DATE_TIME_FORMAT)
            ),
            SchedulingError::NotFound(id) => write!(f, "appointment ID {id} not found"),
            SchedulingError::InvalidTransition { id, current } => {
                write!(f, "appointment ID {id} cannot be changed (status: {current})")
            }
        }
    }
}

impl std::error::Error for SchedulingError {}

/// Validates scheduling requests against the directory and ledger, and owns
/// the SCHEDULED → COMPLETED / CANCELLED transitions.
///
/// Every operation is split into a pure `check_*` step and an `apply` step,
/// so a caller can persist the resulting [`Event`] in between.
#[derive(Debug, Default)]
pub struct Scheduler {
    directory: Directory,
    ledger: Ledger,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from a sequence of previously persisted events.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut scheduler = Self::new();
        for event in events {
            scheduler.apply(event);
        }
        scheduler
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // ── Registration ─────────────────────────────────────────

    pub fn register_doctor(&mut self, details: PersonDetails, specialty: Specialty) -> Doctor {
        self.directory.register_doctor(details, specialty)
    }

    pub fn register_patient(&mut self, details: PersonDetails, date_of_birth: NaiveDate) -> Patient {
        self.directory.register_patient(details, date_of_birth)
    }

    // ── Validation (pure) ────────────────────────────────────

    /// Run every scheduling check and build the record that `schedule` would
    /// insert. Checks run cheapest first: existence, time, then conflicts.
    pub fn check_schedule(
        &self,
        doctor_id: PersonId,
        patient_id: PersonId,
        date_time: Option<NaiveDateTime>,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Appointment, SchedulingError> {
        if self.directory.find_doctor(doctor_id).is_none() {
            return Err(SchedulingError::UnknownDoctor(doctor_id));
        }
        if self.directory.find_patient(patient_id).is_none() {
            return Err(SchedulingError::UnknownPatient(patient_id));
        }
        let date_time = match date_time {
            Some(dt) if dt > now => dt,
            _ => return Err(SchedulingError::InvalidTime),
        };
        if self.ledger.has_active_conflict(doctor_id, date_time) {
            return Err(SchedulingError::SchedulingConflict { doctor_id, date_time });
        }
        Ok(Appointment::new(
            self.ledger.next_id(),
            doctor_id,
            patient_id,
            date_time,
            reason,
        ))
    }

    pub fn check_transition(
        &self,
        id: AppointmentId,
        target: AppointmentStatus,
    ) -> Result<&Appointment, SchedulingError> {
        let appointment = self.ledger.find(id).ok_or(SchedulingError::NotFound(id))?;
        if !appointment.status().can_transition_to(target) {
            return Err(SchedulingError::InvalidTransition {
                id,
                current: appointment.status(),
            });
        }
        Ok(appointment)
    }

    // ── Mutation ─────────────────────────────────────────────

    pub fn schedule(
        &mut self,
        doctor_id: PersonId,
        patient_id: PersonId,
        date_time: Option<NaiveDateTime>,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.check_schedule(doctor_id, patient_id, date_time, reason, now)?;
        self.ledger.insert(appointment.clone());
        Ok(appointment)
    }

    pub fn cancel(&mut self, id: AppointmentId) -> Result<Appointment, SchedulingError> {
        self.transition(id, AppointmentStatus::Cancelled)
    }

    pub fn complete(&mut self, id: AppointmentId) -> Result<Appointment, SchedulingError> {
        self.transition(id, AppointmentStatus::Completed)
    }

    fn transition(
        &mut self,
        id: AppointmentId,
        target: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        self.check_transition(id, target)?;
        self.ledger
            .set_status(id, target)
            .cloned()
            .ok_or(SchedulingError::NotFound(id))
    }

    /// Apply an event without validation. Callers either replay events that
    /// were validated when first written, or ran the matching `check_*`.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::DoctorRegistered { doctor } => self.directory.insert_doctor(doctor.clone()),
            Event::PatientRegistered { patient } => self.directory.insert_patient(patient.clone()),
            Event::AppointmentScheduled { appointment } => self.ledger.insert(appointment.clone()),
            Event::AppointmentCancelled { id } => {
                self.ledger.set_status(*id, AppointmentStatus::Cancelled);
            }
            Event::AppointmentCompleted { id } => {
                self.ledger.set_status(*id, AppointmentStatus::Completed);
            }
        }
    }

    /// Minimal event list that recreates the current state.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.directory.person_count() + self.ledger.len());
        // Registrations in id order so replay reproduces the shared sequence.
        let mut people: Vec<(PersonId, Event)> = self
            .directory
            .doctors()
            .iter()
            .map(|d| (d.id(), Event::DoctorRegistered { doctor: d.clone() }))
            .chain(
                self.directory
                    .patients()
                    .iter()
                    .map(|p| (p.id(), Event::PatientRegistered { patient: p.clone() })),
            )
            .collect();
        people.sort_by_key(|(id, _)| *id);
        events.extend(people.into_iter().map(|(_, e)| e));

        for a in self.ledger.all_sorted() {
            let mut scheduled = a.clone();
            scheduled.set_status(AppointmentStatus::Scheduled);
            events.push(Event::AppointmentScheduled { appointment: scheduled });
            match a.status() {
                AppointmentStatus::Scheduled => {}
                AppointmentStatus::Completed => events.push(Event::AppointmentCompleted { id: a.id() }),
                AppointmentStatus::Cancelled => events.push(Event::AppointmentCancelled { id: a.id() }),
            }
        }
        events
    }
}
