use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::oneshot;
use tracing::info;

use crate::limits::*;
use crate::model::*;
use crate::scheduler::SchedulingError;

use super::{now, Engine, EngineError, WalCommand};

fn validate_details(details: &PersonDetails) -> Result<(), EngineError> {
    if details.first_name.len() > MAX_NAME_LEN || details.last_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    let contact_fields = [
        &details.contact.phone,
        &details.contact.email,
        &details.address.street,
        &details.address.city,
        &details.address.zip_code,
        &details.address.country,
    ];
    if contact_fields.iter().any(|f| f.len() > MAX_CONTACT_FIELD_LEN) {
        return Err(EngineError::LimitExceeded("contact field too long"));
    }
    Ok(())
}

impl Engine {
    pub async fn register_doctor(
        &self,
        details: PersonDetails,
        specialty: Specialty,
    ) -> Result<Doctor, EngineError> {
        let started = Instant::now();
        let result = self.register_doctor_inner(details, specialty).await;
        self.finish("register_doctor", "DOCTOR_ADDED", started, &result, |d| {
            format!("ID {}: {} ({})", d.id(), d.person.full_name(), d.specialty)
        });
        result
    }

    async fn register_doctor_inner(
        &self,
        details: PersonDetails,
        specialty: Specialty,
    ) -> Result<Doctor, EngineError> {
        validate_details(&details)?;
        if specialty.name().len() > MAX_SPECIALTY_LEN {
            return Err(EngineError::LimitExceeded("specialty name too long"));
        }
        let mut scheduler = self.lock().await;
        if scheduler.directory().person_count() >= MAX_PERSONS {
            return Err(EngineError::LimitExceeded("too many people"));
        }

        let doctor = Doctor {
            person: details.into_person(scheduler.directory().next_id()),
            specialty,
        };
        let event = Event::DoctorRegistered { doctor: doctor.clone() };
        self.persist_and_apply(&mut scheduler, &event).await?;
        info!("registered doctor {}", doctor.id());
        Ok(doctor)
    }

    pub async fn register_patient(
        &self,
        details: PersonDetails,
        date_of_birth: NaiveDate,
    ) -> Result<Patient, EngineError> {
        let started = Instant::now();
        let result = self.register_patient_inner(details, date_of_birth).await;
        self.finish("register_patient", "PATIENT_ADDED", started, &result, |p| {
            format!("ID {}: {}", p.id(), p.person.full_name())
        });
        result
    }

    async fn register_patient_inner(
        &self,
        details: PersonDetails,
        date_of_birth: NaiveDate,
    ) -> Result<Patient, EngineError> {
        validate_details(&details)?;
        let mut scheduler = self.lock().await;
        if scheduler.directory().person_count() >= MAX_PERSONS {
            return Err(EngineError::LimitExceeded("too many people"));
        }

        let patient = Patient {
            person: details.into_person(scheduler.directory().next_id()),
            date_of_birth,
        };
        let event = Event::PatientRegistered { patient: patient.clone() };
        self.persist_and_apply(&mut scheduler, &event).await?;
        info!("registered patient {}", patient.id());
        Ok(patient)
    }

    /// Validate against the current clock, persist, then insert.
    pub async fn schedule_appointment(
        &self,
        doctor_id: PersonId,
        patient_id: PersonId,
        date_time: Option<NaiveDateTime>,
        reason: Option<String>,
    ) -> Result<Appointment, EngineError> {
        let started = Instant::now();
        let result = self
            .schedule_appointment_inner(doctor_id, patient_id, date_time, reason)
            .await;
        self.finish("schedule_appointment", "APPOINTMENT_SCHEDULED", started, &result, |a| {
            format!(
                "ID {} doctor {} patient {} at {}",
                a.id(),
                a.doctor_id(),
                a.patient_id(),
                a.date_time().format(DATE_TIME_FORMAT)
            )
        });
        result
    }

    async fn schedule_appointment_inner(
        &self,
        doctor_id: PersonId,
        patient_id: PersonId,
        date_time: Option<NaiveDateTime>,
        reason: Option<String>,
    ) -> Result<Appointment, EngineError> {
        if reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LEN) {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let mut scheduler = self.lock().await;
        if scheduler.ledger().len() >= MAX_APPOINTMENTS {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }

        let appointment = scheduler.check_schedule(doctor_id, patient_id, date_time, reason, now())?;
        let event = Event::AppointmentScheduled { appointment: appointment.clone() };
        self.persist_and_apply(&mut scheduler, &event).await?;
        info!("scheduled appointment {}", appointment.id());
        Ok(appointment)
    }

    pub async fn cancel_appointment(&self, id: AppointmentId) -> Result<Appointment, EngineError> {
        let started = Instant::now();
        let result = self.transition(id, AppointmentStatus::Cancelled).await;
        self.finish("cancel_appointment", "APPOINTMENT_CANCELLED", started, &result, |a| {
            format!("ID {}", a.id())
        });
        result
    }

    pub async fn complete_appointment(&self, id: AppointmentId) -> Result<Appointment, EngineError> {
        let started = Instant::now();
        let result = self.transition(id, AppointmentStatus::Completed).await;
        self.finish("complete_appointment", "APPOINTMENT_COMPLETED", started, &result, |a| {
            format!("ID {}", a.id())
        });
        result
    }

    async fn transition(
        &self,
        id: AppointmentId,
        target: AppointmentStatus,
    ) -> Result<Appointment, EngineError> {
        let mut scheduler = self.lock().await;
        scheduler.check_transition(id, target)?;

        let event = match target {
            AppointmentStatus::Cancelled => Event::AppointmentCancelled { id },
            AppointmentStatus::Completed => Event::AppointmentCompleted { id },
            AppointmentStatus::Scheduled => unreachable!("check_transition rejects SCHEDULED targets"),
        };
        self.persist_and_apply(&mut scheduler, &event).await?;
        info!("appointment {id} -> {target}");
        scheduler
            .ledger()
            .find(id)
            .cloned()
            .ok_or(EngineError::Scheduling(SchedulingError::NotFound(id)))
    }

    /// Rewrite the WAL with only the events needed to recreate current
    /// state. Holds the scheduler lock so no mutation interleaves.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let scheduler = self.lock().await;
        let events = scheduler.snapshot_events();
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        drop(scheduler);

        metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
