use crate::ledger::StatusCounts;
use crate::model::*;
use crate::scheduler::Scheduler;

use super::Engine;

fn describe(scheduler: &Scheduler, appointment: &Appointment) -> AppointmentInfo {
    let directory = scheduler.directory();
    let name = |id| {
        directory
            .find_person(id)
            .map(|p| p.person().full_name())
            .unwrap_or_else(|| "<unknown>".to_string())
    };
    AppointmentInfo {
        doctor_name: name(appointment.doctor_id()),
        patient_name: name(appointment.patient_id()),
        appointment: appointment.clone(),
    }
}

impl Engine {
    pub async fn doctors(&self) -> Vec<Doctor> {
        self.lock().await.directory().doctors().to_vec()
    }

    pub async fn patients(&self) -> Vec<Patient> {
        self.lock().await.directory().patients().to_vec()
    }

    pub async fn find_doctor(&self, id: PersonId) -> Option<Doctor> {
        self.lock().await.directory().find_doctor(id).cloned()
    }

    pub async fn find_patient(&self, id: PersonId) -> Option<Patient> {
        self.lock().await.directory().find_patient(id).cloned()
    }

    /// Doctors with exactly this specialty, in registration order.
    pub async fn doctors_by_specialty(&self, specialty: &Specialty) -> Vec<Doctor> {
        let scheduler = self.lock().await;
        scheduler
            .directory()
            .doctors_by_specialty(specialty)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Distinct specialties, sorted by name.
    pub async fn specialties(&self) -> Vec<Specialty> {
        let scheduler = self.lock().await;
        scheduler.directory().specialties().into_iter().cloned().collect()
    }

    pub async fn appointment(&self, id: AppointmentId) -> Option<Appointment> {
        self.lock().await.ledger().find(id).cloned()
    }

    /// Every appointment ordered by date-time, then id.
    pub async fn appointments(&self) -> Vec<AppointmentInfo> {
        let scheduler = self.lock().await;
        scheduler
            .ledger()
            .all_sorted()
            .iter()
            .map(|a| describe(&scheduler, a))
            .collect()
    }

    pub async fn appointments_for_doctor(&self, doctor_id: PersonId) -> Vec<AppointmentInfo> {
        let scheduler = self.lock().await;
        scheduler
            .ledger()
            .for_doctor(doctor_id)
            .into_iter()
            .map(|a| describe(&scheduler, a))
            .collect()
    }

    pub async fn appointments_for_patient(&self, patient_id: PersonId) -> Vec<AppointmentInfo> {
        let scheduler = self.lock().await;
        scheduler
            .ledger()
            .for_patient(patient_id)
            .into_iter()
            .map(|a| describe(&scheduler, a))
            .collect()
    }

    pub async fn status_counts(&self) -> StatusCounts {
        self.lock().await.ledger().count_by_status()
    }
}
