use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::model::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
}

/// All appointments, kept sorted by `(date_time, id)`.
#[derive(Debug)]
pub struct Ledger {
    appointments: Vec<Appointment>,
    /// id → date_time, so lookups can binary-search the sorted Vec.
    date_times: HashMap<AppointmentId, NaiveDateTime>,
    next_id: AppointmentId,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            appointments: Vec::new(),
            date_times: HashMap::new(),
            next_id: 1,
        }
    }

    /// Identifier the next scheduled appointment will receive.
    pub fn next_id(&self) -> AppointmentId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    /// Insert maintaining sort order by `(date_time, id)`.
    pub fn insert(&mut self, appointment: Appointment) {
        let id = appointment.id();
        if self.date_times.contains_key(&id) {
            self.remove(id);
        }
        let pos = self
            .appointments
            .binary_search_by_key(&appointment.sort_key(), Appointment::sort_key)
            .unwrap_or_else(|e| e);
        self.date_times.insert(id, appointment.date_time());
        self.next_id = self.next_id.max(id.saturating_add(1));
        self.appointments.insert(pos, appointment);
    }

    fn remove(&mut self, id: AppointmentId) -> Option<Appointment> {
        let pos = self.position(id)?;
        self.date_times.remove(&id);
        Some(self.appointments.remove(pos))
    }

    fn position(&self, id: AppointmentId) -> Option<usize> {
        let date_time = *self.date_times.get(&id)?;
        self.appointments
            .binary_search_by_key(&(date_time, id), Appointment::sort_key)
            .ok()
    }

    pub fn find(&self, id: AppointmentId) -> Option<&Appointment> {
        self.position(id).map(|pos| &self.appointments[pos])
    }

    /// Sort position is unaffected: status is not part of the key.
    pub(crate) fn set_status(&mut self, id: AppointmentId, status: AppointmentStatus) -> Option<&Appointment> {
        let pos = self.position(id)?;
        let appointment = &mut self.appointments[pos];
        appointment.set_status(status);
        Some(appointment)
    }

    pub fn all_sorted(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn for_doctor(&self, doctor_id: PersonId) -> Vec<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| a.doctor_id() == doctor_id)
            .collect()
    }

    pub fn for_patient(&self, patient_id: PersonId) -> Vec<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| a.patient_id() == patient_id)
            .collect()
    }

    /// Appointments at exactly `date_time`, found by binary search.
    fn at(&self, date_time: NaiveDateTime) -> &[Appointment] {
        let lo = self.appointments.partition_point(|a| a.date_time() < date_time);
        let hi = self.appointments.partition_point(|a| a.date_time() <= date_time);
        &self.appointments[lo..hi]
    }

    /// True iff the doctor already has a SCHEDULED appointment at exactly
    /// `date_time`. Completed and cancelled appointments never conflict.
    pub fn has_active_conflict(&self, doctor_id: PersonId, date_time: NaiveDateTime) -> bool {
        self.at(date_time)
            .iter()
            .any(|a| a.doctor_id() == doctor_id && a.status() == AppointmentStatus::Scheduled)
    }

    pub fn count_by_status(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for a in &self.appointments {
            match a.status() {
                AppointmentStatus::Scheduled => counts.scheduled += 1,
                AppointmentStatus::Completed => counts.completed += 1,
                AppointmentStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2030-03-01 09:00", DATE_TIME_FORMAT).unwrap()
    }

    fn appt(id: AppointmentId, doctor: PersonId, offset_min: i64) -> Appointment {
        Appointment::new(id, doctor, 100, base() + Duration::minutes(offset_min), None)
    }

    fn is_sorted(ledger: &Ledger) -> bool {
        ledger
            .all_sorted()
            .windows(2)
            .all(|w| w[0].sort_key() <= w[1].sort_key())
    }

    #[test]
    fn ordering_under_arbitrary_insertion() {
        let mut ledger = Ledger::new();
        // Deliberately scrambled date-times, with collisions
        let offsets = [300, 0, 120, 0, 60, 300, 15, 120, 0];
        for (i, off) in offsets.iter().enumerate() {
            ledger.insert(appt(i as AppointmentId + 1, 1, *off));
        }
        assert_eq!(ledger.len(), offsets.len());
        assert!(is_sorted(&ledger));
        // Equal date-times tie-break on id
        let at_zero: Vec<AppointmentId> = ledger
            .all_sorted()
            .iter()
            .filter(|a| a.date_time() == base())
            .map(|a| a.id())
            .collect();
        assert_eq!(at_zero, vec![2, 4, 9]);
    }

    #[test]
    fn find_by_id() {
        let mut ledger = Ledger::new();
        ledger.insert(appt(1, 1, 60));
        ledger.insert(appt(2, 1, 0));
        assert_eq!(ledger.find(1).map(|a| a.id()), Some(1));
        assert_eq!(ledger.find(2).map(|a| a.date_time()), Some(base()));
        assert!(ledger.find(3).is_none());
    }

    #[test]
    fn filters_keep_ledger_order() {
        let mut ledger = Ledger::new();
        ledger.insert(appt(1, 7, 90));
        ledger.insert(appt(2, 8, 30));
        ledger.insert(appt(3, 7, 10));
        let ids: Vec<AppointmentId> = ledger.for_doctor(7).iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(ledger.for_patient(100).len(), 3);
        assert!(ledger.for_patient(5).is_empty());
    }

    #[test]
    fn conflict_only_for_scheduled_at_exact_time() {
        let mut ledger = Ledger::new();
        ledger.insert(appt(1, 7, 0));
        assert!(ledger.has_active_conflict(7, base()));
        // Different doctor, or one minute later: no conflict
        assert!(!ledger.has_active_conflict(8, base()));
        assert!(!ledger.has_active_conflict(7, base() + Duration::minutes(1)));

        ledger.set_status(1, AppointmentStatus::Cancelled);
        assert!(!ledger.has_active_conflict(7, base()));
    }

    #[test]
    fn next_id_follows_highest_inserted() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.next_id(), 1);
        ledger.insert(appt(10, 1, 0));
        ledger.insert(appt(4, 1, 5));
        assert_eq!(ledger.next_id(), 11);
    }

    #[test]
    fn insert_of_max_id_does_not_overflow() {
        let mut ledger = Ledger::new();
        ledger.insert(appt(AppointmentId::MAX, 1, 0));
        assert_eq!(ledger.next_id(), AppointmentId::MAX);
        assert!(ledger.find(AppointmentId::MAX).is_some());
    }

    #[test]
    fn set_status_unknown_id() {
        let mut ledger = Ledger::new();
        assert!(ledger.set_status(1, AppointmentStatus::Completed).is_none());
    }

    #[test]
    fn count_by_status() {
        let mut ledger = Ledger::new();
        for id in 1..=4 {
            ledger.insert(appt(id, 1, id as i64));
        }
        ledger.set_status(1, AppointmentStatus::Completed);
        ledger.set_status(2, AppointmentStatus::Cancelled);
        ledger.set_status(3, AppointmentStatus::Cancelled);
        assert_eq!(
            ledger.count_by_status(),
            StatusCounts { scheduled: 1, completed: 1, cancelled: 2 }
        );
    }
}
