use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::model::*;

/// Registries of doctors and patients. Both roles draw identifiers from one
/// sequence owned by this instance.
#[derive(Debug)]
pub struct Directory {
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
    /// id → (role, index into the role's Vec)
    index: HashMap<PersonId, (Role, usize)>,
    next_id: PersonId,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Self {
            doctors: Vec::new(),
            patients: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Identifier the next registration will receive.
    pub fn next_id(&self) -> PersonId {
        self.next_id
    }

    // ── Registration ─────────────────────────────────────────

    pub fn register_doctor(&mut self, details: PersonDetails, specialty: Specialty) -> Doctor {
        let doctor = Doctor {
            person: details.into_person(self.next_id),
            specialty,
        };
        self.insert_doctor(doctor.clone());
        doctor
    }

    pub fn register_patient(&mut self, details: PersonDetails, date_of_birth: NaiveDate) -> Patient {
        let patient = Patient {
            person: details.into_person(self.next_id),
            date_of_birth,
        };
        self.insert_patient(patient.clone());
        patient
    }

    /// Store a doctor whose id was already assigned (replay or pre-validated).
    pub fn insert_doctor(&mut self, doctor: Doctor) {
        let id = doctor.id();
        self.bump(id);
        self.index.insert(id, (Role::Doctor, self.doctors.len()));
        self.doctors.push(doctor);
    }

    pub fn insert_patient(&mut self, patient: Patient) {
        let id = patient.id();
        self.bump(id);
        self.index.insert(id, (Role::Patient, self.patients.len()));
        self.patients.push(patient);
    }

    fn bump(&mut self, id: PersonId) {
        self.next_id = self.next_id.max(id.saturating_add(1));
    }

    // ── Lookup ───────────────────────────────────────────────

    pub fn find_doctor(&self, id: PersonId) -> Option<&Doctor> {
        match self.index.get(&id) {
            Some((Role::Doctor, idx)) => self.doctors.get(*idx),
            _ => None,
        }
    }

    pub fn find_patient(&self, id: PersonId) -> Option<&Patient> {
        match self.index.get(&id) {
            Some((Role::Patient, idx)) => self.patients.get(*idx),
            _ => None,
        }
    }

    pub fn find_person(&self, id: PersonId) -> Option<PersonRef<'_>> {
        match self.index.get(&id)? {
            (Role::Doctor, idx) => self.doctors.get(*idx).map(PersonRef::Doctor),
            (Role::Patient, idx) => self.patients.get(*idx).map(PersonRef::Patient),
        }
    }

    /// Doctors with exactly this specialty, in registration order.
    pub fn doctors_by_specialty(&self, specialty: &Specialty) -> Vec<&Doctor> {
        self.doctors
            .iter()
            .filter(|d| &d.specialty == specialty)
            .collect()
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Distinct specialties of registered doctors, sorted by name.
    pub fn specialties(&self) -> Vec<&Specialty> {
        self.doctors
            .iter()
            .map(|d| &d.specialty)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn person_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(first: &str, last: &str) -> PersonDetails {
        PersonDetails {
            first_name: first.into(),
            last_name: last.into(),
            ..Default::default()
        }
    }

    fn dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(1990, 4, 12).unwrap()
    }

    #[test]
    fn ids_are_unique_across_roles() {
        let mut dir = Directory::new();
        let d1 = dir.register_doctor(details("Ana", "Pop"), Specialty::new("Cardiology"));
        let p1 = dir.register_patient(details("Ion", "Ionescu"), dob());
        let d2 = dir.register_doctor(details("Dan", "Radu"), Specialty::new("Dermatology"));
        assert_eq!(d1.id(), 1);
        assert_eq!(p1.id(), 2);
        assert_eq!(d2.id(), 3);
        assert_eq!(dir.next_id(), 4);
    }

    #[test]
    fn lookup_respects_role() {
        let mut dir = Directory::new();
        let d = dir.register_doctor(details("Ana", "Pop"), Specialty::new("Cardiology"));
        let p = dir.register_patient(details("Ion", "Ionescu"), dob());

        assert_eq!(dir.find_doctor(d.id()), Some(&d));
        assert_eq!(dir.find_patient(p.id()), Some(&p));
        // A patient id never resolves as a doctor and vice versa
        assert!(dir.find_doctor(p.id()).is_none());
        assert!(dir.find_patient(d.id()).is_none());
        assert!(dir.find_doctor(99).is_none());

        assert_eq!(dir.find_person(p.id()).map(|r| r.role()), Some(Role::Patient));
        assert!(dir.find_person(99).is_none());
    }

    #[test]
    fn doctors_by_specialty_in_registration_order() {
        let mut dir = Directory::new();
        let cardio = Specialty::new("Cardiology");
        let a = dir.register_doctor(details("A", "A"), cardio.clone());
        dir.register_doctor(details("B", "B"), Specialty::new("Dermatology"));
        let c = dir.register_doctor(details("C", "C"), cardio.clone());

        let found: Vec<PersonId> = dir.doctors_by_specialty(&cardio).iter().map(|d| d.id()).collect();
        assert_eq!(found, vec![a.id(), c.id()]);
        assert!(dir.doctors_by_specialty(&Specialty::new("Neurology")).is_empty());
    }

    #[test]
    fn specialties_distinct_and_sorted() {
        let mut dir = Directory::new();
        dir.register_doctor(details("A", "A"), Specialty::new("Pediatrics"));
        dir.register_doctor(details("B", "B"), Specialty::new("Cardiology"));
        dir.register_doctor(details("C", "C"), Specialty::new("Pediatrics"));
        let names: Vec<&str> = dir.specialties().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Cardiology", "Pediatrics"]);
    }

    #[test]
    fn insert_resumes_sequence_after_highest_id() {
        let mut dir = Directory::new();
        dir.insert_patient(Patient {
            person: details("Ion", "Ionescu").into_person(41),
            date_of_birth: dob(),
        });
        let d = dir.register_doctor(details("Ana", "Pop"), Specialty::new("Cardiology"));
        assert_eq!(d.id(), 42);
    }

    #[test]
    fn insert_of_max_id_does_not_overflow() {
        let mut dir = Directory::new();
        dir.insert_doctor(Doctor {
            person: details("Max", "Id").into_person(PersonId::MAX),
            specialty: Specialty::new("Cardiology"),
        });
        assert_eq!(dir.next_id(), PersonId::MAX);
        assert!(dir.find_doctor(PersonId::MAX).is_some());
    }

    #[test]
    fn independent_instances_do_not_share_sequences() {
        let mut a = Directory::new();
        let mut b = Directory::new();
        a.register_patient(details("X", "X"), dob());
        a.register_patient(details("Y", "Y"), dob());
        let p = b.register_patient(details("Z", "Z"), dob());
        assert_eq!(p.id(), 1);
    }
}
