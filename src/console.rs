use std::io;

use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::engine::{Engine, EngineError};
use crate::menu::*;
use crate::model::*;

const BANNER: &str = "=== Medical Cabinet Appointment System ===\n";

/// Whether the session keeps going after a handler returns. `Exit` also
/// covers end of input in the middle of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Bind a prompted value or leave the handler when input ends.
macro_rules! read_or_exit {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => return Ok(Flow::Exit),
        }
    };
}

fn doctor_line(d: &Doctor) -> String {
    format!(
        "ID: {} | Dr. {} | {} | Phone: {} | Email: {}",
        d.id(),
        d.person.full_name(),
        d.specialty,
        d.person.contact.phone,
        d.person.contact.email
    )
}

fn patient_line(p: &Patient) -> String {
    format!(
        "ID: {} | {} | DOB: {} | Phone: {} | Email: {}",
        p.id(),
        p.person.full_name(),
        p.date_of_birth.format(DATE_FORMAT),
        p.person.contact.phone,
        p.person.contact.email
    )
}

/// One interactive session: menus on `out`, answers from `lines`.
pub struct Session<'a, L, W> {
    engine: &'a Engine,
    lines: L,
    out: W,
}

/// Run a session until the user picks Exit or input ends.
pub async fn run_session<L, E, W>(engine: &Engine, lines: L, out: W) -> io::Result<()>
where
    L: Stream<Item = Result<String, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
    W: AsyncWrite + Unpin,
{
    Session { engine, lines, out }.run().await
}

impl<L, E, W> Session<'_, L, W>
where
    L: Stream<Item = Result<String, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
    W: AsyncWrite + Unpin,
{
    async fn run(mut self) -> io::Result<()> {
        self.write(BANNER).await?;
        loop {
            self.write(&MainChoice::render()).await?;
            let choice = match self.choose::<MainChoice>().await? {
                Some(choice) => choice,
                None => break,
            };
            if let Some(action) = choice.audit_action() {
                self.engine.audit().record(action, None);
            }
            let flow = match choice {
                MainChoice::Doctors => self.doctor_operations().await?,
                MainChoice::Patients => self.patient_operations().await?,
                MainChoice::Appointments => self.appointment_operations().await?,
                MainChoice::AllData => self.all_data().await?,
                MainChoice::AuditLog => self.audit_operations().await?,
                MainChoice::Exit => Flow::Exit,
            };
            if flow == Flow::Exit {
                break;
            }
        }
        self.engine.audit().record("APPLICATION_EXITED", None);
        self.write("Exiting application...\n").await?;
        self.out.flush().await
    }

    // ── I/O primitives ───────────────────────────────────────

    async fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await
    }

    async fn writeln(&mut self, text: &str) -> io::Result<()> {
        self.write(text).await?;
        self.write("\n").await
    }

    /// Print `prompt` and read one line. `None` at end of input.
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.write(prompt).await?;
        match self.lines.next().await {
            Some(Ok(line)) => Ok(Some(line.trim().to_string())),
            Some(Err(e)) => Err(io::Error::other(e)),
            None => {
                debug!("console input closed");
                Ok(None)
            }
        }
    }

    /// Read until `parse` accepts the line, re-prompting on bad input.
    async fn prompt<T>(
        &mut self,
        prompt: &str,
        parse: impl Fn(&str) -> Result<T, InputError>,
    ) -> io::Result<Option<T>> {
        loop {
            let Some(line) = self.read_line(prompt).await? else {
                return Ok(None);
            };
            match parse(&line) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => self.writeln(&format!("Invalid input: {e}. Please try again.")).await?,
            }
        }
    }

    async fn choose<M: Menu>(&mut self) -> io::Result<Option<M>> {
        self.prompt("Enter choice: ", M::parse).await
    }

    async fn prompt_id(&mut self, prompt: &str) -> io::Result<Option<u64>> {
        self.prompt(prompt, parse_number).await
    }

    async fn report_error(&mut self, what: &str, e: &EngineError) -> io::Result<()> {
        self.writeln(&format!("{what} failed: {e}")).await
    }

    // ── Doctors ──────────────────────────────────────────────

    async fn doctor_operations(&mut self) -> io::Result<Flow> {
        self.write(&DoctorChoice::render()).await?;
        match read_or_exit!(self.choose::<DoctorChoice>().await?) {
            DoctorChoice::Add => self.add_doctor().await,
            DoctorChoice::ViewAll => {
                self.view_doctors().await?;
                Ok(Flow::Continue)
            }
            DoctorChoice::Specialties => {
                self.view_specialties().await?;
                Ok(Flow::Continue)
            }
            DoctorChoice::FindBySpecialty => self.find_by_specialty().await,
        }
    }

    /// Contact and address fields shared by both registration forms.
    async fn read_details(&mut self) -> io::Result<Option<PersonDetails>> {
        let mut fields = Vec::with_capacity(8);
        for label in [
            "First Name: ",
            "Last Name: ",
            "Phone Number: ",
            "Email: ",
            "Street Address: ",
            "City: ",
            "Zip Code: ",
            "Country: ",
        ] {
            match self.read_line(label).await? {
                Some(v) => fields.push(v),
                None => return Ok(None),
            }
        }
        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or_default();
        Ok(Some(PersonDetails {
            first_name: next(),
            last_name: next(),
            contact: ContactInfo {
                phone: next(),
                email: next(),
            },
            address: Address {
                street: next(),
                city: next(),
                zip_code: next(),
                country: next(),
            },
        }))
    }

    async fn add_doctor(&mut self) -> io::Result<Flow> {
        self.writeln("\n--- Adding New Doctor ---").await?;
        let details = read_or_exit!(self.read_details().await?);

        let known = self.engine.specialties().await;
        if !known.is_empty() {
            let names: Vec<&str> = known.iter().map(Specialty::name).collect();
            self.writeln(&format!("Known specialties: {}", names.join(", "))).await?;
        }
        let specialty = read_or_exit!(
            self.prompt("Specialty: ", |s| {
                if s.is_empty() { Err(InputError::Empty) } else { Ok(Specialty::new(s)) }
            })
            .await?
        );

        match self.engine.register_doctor(details, specialty).await {
            Ok(doctor) => {
                self.writeln(&format!("Doctor added successfully with ID: {}", doctor.id())).await?
            }
            Err(e) => self.report_error("Adding doctor", &e).await?,
        }
        Ok(Flow::Continue)
    }

    async fn view_doctors(&mut self) -> io::Result<()> {
        self.writeln("\n--- All Doctors ---").await?;
        let doctors = self.engine.doctors().await;
        if doctors.is_empty() {
            return self.writeln("No doctors registered.").await;
        }
        for d in &doctors {
            self.writeln(&doctor_line(d)).await?;
        }
        Ok(())
    }

    async fn view_specialties(&mut self) -> io::Result<()> {
        self.writeln("\n--- Medical Specialties ---").await?;
        let specialties = self.engine.specialties().await;
        if specialties.is_empty() {
            return self.writeln("No specialties on record.").await;
        }
        for (i, s) in specialties.iter().enumerate() {
            self.writeln(&format!("{}. {s}", i + 1)).await?;
        }
        Ok(())
    }

    async fn find_by_specialty(&mut self) -> io::Result<Flow> {
        let name = read_or_exit!(self.read_line("Specialty: ").await?);
        let specialty = Specialty::new(name);
        let doctors = self.engine.doctors_by_specialty(&specialty).await;
        self.engine.audit().record("SEARCHED_DOCTORS_BY_SPECIALTY", Some(specialty.name()));
        if doctors.is_empty() {
            self.writeln(&format!("No doctors found for specialty '{specialty}'.")).await?;
        }
        for d in &doctors {
            self.writeln(&doctor_line(d)).await?;
        }
        Ok(Flow::Continue)
    }

    // ── Patients ─────────────────────────────────────────────

    async fn patient_operations(&mut self) -> io::Result<Flow> {
        self.write(&PatientChoice::render()).await?;
        match read_or_exit!(self.choose::<PatientChoice>().await?) {
            PatientChoice::Add => self.add_patient().await,
            PatientChoice::ViewAll => {
                self.view_patients().await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn add_patient(&mut self) -> io::Result<Flow> {
        self.writeln("\n--- Adding New Patient ---").await?;
        let details = read_or_exit!(self.read_details().await?);
        let dob = read_or_exit!(self.prompt("Date of Birth (YYYY-MM-DD): ", parse_date).await?);

        match self.engine.register_patient(details, dob).await {
            Ok(patient) => {
                self.writeln(&format!("Patient added successfully with ID: {}", patient.id())).await?
            }
            Err(e) => self.report_error("Adding patient", &e).await?,
        }
        Ok(Flow::Continue)
    }

    async fn view_patients(&mut self) -> io::Result<()> {
        self.writeln("\n--- All Patients ---").await?;
        let patients = self.engine.patients().await;
        if patients.is_empty() {
            return self.writeln("No patients registered.").await;
        }
        for p in &patients {
            self.writeln(&patient_line(p)).await?;
        }
        Ok(())
    }

    // ── Appointments ─────────────────────────────────────────

    async fn appointment_operations(&mut self) -> io::Result<Flow> {
        self.write(&AppointmentChoice::render()).await?;
        match read_or_exit!(self.choose::<AppointmentChoice>().await?) {
            AppointmentChoice::Schedule => self.schedule().await,
            AppointmentChoice::ViewAll => {
                self.view_appointments().await?;
                Ok(Flow::Continue)
            }
            AppointmentChoice::UpdateStatus => self.update_status().await,
            AppointmentChoice::ForDoctor => {
                let id = read_or_exit!(self.prompt_id("Enter Doctor ID: ").await?);
                if self.engine.find_doctor(id).await.is_none() {
                    self.writeln(&format!("No doctor with ID {id}.")).await?;
                } else {
                    let list = self.engine.appointments_for_doctor(id).await;
                    self.print_appointments(&list).await?;
                }
                Ok(Flow::Continue)
            }
            AppointmentChoice::ForPatient => {
                let id = read_or_exit!(self.prompt_id("Enter Patient ID: ").await?);
                if self.engine.find_patient(id).await.is_none() {
                    self.writeln(&format!("No patient with ID {id}.")).await?;
                } else {
                    let list = self.engine.appointments_for_patient(id).await;
                    self.print_appointments(&list).await?;
                }
                Ok(Flow::Continue)
            }
        }
    }

    async fn schedule(&mut self) -> io::Result<Flow> {
        self.writeln("\n--- Scheduling New Appointment ---").await?;
        self.view_doctors().await?;
        let doctor_id = read_or_exit!(self.prompt_id("Enter Doctor ID: ").await?);
        self.view_patients().await?;
        let patient_id = read_or_exit!(self.prompt_id("Enter Patient ID: ").await?);
        let date_time = read_or_exit!(
            self.prompt("Appointment Date and Time (YYYY-MM-DD HH:mm): ", parse_date_time)
                .await?
        );
        let reason = read_or_exit!(self.read_line("Reason for appointment: ").await?);

        match self
            .engine
            .schedule_appointment(doctor_id, patient_id, Some(date_time), parse_reason(&reason))
            .await
        {
            Ok(a) => {
                self.writeln(&format!("Appointment scheduled successfully with ID: {}", a.id()))
                    .await?
            }
            Err(e) => self.report_error("Scheduling", &e).await?,
        }
        Ok(Flow::Continue)
    }

    async fn print_appointments(&mut self, list: &[AppointmentInfo]) -> io::Result<()> {
        if list.is_empty() {
            return self.writeln("No appointments found.").await;
        }
        for info in list {
            self.writeln(&info.to_string()).await?;
        }
        Ok(())
    }

    async fn view_appointments(&mut self) -> io::Result<()> {
        self.writeln("\n--- All Appointments ---").await?;
        let list = self.engine.appointments().await;
        self.print_appointments(&list).await
    }

    async fn update_status(&mut self) -> io::Result<Flow> {
        self.writeln("\n--- Update Appointment Status ---").await?;
        self.view_appointments().await?;
        let id = read_or_exit!(self.prompt_id("Enter Appointment ID to update: ").await?);
        self.write(&StatusChoice::render()).await?;
        let target = read_or_exit!(self.choose::<StatusChoice>().await?);

        let result = match target {
            StatusChoice::Complete => self.engine.complete_appointment(id).await,
            StatusChoice::Cancel => self.engine.cancel_appointment(id).await,
        };
        match result {
            Ok(a) => {
                self.writeln(&format!("Appointment {} status updated to: {}", a.id(), a.status()))
                    .await?
            }
            Err(e) => self.report_error("Status update", &e).await?,
        }
        Ok(Flow::Continue)
    }

    // ── Overview and audit ───────────────────────────────────

    async fn all_data(&mut self) -> io::Result<Flow> {
        self.writeln(&format!("\n{}\n{:^60}\n{}", "=".repeat(60), "ALL DATA OVERVIEW", "=".repeat(60)))
            .await?;
        self.view_doctors().await?;
        self.view_patients().await?;
        self.view_appointments().await?;
        let counts = self.engine.status_counts().await;
        self.writeln(&format!(
            "\nScheduled: {} | Completed: {} | Cancelled: {}",
            counts.scheduled, counts.completed, counts.cancelled
        ))
        .await?;
        Ok(Flow::Continue)
    }

    async fn audit_operations(&mut self) -> io::Result<Flow> {
        self.write(&AuditChoice::render()).await?;
        let audit = self.engine.audit().clone();
        match read_or_exit!(self.choose::<AuditChoice>().await?) {
            choice @ (AuditChoice::Last10 | AuditChoice::Last20) => {
                let n = if choice == AuditChoice::Last10 { 10 } else { 20 };
                match audit.recent(n).await {
                    Ok(entries) if entries.is_empty() => self.writeln("Audit log is empty.").await?,
                    Ok(entries) => {
                        self.writeln(&format!("\n--- Last {} audit entries ---", entries.len()))
                            .await?;
                        for e in &entries {
                            self.writeln(&format!("{} | {}", e.timestamp, e.action)).await?;
                        }
                    }
                    Err(e) => self.writeln(&format!("Reading audit log failed: {e}")).await?,
                }
                audit.record(&format!("VIEWED_RECENT_AUDIT_{n}"), None);
            }
            AuditChoice::Clear => {
                let answer = read_or_exit!(
                    self.read_line("Are you sure you want to clear the audit log? (y/N): ")
                        .await?
                );
                if !parse_confirmation(&answer) {
                    self.writeln("Audit log clear cancelled.").await?;
                } else {
                    match audit.clear().await {
                        Ok(()) => {
                            audit.record("AUDIT_LOG_CLEARED", None);
                            self.writeln("Audit log cleared.").await?;
                        }
                        Err(e) => self.writeln(&format!("Clearing audit log failed: {e}")).await?,
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }
}
