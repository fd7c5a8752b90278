//! # Fleet Scheduling
//!
//! Vehicles, service logs, trips, trip tickets, driver assignments and garage
//! job cards, with the overlap validators that keep one vehicle (or driver)
//! from being booked twice.

use crate::overlap::ConflictReport;
use crate::primitives::EXPIRY_ALERT_DAYS;
use crate::{DeskError, EmployeeId, ProjectId, RecordId, VehicleId, require_name};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// RECORDS
// =============================================================================

/// Expiring vehicle documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryDocument {
    License,
    Insurance,
}

impl ExpiryDocument {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::License => "Vehicle License",
            Self::Insurance => "Vehicle Insurance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub license_plate: Option<String>,
    pub license_expiry: Option<NaiveDate>,
    pub insurance_expiry: Option<NaiveDate>,
}

/// State of a workshop service on a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLog {
    pub id: RecordId,
    pub vehicle: VehicleId,
    pub service_type: String,
    pub state: ServiceState,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: RecordId,
    pub reference: String,
    pub vehicle: VehicleId,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripTicket {
    pub id: RecordId,
    pub name: String,
    pub vehicle: VehicleId,
    pub driver: Option<EmployeeId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub odometer_start: Option<u64>,
    pub odometer_end: Option<u64>,
}

impl TripTicket {
    /// Distance driven; `None` until both readings exist or if they run backwards.
    #[must_use]
    pub fn distance(&self) -> Option<u64> {
        self.odometer_end?.checked_sub(self.odometer_start?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Draft,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub id: RecordId,
    pub driver: EmployeeId,
    pub vehicle: VehicleId,
    pub project: Option<ProjectId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCardState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCard {
    pub id: RecordId,
    pub reference: String,
    pub vehicle: VehicleId,
    pub time_in: Option<DateTime<Utc>>,
    pub time_out: Option<DateTime<Utc>>,
    pub state: JobCardState,
}

/// An upcoming document expiry for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub vehicle: VehicleId,
    pub vehicle_name: String,
    pub document: ExpiryDocument,
    pub expires_on: NaiveDate,
    pub days_left: i64,
}

impl ExpiryAlert {
    #[must_use]
    pub fn subject(&self) -> String {
        format!(
            "Fleet Alert: {} Expiry for {}",
            self.document.label(),
            self.vehicle_name
        )
    }

    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "{} will expire on {} ({} days). Please take necessary action.",
            self.document.label(),
            self.expires_on.format("%d-%m-%Y"),
            self.days_left
        )
    }
}

// =============================================================================
// FLEET BOOK
// =============================================================================

/// All fleet records, keyed for deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetBook {
    pub vehicles: BTreeMap<VehicleId, Vehicle>,
    pub services: BTreeMap<RecordId, ServiceLog>,
    pub trips: BTreeMap<RecordId, Trip>,
    pub tickets: BTreeMap<RecordId, TripTicket>,
    pub assignments: BTreeMap<RecordId, DriverAssignment>,
    pub job_cards: BTreeMap<RecordId, JobCard>,
}

impl FleetBook {
    fn vehicle_name(&self, vehicle: VehicleId) -> String {
        self.vehicles
            .get(&vehicle)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| format!("Vehicle {}", vehicle))
    }

    fn require_vehicle(&self, vehicle: VehicleId) -> Result<(), DeskError> {
        if self.vehicles.contains_key(&vehicle) {
            Ok(())
        } else {
            Err(DeskError::not_found("Vehicle", vehicle.0))
        }
    }

    fn running_services<'a>(
        &'a self,
        vehicle: VehicleId,
    ) -> impl Iterator<Item = (String, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> + 'a {
        self.services
            .values()
            .filter(move |s| s.vehicle == vehicle && s.state == ServiceState::Running)
            .map(|s| (format!("Service: {}", s.service_type), s.start, s.end))
    }

    fn active_assignments<'a>(
        &'a self,
        exclude: RecordId,
        keep: impl Fn(&DriverAssignment) -> bool + 'a,
    ) -> impl Iterator<Item = &'a DriverAssignment> + 'a {
        self.assignments
            .values()
            .filter(move |a| a.id != exclude && a.status == AssignmentStatus::Active && keep(a))
    }

    // -------------------------------------------------------------------------
    // Overlap validators
    // -------------------------------------------------------------------------

    /// A trip ticket may not overlap a running service, a trip or another
    /// ticket of the same vehicle.
    pub fn check_trip_ticket(&self, ticket: &TripTicket) -> Result<(), DeskError> {
        let mut report = ConflictReport::new(ticket.start, ticket.end);
        report.section("The vehicle is in Service:", self.running_services(ticket.vehicle));
        report.section(
            "The vehicle is already in another Trip:",
            self.trips
                .values()
                .filter(|t| t.vehicle == ticket.vehicle)
                .map(|t| (format!("Reference: {}", t.reference), t.start, t.end)),
        );
        report.section(
            "The vehicle is already scheduled in another Trip Ticket:",
            self.tickets
                .values()
                .filter(|t| t.vehicle == ticket.vehicle && t.id != ticket.id)
                .map(|t| (format!("Ticket: {}", t.name), t.start, t.end)),
        );
        report.into_result()
    }

    /// A driver assignment may not overlap a running service of the vehicle,
    /// another active assignment of the driver, or another active assignment
    /// of the vehicle.
    pub fn check_driver_assignment(&self, assignment: &DriverAssignment) -> Result<(), DeskError> {
        let mut report = ConflictReport::new(assignment.start, assignment.end);
        report.section(
            "The vehicle is currently in Service:",
            self.running_services(assignment.vehicle),
        );
        report.section(
            "Driver is already assigned during this time:",
            self.active_assignments(assignment.id, |a| a.driver == assignment.driver)
                .map(|a| (format!("Employee {} assigned", a.driver), a.start, a.end)),
        );
        report.section(
            "Vehicle is already assigned during this time:",
            self.active_assignments(assignment.id, |a| a.vehicle == assignment.vehicle)
                .map(|a| (format!("{} assigned", self.vehicle_name(a.vehicle)), a.start, a.end)),
        );
        report.into_result()
    }

    /// A job card may not overlap a running service of the vehicle.
    pub fn check_job_card(&self, card: &JobCard) -> Result<(), DeskError> {
        let mut report = ConflictReport::new(card.time_in, card.time_out);
        report.section(
            "The vehicle is currently in Service:",
            self.running_services(card.vehicle),
        );
        report.into_result()
    }

    // -------------------------------------------------------------------------
    // Record entry
    // -------------------------------------------------------------------------

    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> Result<(), DeskError> {
        require_name("Vehicle name", &vehicle.name)?;
        self.vehicles.insert(vehicle.id, vehicle);
        Ok(())
    }

    pub fn add_service(&mut self, service: ServiceLog) -> Result<(), DeskError> {
        self.require_vehicle(service.vehicle)?;
        require_name("Service type", &service.service_type)?;
        self.services.insert(service.id, service);
        Ok(())
    }

    pub fn set_service_state(&mut self, id: RecordId, state: ServiceState) -> Result<(), DeskError> {
        let service = self
            .services
            .get_mut(&id)
            .ok_or_else(|| DeskError::not_found("Service log", id.0))?;
        service.state = state;
        Ok(())
    }

    pub fn add_trip(&mut self, trip: Trip) -> Result<(), DeskError> {
        self.require_vehicle(trip.vehicle)?;
        self.trips.insert(trip.id, trip);
        Ok(())
    }

    pub fn add_trip_ticket(&mut self, ticket: TripTicket) -> Result<(), DeskError> {
        self.require_vehicle(ticket.vehicle)?;
        if let (Some(start), Some(end)) = (ticket.odometer_start, ticket.odometer_end) {
            if end < start {
                return Err(DeskError::Validation(
                    "Odometer end reading cannot be lower than the start reading.".to_string(),
                ));
            }
        }
        self.check_trip_ticket(&ticket)?;
        self.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    /// Record a driver assignment; `is_driver` comes from the employee record.
    pub fn add_driver_assignment(
        &mut self,
        assignment: DriverAssignment,
        is_driver: bool,
    ) -> Result<(), DeskError> {
        self.require_vehicle(assignment.vehicle)?;
        if !is_driver {
            return Err(DeskError::Validation(
                "Selected employee is not marked as a driver.".to_string(),
            ));
        }
        self.check_driver_assignment(&assignment)?;
        self.assignments.insert(assignment.id, assignment);
        Ok(())
    }

    /// Move an assignment through draft → active → completed. Activation
    /// re-runs the overlap check.
    pub fn set_assignment_status(
        &mut self,
        id: RecordId,
        status: AssignmentStatus,
    ) -> Result<(), DeskError> {
        let current = self
            .assignments
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Driver assignment", id.0))?;
        if status == AssignmentStatus::Active {
            self.check_driver_assignment(current)?;
        }
        if let Some(assignment) = self.assignments.get_mut(&id) {
            assignment.status = status;
        }
        Ok(())
    }

    pub fn add_job_card(&mut self, card: JobCard) -> Result<(), DeskError> {
        self.require_vehicle(card.vehicle)?;
        self.check_job_card(&card)?;
        self.job_cards.insert(card.id, card);
        Ok(())
    }

    /// Close a job card. The time out must be set first.
    pub fn close_job_card(
        &mut self,
        id: RecordId,
        time_out: Option<DateTime<Utc>>,
    ) -> Result<(), DeskError> {
        let card = self
            .job_cards
            .get(&id)
            .ok_or_else(|| DeskError::not_found("Job card", id.0))?;
        if card.state == JobCardState::Closed {
            return Err(DeskError::InvalidTransition {
                action: "close",
                state: "closed",
            });
        }
        let time_out = time_out.or(card.time_out).ok_or_else(|| {
            DeskError::Validation("Please set 'Time Out' before closing the job card.".to_string())
        })?;
        let mut updated = card.clone();
        updated.time_out = Some(time_out);
        self.check_job_card(&updated)?;
        updated.state = JobCardState::Closed;
        self.job_cards.insert(id, updated);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Expiry alerts
    // -------------------------------------------------------------------------

    /// Vehicles whose license or insurance expires exactly 30, 15 or 7 days
    /// after `today`.
    #[must_use]
    pub fn expiry_alerts(&self, today: NaiveDate) -> Vec<ExpiryAlert> {
        let mut alerts = Vec::new();
        for days in EXPIRY_ALERT_DAYS {
            let target = today + Duration::days(days);
            for vehicle in self.vehicles.values() {
                for (document, expiry) in [
                    (ExpiryDocument::Insurance, vehicle.insurance_expiry),
                    (ExpiryDocument::License, vehicle.license_expiry),
                ] {
                    if expiry == Some(target) {
                        alerts.push(ExpiryAlert {
                            vehicle: vehicle.id,
                            vehicle_name: vehicle.name.clone(),
                            document,
                            expires_on: target,
                            days_left: days,
                        });
                    }
                }
            }
        }
        alerts
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).single()
    }

    fn book() -> FleetBook {
        let mut book = FleetBook::default();
        book.add_vehicle(Vehicle {
            id: VehicleId(1),
            name: "Hilux A-123".to_string(),
            license_plate: Some("A-123".to_string()),
            license_expiry: None,
            insurance_expiry: None,
        })
        .expect("vehicle");
        book
    }

    fn assignment(id: u64, driver: u64, start: u32, end: u32) -> DriverAssignment {
        DriverAssignment {
            id: RecordId(id),
            driver: EmployeeId(driver),
            vehicle: VehicleId(1),
            project: None,
            start: at(start, 8),
            end: at(end, 18),
            status: AssignmentStatus::Active,
        }
    }

    #[test]
    fn driver_double_booking_rejected() {
        let mut book = book();
        book.add_driver_assignment(assignment(1, 10, 1, 3), true)
            .expect("first");

        let err = book
            .add_driver_assignment(assignment(2, 10, 3, 4), true)
            .expect_err("overlap");
        let message = err.to_string();
        assert!(message.starts_with("Driver is already assigned during this time:"));
        assert!(message.contains("Vehicle is already assigned during this time:"));
    }

    #[test]
    fn draft_assignments_do_not_conflict() {
        let mut book = book();
        let mut draft = assignment(1, 10, 1, 3);
        draft.status = AssignmentStatus::Draft;
        book.add_driver_assignment(draft, true).expect("draft");
        book.add_driver_assignment(assignment(2, 11, 2, 2), true)
            .expect("no active overlap");
        assert!(
            book.set_assignment_status(RecordId(1), AssignmentStatus::Active)
                .is_err()
        );
    }

    #[test]
    fn non_driver_rejected() {
        let mut book = book();
        let err = book
            .add_driver_assignment(assignment(1, 10, 1, 2), false)
            .expect_err("not a driver");
        assert_eq!(err.to_string(), "Selected employee is not marked as a driver.");
    }

    #[test]
    fn running_service_blocks_ticket() {
        let mut book = book();
        book.add_service(ServiceLog {
            id: RecordId(5),
            vehicle: VehicleId(1),
            service_type: "Brake pads".to_string(),
            state: ServiceState::Running,
            start: at(10, 8),
            end: at(11, 17),
        })
        .expect("service");

        let ticket = TripTicket {
            id: RecordId(6),
            name: "TT/0001".to_string(),
            vehicle: VehicleId(1),
            driver: None,
            start: at(11, 17),
            end: at(12, 9),
            odometer_start: Some(1000),
            odometer_end: Some(1250),
        };
        let err = book.add_trip_ticket(ticket.clone()).expect_err("service");
        assert!(err.to_string().starts_with("The vehicle is in Service:"));

        book.set_service_state(RecordId(5), ServiceState::Done)
            .expect("done");
        book.add_trip_ticket(ticket).expect("service finished");
        assert_eq!(book.tickets[&RecordId(6)].distance(), Some(250));
    }

    #[test]
    fn ticket_without_end_is_not_checked() {
        let mut book = book();
        book.add_trip(Trip {
            id: RecordId(1),
            reference: "TRP-1".to_string(),
            vehicle: VehicleId(1),
            start: at(1, 0),
            end: at(30, 0),
        })
        .expect("trip");
        book.add_trip_ticket(TripTicket {
            id: RecordId(2),
            name: "TT/0002".to_string(),
            vehicle: VehicleId(1),
            driver: None,
            start: at(5, 0),
            end: None,
            odometer_start: None,
            odometer_end: None,
        })
        .expect("skipped");
    }

    #[test]
    fn job_card_close_requires_time_out() {
        let mut book = book();
        book.add_job_card(JobCard {
            id: RecordId(1),
            reference: "JC/0001".to_string(),
            vehicle: VehicleId(1),
            time_in: at(2, 8),
            time_out: None,
            state: JobCardState::Open,
        })
        .expect("card");
        let err = book.close_job_card(RecordId(1), None).expect_err("no time out");
        assert_eq!(
            err.to_string(),
            "Please set 'Time Out' before closing the job card."
        );
        book.close_job_card(RecordId(1), at(2, 12)).expect("close");
        assert_eq!(book.job_cards[&RecordId(1)].state, JobCardState::Closed);
    }

    #[test]
    fn expiry_alerts_fire_on_exact_thresholds() {
        let mut book = book();
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        if let Some(v) = book.vehicles.get_mut(&VehicleId(1)) {
            v.insurance_expiry = Some(today + Duration::days(15));
            v.license_expiry = Some(today + Duration::days(16));
        }
        let alerts = book.expiry_alerts(today);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].document, ExpiryDocument::Insurance);
        assert_eq!(alerts[0].days_left, 15);
        assert_eq!(
            alerts[0].subject(),
            "Fleet Alert: Vehicle Insurance Expiry for Hilux A-123"
        );
    }
}
