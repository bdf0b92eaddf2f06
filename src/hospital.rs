use std::fmt::{self, Display};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::agent::Location;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HospitalId(pub usize);

impl Display for HospitalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

/// A treatment site with a consumable dose inventory and a bed threshold.
///
/// A hospital is active until the number of co-located agents exceeds its bed capacity, after
/// which it is closed for the rest of the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: HospitalId,
    pub location: Location,
    pub vaccine_capacity: u32,
    pub vaccine_type: String,
    // Nominal; doses are handed out one per patient per tick regardless.
    pub admin_speed: u32,
    pub bed_capacity: u32,
    pub current_patients: u32,
    pub active: bool,
    /// Number of dose requests received.
    pub dose_requests: u32,
    /// Number of dose requests that could not be served.
    pub stockouts: u32,
}

impl Hospital {
    pub fn new(
        id: HospitalId,
        location: Location,
        vaccine_capacity: u32,
        vaccine_type: &str,
        admin_speed: u32,
        bed_capacity: u32,
    ) -> Self {
        Hospital {
            id,
            location,
            vaccine_capacity,
            vaccine_type: vaccine_type.to_string(),
            admin_speed,
            bed_capacity,
            current_patients: 0,
            active: true,
            dose_requests: 0,
            stockouts: 0,
        }
    }

    /// Consumes `number_of_doses` from the inventory. Returns false, leaving the inventory
    /// untouched, when the hospital is closed or holds fewer doses than requested.
    pub fn administer_vaccine(&mut self, number_of_doses: u32) -> bool {
        self.dose_requests += 1;
        if self.active && number_of_doses <= self.vaccine_capacity {
            self.vaccine_capacity -= number_of_doses;
            true
        } else {
            self.stockouts += 1;
            false
        }
    }

    pub fn update_occupancy(&mut self, count: u32) {
        self.current_patients = count;
        if count > self.bed_capacity && self.active {
            debug!(
                "{} closing: {} patients exceed {} beds",
                self.id, count, self.bed_capacity
            );
            self.active = false;
        }
    }

    pub fn restock_vaccines(&mut self, additional_doses: u32) {
        self.vaccine_capacity += additional_doses;
    }
}

impl Display for Hospital {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Hospital Location: {:?}, Vaccine Capacity: {}, Vaccine Type: {}, Beds: {}/{}, Active: {}",
            self.location,
            self.vaccine_capacity,
            self.vaccine_type,
            self.current_patients,
            self.bed_capacity,
            self.active
        )
    }
}
