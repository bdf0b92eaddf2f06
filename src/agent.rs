use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// A cell coordinate `(x, y)` on the grid.
pub type Location = (usize, usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Number of days an agent stays `Infected` before becoming `Infectious`.
pub const INCUBATION_DAYS: u32 = 5;

/// The health states of an agent. Recovery by treatment returns an agent to `Healthy`; there
/// is no separate recovered or dead state.
///
/// Legal transitions, all of which are driven by the [`Engine`](crate::Engine):
/// * `Healthy -> Infected` on transmission from a co-located sick agent
/// * `Infected -> Infectious` once `days_infected` exceeds [`INCUBATION_DAYS`]
/// * `Infected | Infectious -> Healthy` on successful hospital treatment
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Infected,
    Infectious,
}

impl HealthStatus {
    /// Whether this state can spread the disease and be treated.
    pub fn is_sick(self) -> bool {
        matches!(self, HealthStatus::Infected | HealthStatus::Infectious)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImmunityReason {
    Vaccine,
    Natural,
    Treatment,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub age: u8,
    pub location: Location,
    pub health: HealthStatus,
    pub days_infected: u32,
    pub vaccine_doses: u32,
    pub received_vaccine_types: BTreeSet<String>,
    pub immunity_reason: Option<ImmunityReason>,
    // Tracked but has no effect on transmission.
    pub mask: bool,
}

impl Agent {
    pub fn new(id: AgentId, age: u8, location: Location, health: HealthStatus) -> Self {
        Agent {
            id,
            name: format!("Agent_{}", id.0),
            age,
            location,
            health,
            days_infected: 0,
            vaccine_doses: 0,
            received_vaccine_types: BTreeSet::new(),
            immunity_reason: None,
            mask: false,
        }
    }

    /// Overwrites the location. Callers are responsible for keeping it inside the grid.
    pub fn move_to(&mut self, new_location: Location) {
        self.location = new_location;
    }

    pub fn update_health(&mut self, new_health: HealthStatus) {
        self.health = new_health;
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health
    }

    pub fn is_infected(&self) -> bool {
        self.health.is_sick()
    }

    pub fn put_on_mask(&mut self) {
        self.mask = true;
    }

    pub fn mask_status(&self) -> bool {
        self.mask
    }

    /// Records a vaccine dose of the given type. Immunity from a past infection is kept as the
    /// immunity reason.
    pub fn record_vaccine(&mut self, vaccine_type: &str) {
        self.vaccine_doses += 1;
        self.received_vaccine_types.insert(vaccine_type.to_string());
        if self.immunity_reason.is_none() {
            self.immunity_reason = Some(ImmunityReason::Vaccine);
        }
    }
}

impl Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Agent ID: {}, Name: {}, Age: {}, Location: {:?}, Health: {:?}, Doses: {}, \
             Vaccine Types: {:?}, Immunity Reason: {:?}",
            self.id.0,
            self.name,
            self.age,
            self.location,
            self.health,
            self.vaccine_doses,
            self.received_vaccine_types,
            self.immunity_reason
        )
    }
}
