use log::trace;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::agent::{Agent, AgentId, HealthStatus, Location};
use crate::hospital::{Hospital, HospitalId};
use crate::parameters::Parameters;
use crate::random::SimRng;

const AGE_MEAN: f64 = 40.0;
const AGE_SD: f64 = 20.0;
const MAX_AGE: f64 = 90.0;
const VACCINE_TYPES: [&str; 2] = ["A", "B"];

fn random_location(bound: usize, rng: &mut SimRng) -> Location {
    (rng.random_range(0..bound), rng.random_range(0..bound))
}

/// Places `count` hospitals at random cells. Vaccine types alternate between "A" and "B", and
/// bed capacity is scaled from `population` using the factors in `parameters`.
///
/// # Panics
///
/// Panics if `bound` is zero.
pub fn create_hospitals(
    count: usize,
    bound: usize,
    population: usize,
    parameters: &Parameters,
    rng: &mut SimRng,
) -> Vec<Hospital> {
    trace!("Creating {count} hospitals");
    let bed_capacity = parameters.bed_capacity(population);
    (0..count)
        .map(|i| {
            Hospital::new(
                HospitalId(i),
                random_location(bound, rng),
                parameters.vaccine_capacity,
                VACCINE_TYPES[i % VACCINE_TYPES.len()],
                parameters.admin_speed,
                bed_capacity,
            )
        })
        .collect()
}

/// Samples an age from Normal(40, 20), rounded and clipped to [0, 90].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_age(rng: &mut SimRng) -> u8 {
    let z: f64 = rng.sample(StandardNormal);
    (AGE_MEAN + AGE_SD * z).round().clamp(0.0, MAX_AGE) as u8
}

/// Places `count` agents at random cells. The first `initial_infected` agents start out
/// infected and the rest healthy.
///
/// # Panics
///
/// Panics if `bound` is zero.
pub fn create_agents(
    count: usize,
    bound: usize,
    initial_infected: usize,
    rng: &mut SimRng,
) -> Vec<Agent> {
    trace!("Creating {count} agents, {initial_infected} initially infected");
    (0..count)
        .map(|i| {
            let location = random_location(bound, rng);
            let age = sample_age(rng);
            let health = if i < initial_infected {
                HealthStatus::Infected
            } else {
                HealthStatus::Healthy
            };
            Agent::new(AgentId(i), age, location, health)
        })
        .collect()
}
