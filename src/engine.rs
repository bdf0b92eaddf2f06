//! The per-tick update pipeline.
//!
//! An [`Engine`] exclusively owns everything a run mutates: the agents, the hospitals, the
//! occupancy grid and the run's random number generator. Drivers advance it with
//! [`Engine::step`], which executes the five stages of a tick in a fixed order:
//!
//! 1. Movement: sick agents may walk toward the nearest open hospital, everyone else takes a
//!    random step.
//! 2. Transmission: healthy agents sharing a cell with a sick agent may become infected.
//! 3. Progression: infections age by one day and become infectious after the incubation period.
//! 4. Hospital interaction: occupancy is updated and sick patients at open hospitals are treated.
//! 5. Grid rebuild: the occupancy grid is rebuilt from the final positions.
use log::{debug, trace};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::agent::{Agent, HealthStatus, ImmunityReason, Location, INCUBATION_DAYS};
use crate::error::SimError;
use crate::grid::Grid;
use crate::hospital::{Hospital, HospitalId};
use crate::parameters::Parameters;
use crate::population::{create_agents, create_hospitals};
use crate::random::{new_rng, SimRng};
use crate::{HashMap, HashSet};

/// Sick agents only start walking toward a hospital after this many days of infection.
pub const SEEK_TREATMENT_DAYS: u32 = 6;
/// Probability that an eligible sick agent heads for a hospital on a given tick.
pub const SEEK_TREATMENT_PROBABILITY: f64 = 0.5;
/// A transmission draw above this value infects the exposed agent.
pub const TRANSMISSION_THRESHOLD: f64 = 0.0;

// (inclusive upper age, mean, standard deviation)
const AGE_BRACKETS: [(u8, f64, f64); 9] = [
    (4, 0.2711, 1.5624),
    (9, 0.2762, 1.5853),
    (17, 0.2351, 1.3513),
    (29, 0.1681, 1.1106),
    (39, 0.1765, 1.2817),
    (49, 0.1674, 1.1491),
    (59, 0.1551, 1.2231),
    (69, 0.1621, 1.1506),
    (79, 0.1706, 1.1752),
];
const OLDEST_BRACKET: (f64, f64) = (0.2091, 1.3557);

/// Returns the `(mean, standard deviation)` of the transmission draw for an agent of `age`.
pub fn age_bracket(age: u8) -> (f64, f64) {
    AGE_BRACKETS
        .iter()
        .find(|(upper, _, _)| age <= *upper)
        .map_or(OLDEST_BRACKET, |&(_, mean, sd)| (mean, sd))
}

fn sample_transmission(rng: &mut SimRng, age: u8) -> f64 {
    let (mean, sd) = age_bracket(age);
    let z: f64 = rng.sample(StandardNormal);
    mean + sd * z
}

fn manhattan_distance(a: Location, b: Location) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

/// Moves one cell from `from` toward `to`, closing the larger axis gap first. Ties move along y.
fn step_toward(from: Location, to: Location) -> Location {
    let dx = from.0.abs_diff(to.0);
    let dy = from.1.abs_diff(to.1);
    let toward = |a: usize, b: usize| if b > a { a + 1 } else { a - 1 };
    if dx == 0 && dy == 0 {
        from
    } else if dx > dy {
        (toward(from.0, to.0), from.1)
    } else {
        (from.0, toward(from.1, to.1))
    }
}

/// Each axis moves by -1, 0 or +1 uniformly and independently, clamped to `[0, bound)`.
fn random_walk(from: Location, bound: usize, rng: &mut SimRng) -> Location {
    let mut axis = |value: usize| {
        let delta: i64 = rng.random_range(-1..=1);
        let moved = (value as i64 + delta).clamp(0, bound as i64 - 1);
        usize::try_from(moved).unwrap_or(0)
    };
    let x = axis(from.0);
    let y = axis(from.1);
    (x, y)
}

fn nearest_active_hospital(hospitals: &[Hospital], from: Location) -> Option<Location> {
    hospitals
        .iter()
        .filter(|hospital| hospital.active)
        .min_by_key(|hospital| manhattan_distance(from, hospital.location))
        .map(|hospital| hospital.location)
}

/// Counts of what happened during the most recent tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: usize,
    pub new_infections: usize,
    pub new_infectious: usize,
    pub treated: usize,
    pub sick: usize,
    pub active_hospitals: usize,
}

pub struct Engine {
    agents: Vec<Agent>,
    hospitals: Vec<Hospital>,
    grid: Grid,
    bound: usize,
    rng: SimRng,
    tick: usize,
    last_tick: TickSummary,
}

impl Engine {
    /// Creates the hospitals and agents described by `parameters` on a `bound x bound` grid,
    /// drawing all randomness from a generator seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameters` if the parameters do not validate.
    pub fn new(parameters: &Parameters, seed: u64) -> Result<Engine, SimError> {
        parameters.validate()?;
        let mut rng = new_rng(seed);
        let hospitals = create_hospitals(
            parameters.num_hospitals,
            parameters.bound,
            parameters.modeled_population(),
            parameters,
            &mut rng,
        );
        let agents = create_agents(
            parameters.num_agents,
            parameters.bound,
            parameters.initial_infected,
            &mut rng,
        );
        Engine::from_parts(agents, hospitals, parameters.bound, rng)
    }

    /// Builds an engine around existing agents and hospitals.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameters` if `bound` is zero or too large for a grid, and `SimError::OutOfBounds` if
    /// any agent or hospital lies outside the grid.
    pub fn from_parts(
        agents: Vec<Agent>,
        hospitals: Vec<Hospital>,
        bound: usize,
        rng: SimRng,
    ) -> Result<Engine, SimError> {
        let grid = Grid::try_new(bound, bound)?;
        let mut engine = Engine {
            agents,
            hospitals,
            grid,
            bound,
            rng,
            tick: 0,
            last_tick: TickSummary::default(),
        };
        engine.rebuild_grid()?;
        Ok(engine)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn hospitals(&self) -> &[Hospital] {
        &self.hospitals
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Number of ticks executed so far.
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn last_tick(&self) -> TickSummary {
        self.last_tick
    }

    /// Whether any agent is still infected or infectious.
    pub fn has_sick_agents(&self) -> bool {
        self.agents.iter().any(Agent::is_infected)
    }

    /// Adds doses to a hospital's inventory. Returns false if there is no such hospital.
    pub fn restock_hospital(&mut self, id: HospitalId, doses: u32) -> bool {
        match self.hospitals.iter_mut().find(|hospital| hospital.id == id) {
            Some(hospital) => {
                hospital.restock_vaccines(doses);
                true
            }
            None => false,
        }
    }

    /// Advances the simulation by one tick. Returns whether the run should continue, which is
    /// the case as long as some agent is infected or infectious.
    ///
    /// # Errors
    ///
    /// Returns `SimError::OutOfBounds` if an agent or hospital ended up outside the grid. This
    /// indicates a bug and should be treated as fatal.
    pub fn step(&mut self) -> Result<bool, SimError> {
        trace!("tick {}: start", self.tick);
        self.move_agents();
        let new_infections = self.transmit();
        let new_infectious = self.progress_infections();
        let treated = self.treat_patients();
        self.rebuild_grid()?;

        self.tick += 1;
        self.last_tick = TickSummary {
            tick: self.tick,
            new_infections,
            new_infectious,
            treated,
            sick: self.agents.iter().filter(|agent| agent.is_infected()).count(),
            active_hospitals: self.hospitals.iter().filter(|h| h.active).count(),
        };
        debug!("{:?}", self.last_tick);
        Ok(self.last_tick.sick > 0)
    }

    /// Steps until the run stops on its own or `max_ticks` ticks have executed in total.
    /// Returns the number of ticks executed.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Engine::step`].
    pub fn run(&mut self, max_ticks: usize) -> Result<usize, SimError> {
        while self.tick < max_ticks {
            if !self.step()? {
                debug!("no sick agents remain after tick {}", self.tick);
                break;
            }
        }
        Ok(self.tick)
    }

    fn move_agents(&mut self) {
        let any_active = self.hospitals.iter().any(|hospital| hospital.active);
        for agent in &mut self.agents {
            let seeks_treatment = agent.is_infected()
                && any_active
                && agent.days_infected >= SEEK_TREATMENT_DAYS
                && self.rng.random_bool(SEEK_TREATMENT_PROBABILITY);
            let target = if seeks_treatment {
                nearest_active_hospital(&self.hospitals, agent.location)
            } else {
                None
            };
            let new_location = match target {
                Some(hospital) => step_toward(agent.location, hospital),
                None => random_walk(agent.location, self.bound, &mut self.rng),
            };
            agent.move_to(new_location);
        }
    }

    fn transmit(&mut self) -> usize {
        let rng = &mut self.rng;
        Self::transmit_with(&mut self.agents, |age| sample_transmission(rng, age))
    }

    /// Exposes every healthy agent sharing a cell with a sick agent. `draw` is called once per
    /// exposed agent with its age; a value above the threshold infects it.
    fn transmit_with(agents: &mut [Agent], mut draw: impl FnMut(u8) -> f64) -> usize {
        // Exposure is decided by who was sick when the stage began.
        let contaminated: HashSet<Location> = agents
            .iter()
            .filter(|agent| agent.is_infected())
            .map(|agent| agent.location)
            .collect();

        let mut new_infections = 0;
        for agent in agents.iter_mut() {
            if agent.health != HealthStatus::Healthy || !contaminated.contains(&agent.location) {
                continue;
            }
            if draw(agent.age) > TRANSMISSION_THRESHOLD {
                trace!("{} infected at {:?}", agent.id, agent.location);
                agent.update_health(HealthStatus::Infected);
                agent.days_infected = 0;
                new_infections += 1;
            }
        }
        new_infections
    }

    fn progress_infections(&mut self) -> usize {
        let mut new_infectious = 0;
        for agent in self.agents.iter_mut().filter(|agent| agent.is_infected()) {
            agent.days_infected += 1;
            if agent.health == HealthStatus::Infected && agent.days_infected > INCUBATION_DAYS {
                agent.update_health(HealthStatus::Infectious);
                new_infectious += 1;
            }
        }
        new_infectious
    }

    fn treat_patients(&mut self) -> usize {
        let mut occupants: HashMap<Location, Vec<usize>> = HashMap::default();
        for (index, agent) in self.agents.iter().enumerate() {
            occupants.entry(agent.location).or_default().push(index);
        }

        let mut treated = 0;
        for hospital in &mut self.hospitals {
            let patients = occupants
                .get(&hospital.location)
                .map_or(&[][..], Vec::as_slice);
            hospital.update_occupancy(u32::try_from(patients.len()).unwrap_or(u32::MAX));
            if !hospital.active {
                continue;
            }
            for &index in patients {
                let agent = &mut self.agents[index];
                if !agent.is_infected() {
                    continue;
                }
                if hospital.administer_vaccine(1) {
                    trace!("{} treated at {}", agent.id, hospital.id);
                    agent.update_health(HealthStatus::Healthy);
                    agent.days_infected = 0;
                    agent.immunity_reason = Some(ImmunityReason::Treatment);
                    treated += 1;
                }
            }
        }
        treated
    }

    fn rebuild_grid(&mut self) -> Result<(), SimError> {
        self.grid.clear();
        for hospital in &self.hospitals {
            let (x, y) = hospital.location;
            self.grid.add_hospital(x, y, hospital.id)?;
        }
        for agent in &self.agents {
            let (x, y) = agent.location;
            self.grid.add_agent(x, y, agent.id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;

    fn agent(id: usize, age: u8, location: Location, health: HealthStatus) -> Agent {
        Agent::new(AgentId(id), age, location, health)
    }

    fn hospital(location: Location, capacity: u32, beds: u32) -> Hospital {
        Hospital::new(HospitalId(0), location, capacity, "A", 10, beds)
    }

    fn engine(agents: Vec<Agent>, hospitals: Vec<Hospital>, bound: usize) -> Engine {
        Engine::from_parts(agents, hospitals, bound, new_rng(42)).unwrap()
    }

    #[test]
    fn age_bracket_boundaries() {
        assert_eq!(age_bracket(0), (0.2711, 1.5624));
        assert_eq!(age_bracket(4), (0.2711, 1.5624));
        assert_eq!(age_bracket(5), (0.2762, 1.5853));
        assert_eq!(age_bracket(17), (0.2351, 1.3513));
        assert_eq!(age_bracket(30), (0.1765, 1.2817));
        assert_eq!(age_bracket(29), (0.1681, 1.1106));
        assert_eq!(age_bracket(79), (0.1706, 1.1752));
        assert_eq!(age_bracket(80), (0.2091, 1.3557));
        assert_eq!(age_bracket(90), (0.2091, 1.3557));
    }

    #[test]
    fn step_toward_closes_larger_gap_first() {
        assert_eq!(step_toward((0, 0), (5, 2)), (1, 0));
        assert_eq!(step_toward((5, 5), (5, 0)), (5, 4));
        assert_eq!(step_toward((5, 5), (1, 6)), (4, 5));
        // Ties move along y.
        assert_eq!(step_toward((2, 2), (4, 4)), (2, 3));
        assert_eq!(step_toward((2, 2), (0, 0)), (2, 1));
        assert_eq!(step_toward((3, 3), (3, 3)), (3, 3));
    }

    #[test]
    fn random_walk_stays_in_bounds() {
        let mut rng = new_rng(9);
        let mut location = (0, 0);
        for _ in 0..1000 {
            location = random_walk(location, 3, &mut rng);
            assert!(location.0 < 3 && location.1 < 3);
        }
        assert_eq!(random_walk((0, 0), 1, &mut rng), (0, 0));
    }

    #[test]
    fn nearest_skips_closed_hospitals() {
        let mut near = hospital((1, 1), 10, 10);
        near.active = false;
        let far = hospital((8, 8), 10, 10);
        assert_eq!(nearest_active_hospital(&[near, far], (0, 0)), Some((8, 8)));
        assert_eq!(nearest_active_hospital(&[], (0, 0)), None);
    }

    #[test]
    fn transmission_infects_on_positive_draw() {
        let mut agents = vec![
            agent(0, 50, (1, 1), HealthStatus::Infectious),
            agent(1, 30, (1, 1), HealthStatus::Healthy),
        ];
        agents[1].days_infected = 3;
        let mut ages = Vec::new();
        let infected = Engine::transmit_with(&mut agents, |age| {
            ages.push(age);
            0.5
        });
        assert_eq!(infected, 1);
        assert_eq!(ages, vec![30]);
        assert_eq!(agents[1].health, HealthStatus::Infected);
        assert_eq!(agents[1].days_infected, 0);
    }

    #[test]
    fn transmission_requires_positive_draw_and_colocation() {
        let mut agents = vec![
            agent(0, 50, (1, 1), HealthStatus::Infected),
            agent(1, 30, (1, 1), HealthStatus::Healthy),
            agent(2, 30, (1, 2), HealthStatus::Healthy),
        ];
        let infected = Engine::transmit_with(&mut agents, |_| TRANSMISSION_THRESHOLD);
        assert_eq!(infected, 0);
        assert_eq!(agents[1].health, HealthStatus::Healthy);

        let infected = Engine::transmit_with(&mut agents, |_| 1.0);
        assert_eq!(infected, 1);
        assert_eq!(agents[2].health, HealthStatus::Healthy);
    }

    #[test]
    fn treated_agent_can_be_reinfected_and_loses_immunity() {
        let mut recovered = agent(1, 30, (0, 0), HealthStatus::Healthy);
        recovered.immunity_reason = Some(ImmunityReason::Treatment);
        let mut agents = vec![agent(0, 50, (0, 0), HealthStatus::Infectious), recovered];

        assert_eq!(Engine::transmit_with(&mut agents, |_| 1.0), 1);
        assert_eq!(agents[1].health, HealthStatus::Infected);

        let stats = crate::stats::collect_stats(&agents, &[]);
        assert_eq!(stats.currently_infected, 2);
        assert_eq!(stats.immunity.total(), 0);
    }

    #[test]
    fn newly_infected_do_not_spread_within_the_same_tick() {
        // Agent 1 is infected this stage; agent 2 shares its cell with nobody who was sick.
        let mut agents = vec![
            agent(0, 50, (0, 0), HealthStatus::Infectious),
            agent(1, 30, (0, 0), HealthStatus::Healthy),
            agent(2, 30, (5, 5), HealthStatus::Healthy),
        ];
        Engine::transmit_with(&mut agents, |_| 1.0);
        assert_eq!(agents[2].health, HealthStatus::Healthy);
    }

    #[test]
    fn infectious_after_sixth_increment() {
        let mut engine = engine(vec![agent(0, 40, (0, 0), HealthStatus::Infected)], vec![], 5);
        for day in 1..=5 {
            engine.progress_infections();
            assert_eq!(engine.agents[0].days_infected, day);
            assert_eq!(engine.agents[0].health, HealthStatus::Infected);
        }
        assert_eq!(engine.progress_infections(), 1);
        assert_eq!(engine.agents[0].days_infected, 6);
        assert_eq!(engine.agents[0].health, HealthStatus::Infectious);
    }

    #[test]
    fn treatment_cures_and_consumes_a_dose() {
        let mut engine = engine(
            vec![
                agent(0, 40, (2, 2), HealthStatus::Infectious),
                agent(1, 40, (2, 2), HealthStatus::Healthy),
            ],
            vec![hospital((2, 2), 5, 10)],
            5,
        );
        engine.agents[0].days_infected = 9;
        assert_eq!(engine.treat_patients(), 1);
        let patient = &engine.agents[0];
        assert_eq!(patient.health, HealthStatus::Healthy);
        assert_eq!(patient.days_infected, 0);
        assert_eq!(patient.immunity_reason, Some(ImmunityReason::Treatment));
        assert_eq!(engine.hospitals[0].vaccine_capacity, 4);
        assert_eq!(engine.hospitals[0].current_patients, 2);
    }

    #[test]
    fn stockout_leaves_patient_sick() {
        let mut engine = engine(
            vec![agent(0, 40, (2, 2), HealthStatus::Infectious)],
            vec![hospital((2, 2), 0, 10)],
            5,
        );
        assert_eq!(engine.treat_patients(), 0);
        assert_eq!(engine.agents[0].health, HealthStatus::Infectious);
        assert!(engine.hospitals[0].active);
        assert_eq!(engine.hospitals[0].stockouts, 1);
    }

    #[test]
    fn overcrowded_hospital_closes_and_stops_treating() {
        let mut engine = engine(
            vec![
                agent(0, 40, (2, 2), HealthStatus::Infectious),
                agent(1, 40, (2, 2), HealthStatus::Infected),
                agent(2, 40, (2, 2), HealthStatus::Healthy),
            ],
            vec![hospital((2, 2), 100, 2)],
            5,
        );
        assert_eq!(engine.treat_patients(), 0);
        assert!(!engine.hospitals[0].active);
        assert_eq!(engine.hospitals[0].vaccine_capacity, 100);

        // Even with room and doses, a closed hospital stays closed.
        engine.agents.truncate(1);
        assert_eq!(engine.treat_patients(), 0);
        assert!(!engine.hospitals[0].active);
        assert_eq!(engine.agents[0].health, HealthStatus::Infectious);
    }

    #[test]
    fn sick_agents_without_open_hospitals_random_walk() {
        let mut closed = hospital((0, 0), 10, 0);
        closed.active = false;
        let mut sick = agent(0, 40, (4, 4), HealthStatus::Infectious);
        sick.days_infected = 10;
        let mut engine = engine(vec![sick], vec![closed], 9);
        engine.move_agents();
        let (x, y) = engine.agents[0].location;
        assert!(x.abs_diff(4) <= 1 && y.abs_diff(4) <= 1);
    }

    #[test]
    fn sick_agents_reach_hospital() {
        let mut sick = agent(0, 40, (9, 9), HealthStatus::Infectious);
        sick.days_infected = 10;
        let mut engine = engine(vec![sick], vec![hospital((0, 0), 10, 10)], 10);
        // Half the ticks move toward the hospital, the rest wander by at most one cell.
        let start = manhattan_distance((9, 9), (0, 0));
        for _ in 0..200 {
            engine.move_agents();
        }
        assert!(manhattan_distance(engine.agents[0].location, (0, 0)) < start);
    }

    #[test]
    fn from_parts_rejects_out_of_bounds() {
        let result = Engine::from_parts(
            vec![agent(0, 40, (5, 0), HealthStatus::Healthy)],
            vec![],
            5,
            new_rng(0),
        );
        assert!(matches!(result, Err(SimError::OutOfBounds { x: 5, y: 0, .. })));
        assert!(Engine::from_parts(vec![], vec![], 0, new_rng(0)).is_err());
    }

    #[test]
    fn huge_bound_is_an_error_not_a_panic() {
        let parameters = Parameters {
            bound: 1 << 32,
            ..Parameters::default()
        };
        assert!(matches!(
            Engine::new(&parameters, 1),
            Err(SimError::InvalidParameters(_))
        ));
        assert!(matches!(
            Engine::from_parts(vec![], vec![], 1 << 32, new_rng(0)),
            Err(SimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn step_rebuilds_grid_and_reports_continuation() {
        let mut engine = engine(
            vec![
                agent(0, 40, (0, 0), HealthStatus::Infected),
                agent(1, 40, (3, 3), HealthStatus::Healthy),
            ],
            // Out of reach of the sick agent in a single tick.
            vec![hospital((4, 4), 10, 10)],
            5,
        );
        assert!(engine.step().unwrap());
        assert_eq!(engine.tick(), 1);
        assert_eq!(engine.grid().occupant_count(), 3);
        assert_eq!(engine.last_tick().tick, 1);

        let mut healthy = engine_with_no_sick();
        assert!(!healthy.step().unwrap());
    }

    fn engine_with_no_sick() -> Engine {
        engine(vec![agent(0, 40, (1, 1), HealthStatus::Healthy)], vec![], 3)
    }

    #[test]
    fn restock_by_id() {
        let mut engine = engine(vec![], vec![hospital((0, 0), 0, 1)], 2);
        assert!(engine.restock_hospital(HospitalId(0), 7));
        assert!(!engine.restock_hospital(HospitalId(3), 7));
        assert_eq!(engine.hospitals()[0].vaccine_capacity, 7);
    }
}
