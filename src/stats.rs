//! End-of-run aggregation.
//!
//! [`collect_stats`] is a read-only pass over the final agents and hospitals of a run. The engine
//! has no death transition, so every death count and mortality rate it produces is zero; the
//! columns exist so downstream reports keep a stable shape.
use std::fmt::{self, Display};

use crate::agent::{Agent, ImmunityReason};
use crate::hospital::Hospital;

/// Age buckets used by the stratified table, as inclusive `(low, high)` bounds.
pub const AGE_BUCKETS: [(u8, u8); 5] = [(0, 17), (18, 29), (30, 49), (50, 64), (65, u8::MAX)];

/// `numerator / denominator` as a percentage, or 0 when the denominator is 0.
#[allow(clippy::cast_precision_loss)]
pub fn percent(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgeBucketStats {
    pub low: u8,
    pub high: u8,
    pub total: usize,
    pub infected: usize,
    pub deaths: usize,
}

impl AgeBucketStats {
    pub fn label(&self) -> String {
        if self.high == u8::MAX {
            format!("{}+", self.low)
        } else {
            format!("{}-{}", self.low, self.high)
        }
    }

    pub fn infection_rate(&self) -> f64 {
        percent(self.infected, self.total)
    }

    pub fn mortality_rate(&self) -> f64 {
        percent(self.deaths, self.total)
    }

    fn contains(&self, age: u8) -> bool {
        (self.low..=self.high).contains(&age)
    }
}

/// Counts split by how many vaccine doses an agent has received.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VaccinationTiers {
    /// Two or more doses.
    pub fully: usize,
    /// Exactly one dose.
    pub partially: usize,
    pub unvaccinated: usize,
}

impl VaccinationTiers {
    fn record(&mut self, doses: u32) {
        match doses {
            0 => self.unvaccinated += 1,
            1 => self.partially += 1,
            _ => self.fully += 1,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ImmunityBreakdown {
    pub vaccine: usize,
    pub natural: usize,
    pub treatment: usize,
}

impl ImmunityBreakdown {
    pub fn total(&self) -> usize {
        self.vaccine + self.natural + self.treatment
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    pub total_population: usize,
    /// Agents currently infected or infectious.
    pub currently_infected: usize,
    /// Agents currently sick plus those who recovered from an infection.
    pub total_infected: usize,
    pub total_deaths: usize,
    pub vaccination: VaccinationTiers,
    pub immunity: ImmunityBreakdown,
    pub deaths_by_vaccination: VaccinationTiers,
    pub hospital_requests: usize,
    pub hospital_stockouts: usize,
    pub age_buckets: Vec<AgeBucketStats>,
}

impl Stats {
    pub fn infection_rate(&self) -> f64 {
        percent(self.total_infected, self.total_population)
    }

    pub fn mortality_rate(&self) -> f64 {
        percent(self.total_deaths, self.total_population)
    }

    pub fn stockout_rate(&self) -> f64 {
        percent(self.hospital_stockouts, self.hospital_requests)
    }
}

fn ever_infected(agent: &Agent) -> bool {
    agent.is_infected()
        || matches!(
            agent.immunity_reason,
            Some(ImmunityReason::Treatment | ImmunityReason::Natural)
        )
}

pub fn collect_stats(agents: &[Agent], hospitals: &[Hospital]) -> Stats {
    let mut vaccination = VaccinationTiers::default();
    let mut immunity = ImmunityBreakdown::default();
    let mut age_buckets: Vec<AgeBucketStats> = AGE_BUCKETS
        .iter()
        .map(|&(low, high)| AgeBucketStats {
            low,
            high,
            total: 0,
            infected: 0,
            deaths: 0,
        })
        .collect();

    let mut currently_infected = 0;
    let mut total_infected = 0;
    for agent in agents {
        vaccination.record(agent.vaccine_doses);
        // A reinfected agent keeps its old reason but is not immune.
        match agent.immunity_reason.filter(|_| !agent.is_infected()) {
            Some(ImmunityReason::Vaccine) => immunity.vaccine += 1,
            Some(ImmunityReason::Natural) => immunity.natural += 1,
            Some(ImmunityReason::Treatment) => immunity.treatment += 1,
            None => {}
        }
        let infected = ever_infected(agent);
        currently_infected += usize::from(agent.is_infected());
        total_infected += usize::from(infected);
        if let Some(bucket) = age_buckets.iter_mut().find(|b| b.contains(agent.age)) {
            bucket.total += 1;
            bucket.infected += usize::from(infected);
        }
    }

    Stats {
        total_population: agents.len(),
        currently_infected,
        total_infected,
        total_deaths: 0,
        vaccination,
        immunity,
        deaths_by_vaccination: VaccinationTiers::default(),
        hospital_requests: hospitals.iter().map(|h| h.dose_requests as usize).sum(),
        hospital_stockouts: hospitals.iter().map(|h| h.stockouts as usize).sum(),
        age_buckets,
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "=== Simulation Summary ===")?;
        writeln!(f, "Total Population: {}", self.total_population)?;
        writeln!(
            f,
            "Total Infected: {} ({:.2}%)",
            self.total_infected,
            self.infection_rate()
        )?;
        writeln!(f, "Currently Infected: {}", self.currently_infected)?;
        writeln!(
            f,
            "Total Deaths: {} ({:.2}%)",
            self.total_deaths,
            self.mortality_rate()
        )?;
        writeln!(f)?;
        writeln!(f, "Vaccination Status:")?;
        writeln!(f, "  Fully vaccinated: {}", self.vaccination.fully)?;
        writeln!(f, "  Partially vaccinated: {}", self.vaccination.partially)?;
        writeln!(f, "  Unvaccinated: {}", self.vaccination.unvaccinated)?;
        writeln!(
            f,
            "  Hospital dose requests: {} ({} stockouts, {:.2}%)",
            self.hospital_requests,
            self.hospital_stockouts,
            self.stockout_rate()
        )?;
        writeln!(f)?;
        writeln!(f, "Immunity:")?;
        writeln!(f, "  Total: {}", self.immunity.total())?;
        writeln!(f, "  Vaccine: {}", self.immunity.vaccine)?;
        writeln!(f, "  Natural: {}", self.immunity.natural)?;
        writeln!(f, "  Treatment: {}", self.immunity.treatment)?;
        writeln!(f)?;
        writeln!(f, "Deaths by Vaccination Status:")?;
        writeln!(f, "  Fully vaccinated: {}", self.deaths_by_vaccination.fully)?;
        writeln!(
            f,
            "  Partially vaccinated: {}",
            self.deaths_by_vaccination.partially
        )?;
        writeln!(
            f,
            "  Unvaccinated: {}",
            self.deaths_by_vaccination.unvaccinated
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<8} {:>8} {:>10} {:>8} {:>12}",
            "Age", "Total", "Infected", "Deaths", "Mortality %"
        )?;
        for bucket in &self.age_buckets {
            writeln!(
                f,
                "{:<8} {:>8} {:>10} {:>8} {:>12.2}",
                bucket.label(),
                bucket.total,
                bucket.infected,
                bucket.deaths,
                bucket.mortality_rate()
            )?;
        }
        Ok(())
    }
}
