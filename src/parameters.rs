use std::fs;
use std::path::Path;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::grid::MAX_CELLS;

/// Run parameters. Every field has a default, so a config file only needs to list the values
/// it overrides.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    /// Side length of the square grid.
    pub bound: usize,
    pub num_agents: usize,
    pub num_hospitals: usize,
    pub initial_infected: usize,
    pub max_ticks: usize,
    pub seed: u64,
    /// Doses each hospital starts with.
    pub vaccine_capacity: u32,
    pub admin_speed: u32,
    /// Hospital beds per thousand people in the modeled population.
    pub beds_per_thousand: f64,
    /// Floor applied to the per-hospital bed count before scaling.
    pub min_beds: f64,
    /// Multiplier applied to the bed count.
    pub bed_scale: f64,
    /// Size of the population the bed count is scaled from. Falls back to `num_agents`.
    pub population: Option<usize>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            bound: 50,
            num_agents: 300,
            num_hospitals: 4,
            initial_infected: 5,
            max_ticks: 365,
            seed: 0,
            vaccine_capacity: 1000,
            admin_speed: 10,
            beds_per_thousand: 2.35,
            min_beds: 5.0,
            bed_scale: 100.0,
            population: None,
        }
    }
}

impl Parameters {
    /// Reads parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or fails validation.
    pub fn load(path: &Path) -> Result<Parameters, SimError> {
        trace!("Loading parameters from {}", path.display());
        let data = fs::read_to_string(path)?;
        let parameters: Parameters = serde_json::from_str(&data)?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// # Errors
    ///
    /// Returns `SimError::InvalidParameters` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.bound == 0 {
            return Err("bound must be positive".into());
        }
        if self.bound.checked_mul(self.bound).map_or(true, |cells| cells > MAX_CELLS) {
            return Err(format!(
                "bound ({}) gives more than {MAX_CELLS} grid cells",
                self.bound
            )
            .into());
        }
        if self.initial_infected > self.num_agents {
            return Err(format!(
                "initial_infected ({}) exceeds num_agents ({})",
                self.initial_infected, self.num_agents
            )
            .into());
        }
        if !(self.beds_per_thousand >= 0.0 && self.min_beds >= 0.0 && self.bed_scale >= 0.0) {
            return Err("bed scaling factors must be non-negative".into());
        }
        Ok(())
    }

    pub fn modeled_population(&self) -> usize {
        self.population.unwrap_or(self.num_agents)
    }

    /// Beds per hospital: `max(min_beds, population / 1000 * beds_per_thousand) * bed_scale`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn bed_capacity(&self, population: usize) -> u32 {
        let per_thousand = population as f64 / 1000.0 * self.beds_per_thousand;
        (self.min_beds.max(per_thousand) * self.bed_scale).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_bed_capacity() {
        let parameters = Parameters::default();
        // 300 people is well under the floor of 5 beds.
        assert_eq!(parameters.bed_capacity(300), 500);
        // 10,000 people -> 23.5 beds per hospital.
        assert_eq!(parameters.bed_capacity(10_000), 2350);
    }

    #[test]
    fn load_fills_in_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "num_agents": 20, "initial_infected": 2, "bed_scale": 1.0 }}"#)
            .unwrap();
        let parameters = Parameters::load(file.path()).unwrap();
        assert_eq!(parameters.num_agents, 20);
        assert_eq!(parameters.initial_infected, 2);
        assert_eq!(parameters.bound, Parameters::default().bound);
        assert_eq!(parameters.bed_capacity(parameters.modeled_population()), 5);
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "num_agentz": 20 }}"#).unwrap();
        assert!(matches!(
            Parameters::load(file.path()),
            Err(SimError::JsonError(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        assert!(matches!(
            Parameters::load(Path::new("does/not/exist.json")),
            Err(SimError::IoError(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let parameters = Parameters {
            bound: 0,
            ..Parameters::default()
        };
        assert!(parameters.validate().is_err());

        let parameters = Parameters {
            num_agents: 3,
            initial_infected: 4,
            ..Parameters::default()
        };
        assert!(parameters.validate().is_err());

        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_huge_bound() {
        let parameters = Parameters {
            bound: 1 << 32,
            ..Parameters::default()
        };
        assert!(matches!(
            parameters.validate(),
            Err(SimError::InvalidParameters(_))
        ));

        let parameters = Parameters {
            bound: 500,
            ..Parameters::default()
        };
        assert!(parameters.validate().is_ok());
    }
}
