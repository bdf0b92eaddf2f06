use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::marker::PhantomData;
use std::path::Path;

use csv::Writer;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::stats::{AgeBucketStats, Stats};

/// One row of a Monte Carlo export: the summary of a single replication.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReplicationRecord {
    #[serde(rename = "Run ID")]
    pub run_id: usize,
    #[serde(rename = "Total Population")]
    pub total_population: usize,
    #[serde(rename = "Total Infected")]
    pub total_infected: usize,
    #[serde(rename = "Total Deaths")]
    pub total_deaths: usize,
    #[serde(rename = "Infection Rate %")]
    pub infection_rate: f64,
    #[serde(rename = "Mortality Rate %")]
    pub mortality_rate: f64,
    #[serde(rename = "Fully Vaccinated")]
    pub fully_vaccinated: usize,
    #[serde(rename = "Partially Vaccinated")]
    pub partially_vaccinated: usize,
    #[serde(rename = "Unvaccinated")]
    pub unvaccinated: usize,
    #[serde(rename = "Vaccine Stockout %")]
    pub stockout_rate: f64,
    #[serde(rename = "Immune Total")]
    pub immune_total: usize,
    #[serde(rename = "Immune Vaccine")]
    pub immune_vaccine: usize,
    #[serde(rename = "Immune Natural")]
    pub immune_natural: usize,
    #[serde(rename = "Immune Treatment")]
    pub immune_treatment: usize,
    #[serde(rename = "Deaths Fully Vaccinated")]
    pub deaths_fully_vaccinated: usize,
    #[serde(rename = "Deaths Partially Vaccinated")]
    pub deaths_partially_vaccinated: usize,
    #[serde(rename = "Deaths Unvaccinated")]
    pub deaths_unvaccinated: usize,
    #[serde(rename = "Age 0-17 Total")]
    pub age_0_17_total: usize,
    #[serde(rename = "Age 0-17 Infected")]
    pub age_0_17_infected: usize,
    #[serde(rename = "Age 0-17 Deaths")]
    pub age_0_17_deaths: usize,
    #[serde(rename = "Age 0-17 Mortality %")]
    pub age_0_17_mortality: f64,
    #[serde(rename = "Age 18-29 Total")]
    pub age_18_29_total: usize,
    #[serde(rename = "Age 18-29 Infected")]
    pub age_18_29_infected: usize,
    #[serde(rename = "Age 18-29 Deaths")]
    pub age_18_29_deaths: usize,
    #[serde(rename = "Age 18-29 Mortality %")]
    pub age_18_29_mortality: f64,
    #[serde(rename = "Age 30-49 Total")]
    pub age_30_49_total: usize,
    #[serde(rename = "Age 30-49 Infected")]
    pub age_30_49_infected: usize,
    #[serde(rename = "Age 30-49 Deaths")]
    pub age_30_49_deaths: usize,
    #[serde(rename = "Age 30-49 Mortality %")]
    pub age_30_49_mortality: f64,
    #[serde(rename = "Age 50-64 Total")]
    pub age_50_64_total: usize,
    #[serde(rename = "Age 50-64 Infected")]
    pub age_50_64_infected: usize,
    #[serde(rename = "Age 50-64 Deaths")]
    pub age_50_64_deaths: usize,
    #[serde(rename = "Age 50-64 Mortality %")]
    pub age_50_64_mortality: f64,
    #[serde(rename = "Age 65+ Total")]
    pub age_65_plus_total: usize,
    #[serde(rename = "Age 65+ Infected")]
    pub age_65_plus_infected: usize,
    #[serde(rename = "Age 65+ Deaths")]
    pub age_65_plus_deaths: usize,
    #[serde(rename = "Age 65+ Mortality %")]
    pub age_65_plus_mortality: f64,
}

fn bucket_columns(bucket: Option<&AgeBucketStats>) -> (usize, usize, usize, f64) {
    bucket.map_or((0, 0, 0, 0.0), |b| {
        (b.total, b.infected, b.deaths, b.mortality_rate())
    })
}

impl ReplicationRecord {
    pub fn new(run_id: usize, stats: &Stats) -> Self {
        let buckets = &stats.age_buckets;
        let (age_0_17_total, age_0_17_infected, age_0_17_deaths, age_0_17_mortality) =
            bucket_columns(buckets.first());
        let (age_18_29_total, age_18_29_infected, age_18_29_deaths, age_18_29_mortality) =
            bucket_columns(buckets.get(1));
        let (age_30_49_total, age_30_49_infected, age_30_49_deaths, age_30_49_mortality) =
            bucket_columns(buckets.get(2));
        let (age_50_64_total, age_50_64_infected, age_50_64_deaths, age_50_64_mortality) =
            bucket_columns(buckets.get(3));
        let (age_65_plus_total, age_65_plus_infected, age_65_plus_deaths, age_65_plus_mortality) =
            bucket_columns(buckets.get(4));

        ReplicationRecord {
            run_id,
            total_population: stats.total_population,
            total_infected: stats.total_infected,
            total_deaths: stats.total_deaths,
            infection_rate: stats.infection_rate(),
            mortality_rate: stats.mortality_rate(),
            fully_vaccinated: stats.vaccination.fully,
            partially_vaccinated: stats.vaccination.partially,
            unvaccinated: stats.vaccination.unvaccinated,
            stockout_rate: stats.stockout_rate(),
            immune_total: stats.immunity.total(),
            immune_vaccine: stats.immunity.vaccine,
            immune_natural: stats.immunity.natural,
            immune_treatment: stats.immunity.treatment,
            deaths_fully_vaccinated: stats.deaths_by_vaccination.fully,
            deaths_partially_vaccinated: stats.deaths_by_vaccination.partially,
            deaths_unvaccinated: stats.deaths_by_vaccination.unvaccinated,
            age_0_17_total,
            age_0_17_infected,
            age_0_17_deaths,
            age_0_17_mortality,
            age_18_29_total,
            age_18_29_infected,
            age_18_29_deaths,
            age_18_29_mortality,
            age_30_49_total,
            age_30_49_infected,
            age_30_49_deaths,
            age_30_49_mortality,
            age_50_64_total,
            age_50_64_infected,
            age_50_64_deaths,
            age_50_64_mortality,
            age_65_plus_total,
            age_65_plus_infected,
            age_65_plus_deaths,
            age_65_plus_mortality,
        }
    }
}

// Checks that the path is valid. Creates the file and all parent directories if
// they do not exist. Returns the file if successful.
fn generate_validate_filepath(path: &Path) -> Result<File, SimError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Ok(file)
        }
        _ => Err(SimError::InvalidParameters(
            "Report output files must be CSVs at this time".to_string(),
        )),
    }
}

/// Writes rows of type `T` to a CSV file, one per call to [`ReportWriter::send_report`].
pub struct ReportWriter<T: Serialize> {
    writer: Writer<File>,
    rows: usize,
    _row: PhantomData<T>,
}

impl<T: Serialize> ReportWriter<T> {
    /// Creates the report file, including any missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not end in `.csv` or the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, SimError> {
        trace!("Creating report {}", path.display());
        let file = generate_validate_filepath(path)?;
        Ok(ReportWriter {
            writer: Writer::from_writer(file),
            rows: 0,
            _row: PhantomData,
        })
    }

    /// Writes a new row and flushes it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be serialized or written.
    pub fn send_report(&mut self, row: &T) -> Result<(), SimError> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }
}
