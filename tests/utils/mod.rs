use std::fs;
use std::path::{Path, PathBuf};

use aviation_features::{Pipeline, PipelineConfig, PipelineOutput, Result};

/// Header of the raw export; `Make` is carried but never selected
pub const HEADER: &str = "Event_Id,Investigation_Type,Aircraft_damage,Aircraft_Category,Make,\
Number_of_Engines,Engine_Type,Purpose_of_flight,Total_Fatal_Injuries,Total_Serious_Injuries,\
Total_Minor_Injuries,Total_Uninjured,Weather_Condition,Broad_phase_of_flight,Event_Date,event_timestamp";

/// One raw incident; every field is the literal cell text
#[derive(Debug, Clone)]
pub struct Incident {
    pub id: String,
    pub investigation_type: String,
    pub aircraft_damage: String,
    pub aircraft_category: String,
    pub make: String,
    pub engines: String,
    pub engine_type: String,
    pub purpose: String,
    pub fatal: String,
    pub serious: String,
    pub minor: String,
    pub uninjured: String,
    pub weather: String,
    pub phase: String,
    pub event_date: String,
    pub timestamp: String,
}

impl Incident {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            investigation_type: "Accident".to_string(),
            aircraft_damage: "Substantial".to_string(),
            aircraft_category: "Airplane".to_string(),
            make: "Cessna".to_string(),
            engines: "1".to_string(),
            engine_type: "Reciprocating".to_string(),
            purpose: "Personal".to_string(),
            fatal: "0".to_string(),
            serious: "0".to_string(),
            minor: "0".to_string(),
            uninjured: "1".to_string(),
            weather: "VMC".to_string(),
            phase: "Cruise".to_string(),
            event_date: "1/1/2005".to_string(),
            timestamp: "2024-01-01 00:00:00".to_string(),
        }
    }

    pub fn injuries(mut self, fatal: &str, serious: &str, minor: &str, uninjured: &str) -> Self {
        self.fatal = fatal.to_string();
        self.serious = serious.to_string();
        self.minor = minor.to_string();
        self.uninjured = uninjured.to_string();
        self
    }

    pub fn line(&self) -> String {
        [
            &self.id,
            &self.investigation_type,
            &self.aircraft_damage,
            &self.aircraft_category,
            &self.make,
            &self.engines,
            &self.engine_type,
            &self.purpose,
            &self.fatal,
            &self.serious,
            &self.minor,
            &self.uninjured,
            &self.weather,
            &self.phase,
            &self.event_date,
            &self.timestamp,
        ]
        .map(String::as_str)
        .join(",")
    }
}

/// Four incidents covering a defined ratio, a zero denominator, missing
/// categorical values and an Engine_Type rewrite
pub fn sample_incidents() -> Vec<Incident> {
    let mut e1 = Incident::new("E1").injuries("2", "1", "0", "7");
    e1.event_date = "3/15/2001".to_string();

    let mut e2 = Incident::new("E2").injuries("0", "0", "0", "0");
    e2.engine_type = "Turbo Fan".to_string();
    e2.weather = "IMC".to_string();
    e2.event_date = "7/4/1999".to_string();

    let mut e3 = Incident::new("E3").injuries("1", "", "2", "3");
    e3.engine_type = String::new();
    e3.weather = String::new();
    e3.event_date = "12/31/2010".to_string();

    let mut e4 = Incident::new("E4").injuries("0", "2", "", "1");
    e4.engine_type = "Unknown".to_string();

    vec![e1, e2, e3, e4]
}

/// CSV text of a set of incidents
pub fn csv_text(incidents: &[Incident]) -> String {
    let mut text = String::from(HEADER);
    for incident in incidents {
        text.push('\n');
        text.push_str(&incident.line());
    }
    text.push('\n');
    text
}

/// Write incidents to `incidents.csv` inside `dir`
pub fn write_csv(dir: &Path, incidents: &[Incident]) -> PathBuf {
    let path = dir.join("incidents.csv");
    fs::write(&path, csv_text(incidents)).unwrap();
    path
}

/// Default configuration reading `input` and writing into `output`
pub fn config(input: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        input: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        ..PipelineConfig::default()
    }
}

/// Run the pipeline over `incidents` written to a scratch file in `scratch`
pub fn run(scratch: &Path, output: &Path, incidents: &[Incident]) -> Result<PipelineOutput> {
    let input = write_csv(scratch, incidents);
    Pipeline::new(config(&input, output))?.run()
}
