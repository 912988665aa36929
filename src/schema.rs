//! Feature schema for accident records
//!
//! The schema is fixed: two geo-coordinate columns, seven categorical
//! descriptors and the `Severity` target. Tables are validated once at the
//! ingestion boundary; downstream stages receive columns with known dtypes.

use crate::error::{Result, SeverityError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Numerical feature columns
pub const NUMERICAL_COLUMNS: [&str; 2] = ["Latitude", "Longitude"];

/// Categorical feature columns
pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    "Weather",
    "Road_Condition",
    "Time_of_Day",
    "Traffic",
    "Accident_Type",
    "Vehicle_Type",
    "Accident_Reason",
];

/// Target column
pub const TARGET_COLUMN: &str = "Severity";

/// Columns dropped before transformation when present
pub const DROPPABLE_COLUMNS: [&str; 2] = ["Date", "Time"];

/// Names and roles of the columns the pipeline understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numerical: Vec<String>,
    pub categorical: Vec<String>,
    pub target: String,
    pub droppable: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::accident()
    }
}

impl FeatureSchema {
    /// The accident-record schema
    pub fn accident() -> Self {
        Self {
            numerical: NUMERICAL_COLUMNS.iter().map(|s| s.to_string()).collect(),
            categorical: CATEGORICAL_COLUMNS.iter().map(|s| s.to_string()).collect(),
            target: TARGET_COLUMN.to_string(),
            droppable: DROPPABLE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// All feature columns, numerical first
    pub fn feature_columns(&self) -> Vec<&str> {
        self.numerical
            .iter()
            .chain(self.categorical.iter())
            .map(|s| s.as_str())
            .collect()
    }

    /// Check that every feature column is present
    pub fn check_columns(&self, df: &DataFrame) -> Result<()> {
        let present: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        let missing: Vec<&str> = self
            .feature_columns()
            .into_iter()
            .filter(|c| !present.contains(c))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SeverityError::SchemaError(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Feature-only frame with numerical columns as Float64 and categorical
    /// columns as String. Extra columns are dropped.
    pub fn validate(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_columns(df)?;

        let mut columns: Vec<Column> = Vec::with_capacity(self.numerical.len() + self.categorical.len());
        for name in &self.numerical {
            let series = df.column(name)?.as_materialized_series();
            let cast = series.cast(&DataType::Float64).map_err(|e| {
                SeverityError::SchemaError(format!("column {} is not numeric: {}", name, e))
            })?;
            columns.push(cast.into_column());
        }
        for name in &self.categorical {
            let series = df.column(name)?.as_materialized_series();
            let cast = series.cast(&DataType::String).map_err(|e| {
                SeverityError::SchemaError(format!("column {} is not categorical: {}", name, e))
            })?;
            columns.push(cast.into_column());
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Separate a labeled table into validated features and string labels.
    /// `Date`/`Time` and any other non-feature columns are dropped.
    pub fn split_target(&self, df: &DataFrame) -> Result<(DataFrame, Vec<String>)> {
        let target = df.column(&self.target).map_err(|_| {
            SeverityError::SchemaError(format!("missing target column: {}", self.target))
        })?;
        let labels = target
            .as_materialized_series()
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.map(|s| s.to_string()).ok_or_else(|| {
                    SeverityError::DataError(format!("{} is missing at row {}", self.target, row))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let features = self.validate(df)?;
        Ok((features, labels))
    }
}

/// One raw accident record as collected at serving time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccidentRecord {
    pub weather: Option<String>,
    pub road_condition: Option<String>,
    pub time_of_day: Option<String>,
    pub traffic: Option<String>,
    pub accident_type: Option<String>,
    pub vehicle_type: Option<String>,
    pub accident_reason: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AccidentRecord {
    /// Shape records into the pre-encoding feature table
    pub fn to_dataframe(records: &[AccidentRecord]) -> Result<DataFrame> {
        let df = df!(
            "Weather" => text_column(records, |r| r.weather.clone()),
            "Road_Condition" => text_column(records, |r| r.road_condition.clone()),
            "Time_of_Day" => text_column(records, |r| r.time_of_day.clone()),
            "Traffic" => text_column(records, |r| r.traffic.clone()),
            "Accident_Type" => text_column(records, |r| r.accident_type.clone()),
            "Vehicle_Type" => text_column(records, |r| r.vehicle_type.clone()),
            "Accident_Reason" => text_column(records, |r| r.accident_reason.clone()),
            "Latitude" => records.iter().map(|r| r.latitude).collect::<Vec<_>>(),
            "Longitude" => records.iter().map(|r| r.longitude).collect::<Vec<_>>()
        )?;
        Ok(df)
    }
}

fn text_column(records: &[AccidentRecord], field: impl Fn(&AccidentRecord) -> Option<String>) -> Vec<Option<String>> {
    records.iter().map(field).collect()
}
