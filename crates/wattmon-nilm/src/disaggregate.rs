//! The disaggregation orchestrator.
//!
//! Takes a regularized day table, hands its mains signal to the external
//! model runner for the household's appliances, and merges the per-appliance
//! predictions back in with a residual `noise` channel.

use std::path::{Path, PathBuf};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::debug;
use wattmon_types::{Metadata, POWER_FIELD};

use crate::appliance::Appliance;
use crate::error::{Error, Result};
use crate::runner::ModelRunner;
use crate::table::RegularTable;
use crate::{INTERVAL, PERIODS};

/// Output column holding the residual power unattributed to any appliance.
pub const NOISE_FIELD: &str = "noise";

/// Column name the model expects in its prediction files.
const PREDS_COLUMN: &str = "preds";

/// Timestamp layout of the model-input `time` column.
const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

/// The appliances flagged as present for a household: the full catalog
/// intersected with truthy metadata flags, so the model is only asked about
/// appliances that exist.
pub fn household_appliances(meta: &Metadata) -> Vec<Appliance> {
    Appliance::ALL
        .into_iter()
        .filter(|a| meta.truthy(a.key()))
        .collect()
}

/// Orchestrates one disaggregation pass over a [`RegularTable`].
pub struct Disaggregator<R> {
    runner: R,
    input_path: PathBuf,
}

impl<R: ModelRunner> Disaggregator<R> {
    /// Create an orchestrator writing model input to `input_path`.
    pub fn new(runner: R, input_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            input_path: input_path.into(),
        }
    }

    /// Where the model-input CSV is written.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Decompose the table's mains power into per-appliance `pred_*` columns
    /// plus a `noise` residual.
    ///
    /// Guarantees on the result:
    /// - for every row with a non-null original power value,
    ///   `power == noise + Σ pred_*` (noise is the subtraction remainder);
    /// - every `pred_*` value is non-negative, rescaled so the series
    ///   maximum equals the household's `max_scale_*` ceiling;
    /// - every row whose original power was null has all value columns
    ///   forced to null, whatever the model produced for that slot.
    ///
    /// Null power values are filled with the day's rounded mean power in
    /// the model input only; the fill is never written to the output.
    pub async fn disaggregate(&self, table: &RegularTable, meta: &Metadata) -> Result<RegularTable> {
        let mut table = table.clone();

        let appliances = household_appliances(meta);

        // Calibration ceilings are required up front: a missing one is a
        // configuration defect, caught before any model work starts.
        let mut scales = Vec::with_capacity(appliances.len());
        for &appliance in &appliances {
            let scale = meta
                .f64(&appliance.scale_key())
                .ok_or(Error::MissingScaleMetadata { appliance })?;
            scales.push(scale);
        }

        let power: Vec<Option<f64>> = table
            .column(POWER_FIELD)
            .ok_or_else(|| {
                Error::DisaggregationFailed(format!("input has no `{POWER_FIELD}` column"))
            })?
            .to_vec();

        let mut predictions: Vec<(Appliance, Vec<f64>)> = Vec::with_capacity(appliances.len());

        if appliances.is_empty() {
            debug!(date = %table.date(), "no appliances flagged for this household; skipping model");
        } else {
            self.write_model_input(&table, &power)?;

            let outputs = self
                .runner
                .run(&self.input_path, &appliances, INTERVAL)
                .await
                .map_err(|e| Error::DisaggregationFailed(format!("model runner: {e}")))?;

            for (&appliance, &scale) in appliances.iter().zip(&scales) {
                let path = outputs
                    .iter()
                    .find(|(a, _)| *a == appliance)
                    .map(|(_, p)| p.clone())
                    .ok_or_else(|| {
                        Error::DisaggregationFailed(format!(
                            "model runner returned no output for `{appliance}`"
                        ))
                    })?;

                let preds = read_predictions(&path)?;
                let preds = align_predictions(preds, appliance)?;
                predictions.push((appliance, rescale(preds, scale)));
            }
        }

        // Residual from the original power column, never the filled one.
        let noise: Vec<Option<f64>> = (0..PERIODS)
            .map(|row| {
                power[row].map(|p| {
                    p - predictions.iter().map(|(_, v)| v[row]).sum::<f64>()
                })
            })
            .collect();

        for (appliance, preds) in predictions {
            let name = appliance.pred_column();
            table.remove_column(&name);
            table.push_column(name, preds.into_iter().map(Some).collect())?;
        }
        table.remove_column(NOISE_FIELD);
        table.push_column(NOISE_FIELD, noise)?;

        // A slot with no mains reading carries no derived output at all.
        for row in 0..PERIODS {
            if power[row].is_none() {
                table.mask_row(row);
            }
        }

        Ok(table)
    }

    /// Serialize the model input: `time,mains`, one row per grid slot, with
    /// null power filled by the day's rounded mean.
    fn write_model_input(&self, table: &RegularTable, power: &[Option<f64>]) -> Result<()> {
        let present: Vec<f64> = power.iter().flatten().copied().collect();
        if present.is_empty() {
            return Err(Error::DisaggregationFailed(
                "day has no mains power samples".to_string(),
            ));
        }
        let mean = (present.iter().sum::<f64>() / present.len() as f64).round();

        if let Some(parent) = self.input_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.input_path)?;
        writer.write_record(["time", "mains"])?;
        for (row, value) in power.iter().enumerate() {
            let time = table
                .slot_instant(row)
                .format(&TIME_FORMAT)
                .map_err(|e| {
                    Error::DisaggregationFailed(format!("formatting model input time: {e}"))
                })?;
            let mains = value.unwrap_or(mean);
            writer.write_record([time, mains.to_string()])?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Read a prediction file's `preds` column. Shape and parse problems are
/// surfaced as [`Error::DisaggregationFailed`] so they never corrupt output
/// silently.
fn read_predictions(path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        Error::DisaggregationFailed(format!("reading predictions {}: {e}", path.display()))
    })?;

    let headers = reader.headers().map_err(|e| {
        Error::DisaggregationFailed(format!("reading predictions {}: {e}", path.display()))
    })?;
    let index = headers
        .iter()
        .position(|h| h == PREDS_COLUMN)
        .ok_or_else(|| {
            Error::DisaggregationFailed(format!(
                "prediction file {} has no `{PREDS_COLUMN}` column",
                path.display()
            ))
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            Error::DisaggregationFailed(format!("reading predictions {}: {e}", path.display()))
        })?;
        let field = record.get(index).unwrap_or_default();
        let value: f64 = field.trim().parse().map_err(|_| {
            Error::DisaggregationFailed(format!(
                "prediction file {} has non-numeric `{PREDS_COLUMN}` value `{field}`",
                path.display()
            ))
        })?;
        values.push(value);
    }

    Ok(values)
}

/// Left-pad a head-truncated prediction series with zeros so its tail stays
/// aligned with the input rows.
fn align_predictions(preds: Vec<f64>, appliance: Appliance) -> Result<Vec<f64>> {
    if preds.len() > PERIODS {
        return Err(Error::DisaggregationFailed(format!(
            "`{appliance}` predictions have {} rows for a {PERIODS}-row input",
            preds.len()
        )));
    }
    let mut aligned = vec![0.0; PERIODS - preds.len()];
    aligned.extend(preds);
    Ok(aligned)
}

/// Clamp negatives to zero and rescale so the series maximum equals the
/// appliance's physical ceiling. An all-zero series stays all-zero.
fn rescale(mut preds: Vec<f64>, max_scale: f64) -> Vec<f64> {
    for v in &mut preds {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
    let max = preds.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        for v in &mut preds {
            *v *= max_scale / max;
        }
    }
    preds
}
