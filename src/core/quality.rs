//! Acceptance check on the registration results file

use crate::core::geometry::is_non_zero_after_rounding;
use crate::types::{ResultExt, StackError, StackResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const OFFSET_KEY: &str = "azimuth_pixel_offset";

/// Result of a quality check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityVerdict {
    /// Sum of all azimuth pixel offsets in the results file
    pub residual: f64,
    pub accepted: bool,
}

/// Reads `azimuth_pixel_offset` entries and decides whether a pair is kept.
///
/// A pair is accepted when the summed offset is non-zero after rounding
/// half-to-even. A results file without offset lines therefore rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate;

impl QualityGate {
    /// Sum of the second field of every `azimuth_pixel_offset` line
    pub fn azimuth_offset_sum(results: &Path) -> StackResult<f64> {
        let file = File::open(results)
            .with_context(|| format!("failed to open results file '{}'", results.display()))?;

        let mut sum = 0.0;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let mut fields = line.split_whitespace();

            if fields.next() != Some(OFFSET_KEY) {
                continue;
            }

            let value = fields.next().unwrap_or_default();
            sum += value.parse::<f64>().map_err(|e| StackError::ParseValue {
                key: OFFSET_KEY.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(sum)
    }

    pub fn evaluate(&self, results: &Path) -> StackResult<QualityVerdict> {
        let residual = Self::azimuth_offset_sum(results)?;
        let accepted = is_non_zero_after_rounding(residual);

        log::debug!(
            "Quality of '{}': azimuth offset sum {:.6}, accepted: {}",
            results.display(),
            residual,
            accepted
        );

        Ok(QualityVerdict { residual, accepted })
    }
}
