//! QC threshold configuration.
//!
//! The threshold document is a closed set of checks: every check the engine
//! can apply has exactly one entry, and a document missing an entry fails to
//! deserialize. Each entry pairs a numeric threshold with the status
//! increment the check contributes when it fires.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};

/// The closed set of quality checks.
///
/// Accumulated status codes decompose into these (the default increments are
/// distinct powers of two), so a summary row's status is explainable as the
/// set of checks that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckId {
    /// Total read count below threshold.
    TotalReads,
    /// Fraction of uniquely aligned reads below threshold.
    AlignPct,
    /// Residual expression of a deleted gene above threshold.
    DeletionFow,
    /// Fold-over-wildtype of an overexpressed gene below threshold.
    OverexpressionFow,
    /// Resistance-marker fold-over-median inconsistent with the genotype.
    MarkerFom,
    /// Replicate flagged as a concordance outlier.
    CovMed,
}

impl CheckId {
    /// All checks, in status-accumulation order.
    pub const ALL: [CheckId; 6] = [
        CheckId::TotalReads,
        CheckId::AlignPct,
        CheckId::DeletionFow,
        CheckId::OverexpressionFow,
        CheckId::MarkerFom,
        CheckId::CovMed,
    ];

    /// The entry name under which this check is configured.
    pub fn config_key(&self) -> &'static str {
        match self {
            CheckId::TotalReads => "TOTAL_READS",
            CheckId::AlignPct => "ALIGN_PCT",
            CheckId::DeletionFow => "MUT_FOW.DELETION",
            CheckId::OverexpressionFow => "MUT_FOW.OVEREXPRESSION",
            CheckId::MarkerFom => "MARKER_FOM",
            CheckId::CovMed => "COV_MED",
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_key())
    }
}

/// Threshold plus status increment for one check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckRule {
    /// Numeric cut-off; the comparison direction depends on the check.
    pub threshold: f64,
    /// Increment added to the sample status when the check fires.
    pub status: u32,
}

/// Rules for the two fold-over-wildtype polarities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FowRules {
    /// Deletion fails when FOW exceeds the threshold (residual expression).
    #[serde(rename = "DELETION")]
    pub deletion: CheckRule,
    /// Overexpression fails when FOW falls below the threshold.
    #[serde(rename = "OVEREXPRESSION")]
    pub overexpression: CheckRule,
}

/// Rule for the resistance-marker check, with an optional noise floor on
/// the reference-median computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerRule {
    pub threshold: f64,
    pub status: u32,
    /// Samples only qualify for a marker's reference median when the
    /// marker expression strictly exceeds this floor (0.0 = any nonzero).
    #[serde(default)]
    pub noise_floor: f64,
}

/// The full QC threshold document.
///
/// Entry names match the YAML layout used by the upstream pipeline, so
/// existing `qc_config.yaml` files load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcThresholds {
    #[serde(rename = "TOTAL_READS")]
    pub total_reads: CheckRule,
    #[serde(rename = "ALIGN_PCT")]
    pub align_pct: CheckRule,
    #[serde(rename = "MUT_FOW")]
    pub mut_fow: FowRules,
    #[serde(rename = "MARKER_FOM")]
    pub marker_fom: MarkerRule,
    #[serde(rename = "COV_MED")]
    pub cov_med: CheckRule,
}

impl Default for QcThresholds {
    fn default() -> Self {
        QcThresholds {
            total_reads: CheckRule {
                threshold: 1_000_000.0,
                status: 1,
            },
            align_pct: CheckRule {
                threshold: 0.85,
                status: 2,
            },
            mut_fow: FowRules {
                deletion: CheckRule {
                    threshold: 0.2,
                    status: 4,
                },
                overexpression: CheckRule {
                    threshold: 4.0,
                    status: 8,
                },
            },
            marker_fom: MarkerRule {
                threshold: 1.5,
                status: 16,
                noise_floor: 0.0,
            },
            cov_med: CheckRule {
                threshold: 0.15,
                status: 32,
            },
        }
    }
}

impl QcThresholds {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let thresholds: QcThresholds = serde_yaml::from_str(yaml)?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(QcError::from)
    }

    /// The rule for one check.
    pub fn rule(&self, check: CheckId) -> CheckRule {
        match check {
            CheckId::TotalReads => self.total_reads,
            CheckId::AlignPct => self.align_pct,
            CheckId::DeletionFow => self.mut_fow.deletion,
            CheckId::OverexpressionFow => self.mut_fow.overexpression,
            CheckId::MarkerFom => CheckRule {
                threshold: self.marker_fom.threshold,
                status: self.marker_fom.status,
            },
            CheckId::CovMed => self.cov_med,
        }
    }

    /// The threshold for one check.
    pub fn threshold(&self, check: CheckId) -> f64 {
        self.rule(check).threshold
    }

    /// The status increment for one check.
    pub fn status(&self, check: CheckId) -> u32 {
        self.rule(check).status
    }

    /// Noise floor on the marker reference-median computation.
    pub fn marker_noise_floor(&self) -> f64 {
        self.marker_fom.noise_floor
    }

    fn validate(&self) -> Result<()> {
        for check in CheckId::ALL {
            let rule = self.rule(check);
            if !rule.threshold.is_finite() {
                return Err(QcError::Config(format!(
                    "{}: threshold must be finite, got {}",
                    check.config_key(),
                    rule.threshold
                )));
            }
            if rule.status == 0 {
                return Err(QcError::Config(format!(
                    "{}: status increment must be >= 1",
                    check.config_key()
                )));
            }
        }
        if self.marker_fom.noise_floor < 0.0 || !self.marker_fom.noise_floor.is_finite() {
            return Err(QcError::Config(format!(
                "MARKER_FOM: noise_floor must be finite and non-negative, got {}",
                self.marker_fom.noise_floor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_YAML: &str = "\
TOTAL_READS:
  threshold: 500000
  status: 1
ALIGN_PCT:
  threshold: 0.9
  status: 2
MUT_FOW:
  DELETION:
    threshold: 0.1
    status: 4
  OVEREXPRESSION:
    threshold: 2.5
    status: 8
MARKER_FOM:
  threshold: 1.5
  status: 16
  noise_floor: 150
COV_MED:
  threshold: 0.2
  status: 32
";

    #[test]
    fn test_load_full_document() {
        let thresholds = QcThresholds::from_yaml(FULL_YAML).unwrap();
        assert_eq!(thresholds.threshold(CheckId::TotalReads), 500_000.0);
        assert_eq!(thresholds.status(CheckId::OverexpressionFow), 8);
        assert_eq!(thresholds.threshold(CheckId::DeletionFow), 0.1);
        assert_eq!(thresholds.marker_noise_floor(), 150.0);
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        // Drop the COV_MED entry entirely.
        let truncated = FULL_YAML.split("COV_MED").next().unwrap();
        assert!(QcThresholds::from_yaml(truncated).is_err());
    }

    #[test]
    fn test_missing_polarity_is_an_error() {
        let yaml = FULL_YAML.replace(
            "  OVEREXPRESSION:\n    threshold: 2.5\n    status: 8\n",
            "",
        );
        assert!(QcThresholds::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_noise_floor_defaults_to_zero() {
        let yaml = FULL_YAML.replace("  noise_floor: 150\n", "");
        let thresholds = QcThresholds::from_yaml(&yaml).unwrap();
        assert_eq!(thresholds.marker_noise_floor(), 0.0);
    }

    #[test]
    fn test_default_round_trips() {
        let thresholds = QcThresholds::default();
        let yaml = thresholds.to_yaml().unwrap();
        let reloaded = QcThresholds::from_yaml(&yaml).unwrap();
        assert_eq!(thresholds, reloaded);
    }

    #[test]
    fn test_default_increments_are_distinct_powers_of_two() {
        let thresholds = QcThresholds::default();
        let mut seen = 0u32;
        for check in CheckId::ALL {
            let status = thresholds.status(check);
            assert_eq!(status.count_ones(), 1);
            assert_eq!(seen & status, 0);
            seen |= status;
        }
    }

    #[test]
    fn test_zero_status_rejected() {
        let yaml = FULL_YAML.replace("  threshold: 0.9\n  status: 2", "  threshold: 0.9\n  status: 0");
        assert!(QcThresholds::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_nonfinite_threshold_rejected() {
        let yaml = FULL_YAML.replace("threshold: 0.9", "threshold: .nan");
        assert!(QcThresholds::from_yaml(&yaml).is_err());
    }
}
