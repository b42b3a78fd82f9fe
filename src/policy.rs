//! Sprayer actuation policy.
//!
//! Pure decision logic: no I/O and no shared state.

use crate::error::{Error, Result};
use crate::postprocess::Label;

/// Soil moisture (percent) below which the sprayer runs regardless of leaf health.
pub const DEFAULT_MOISTURE_THRESHOLD: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    moisture_threshold: f32,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            moisture_threshold: DEFAULT_MOISTURE_THRESHOLD,
        }
    }
}

impl DecisionPolicy {
    pub fn with_threshold(moisture_threshold: f32) -> Result<Self> {
        check_percent("moisture threshold", moisture_threshold)?;
        Ok(Self { moisture_threshold })
    }

    pub fn moisture_threshold(&self) -> f32 {
        self.moisture_threshold
    }

    /// Infection always actuates; otherwise only dry soil does.
    ///
    /// Moisture outside `[0, 100]` (or NaN) is rejected, never clamped.
    pub fn should_actuate(&self, label: Label, moisture_percent: f32) -> Result<bool> {
        check_percent("moisture", moisture_percent)?;
        Ok(label == Label::Infected || moisture_percent < self.moisture_threshold)
    }
}

pub(crate) fn check_percent(what: &str, value: f32) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("{what} must be within 0-100%, got {value}")))
    }
}
