//! Staggered cron schedules keyed by job position.
//!
//! Reschedules spread jobs across a table of position ranges so that a large
//! job set does not restart all of its pipelines at the same minute.

use thiserror::Error;

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";
pub const DEFAULT_CRON: &str = "0 0 * * *";

/// Inclusive range of 1-based job positions sharing one cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronRange {
    pub min: usize,
    pub max: usize,
    pub cron: String,
}

impl CronRange {
    pub fn new(min: usize, max: usize, cron: impl Into<String>) -> Self {
        Self {
            min,
            max,
            cron: cron.into(),
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        (self.min..=self.max).contains(&position)
    }
}

/// A cron expression paired with the timezone it is evaluated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSlot {
    pub cron: String,
    pub timezone: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronTableError {
    #[error("cron range #{index} has min {min} greater than max {max}")]
    Inverted { index: usize, min: usize, max: usize },
    #[error(
        "cron range #{index} starts at {min} but the previous range ends at {previous_max}; ranges must be ascending and contiguous"
    )]
    NotContiguous {
        index: usize,
        previous_max: usize,
        min: usize,
    },
    #[error("cron range #{index} has an empty cron expression")]
    EmptyCron { index: usize },
    #[error("cron table timezone must not be empty")]
    EmptyTimezone,
}

/// Ascending, disjoint, contiguous position ranges with a fallback slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronTable {
    timezone: String,
    default_cron: String,
    ranges: Vec<CronRange>,
}

impl CronTable {
    /// Build a table, rejecting ranges that are not ascending and contiguous.
    pub fn new(
        timezone: impl Into<String>,
        default_cron: impl Into<String>,
        ranges: Vec<CronRange>,
    ) -> Result<Self, CronTableError> {
        let table = Self {
            timezone: timezone.into(),
            default_cron: default_cron.into(),
            ranges,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), CronTableError> {
        if self.timezone.trim().is_empty() {
            return Err(CronTableError::EmptyTimezone);
        }

        let mut previous_max: Option<usize> = None;
        for (index, range) in self.ranges.iter().enumerate() {
            if range.min > range.max {
                return Err(CronTableError::Inverted {
                    index,
                    min: range.min,
                    max: range.max,
                });
            }
            if range.cron.trim().is_empty() {
                return Err(CronTableError::EmptyCron { index });
            }
            if let Some(previous_max) = previous_max
                && range.min != previous_max + 1
            {
                return Err(CronTableError::NotContiguous {
                    index,
                    previous_max,
                    min: range.min,
                });
            }
            previous_max = Some(range.max);
        }
        Ok(())
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn ranges(&self) -> &[CronRange] {
        &self.ranges
    }

    pub fn default_slot(&self) -> CronSlot {
        CronSlot {
            cron: self.default_cron.clone(),
            timezone: self.timezone.clone(),
        }
    }

    /// Slot for the job at 1-based `position`. Positions outside every range
    /// get the default slot.
    pub fn assign(&self, position: usize) -> CronSlot {
        // Ranges are sorted, so the first range whose max reaches the
        // position is the only candidate.
        let idx = self.ranges.partition_point(|range| range.max < position);
        match self.ranges.get(idx) {
            Some(range) if range.contains(position) => CronSlot {
                cron: range.cron.clone(),
                timezone: self.timezone.clone(),
            },
            _ => self.default_slot(),
        }
    }
}

impl Default for CronTable {
    /// Half-hour steps from midnight to 08:30, fifty jobs per slot.
    fn default() -> Self {
        let ranges = (0..18)
            .map(|step: usize| {
                let minutes = step * 30;
                CronRange::new(
                    step * 50 + 1,
                    (step + 1) * 50,
                    format!("{} {} * * *", minutes % 60, minutes / 60),
                )
            })
            .collect();

        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            default_cron: DEFAULT_CRON.to_string(),
            ranges,
        }
    }
}
