//! Code for mapping between the three time-step granularities.
//!
//! Each year is divided into a number of full-resolution time steps (e.g. hours). For the
//! optimisation these are aggregated into contiguous blocks, the operational time steps. Investment
//! decisions are made per yearly time step.
//!
//! Operational time steps are numbered globally as `year * steps_per_year + local`, so the ID of
//! an operational step does not depend on which years a horizon step covers.
use crate::error::ModelError;
use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// An operational time step ID
pub type OperationStep = u32;

/// A yearly (investment) time step ID
pub type YearlyStep = u32;

/// The mapping between full-resolution, operational and yearly time steps for a horizon step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStepMapper {
    /// The number of full-resolution time steps per year
    full_steps_per_year: u32,
    /// The full-resolution steps making up each operational step of a year
    blocks: Vec<Range<u32>>,
    /// The yearly steps covered, in order
    years: Vec<YearlyStep>,
}

impl TimeStepMapper {
    /// Create a new mapping.
    ///
    /// # Arguments
    ///
    /// * `full_steps_per_year` - Number of full-resolution time steps in a year
    /// * `operation_steps_per_year` - Requested number of operational time steps per year. If this
    ///   is not less than `full_steps_per_year` there is no aggregation.
    /// * `years` - The yearly steps covered
    pub fn new(
        full_steps_per_year: u32,
        operation_steps_per_year: u32,
        years: Vec<YearlyStep>,
    ) -> Result<Self> {
        ensure!(
            full_steps_per_year > 0,
            ModelError::configuration(
                "unaggregated_time_steps_per_year",
                "there must be at least one time step per year"
            )
        );
        ensure!(
            operation_steps_per_year > 0,
            ModelError::configuration(
                "aggregated_time_steps_per_year",
                "the number of operational time steps cannot be zero"
            )
        );
        ensure!(!years.is_empty(), "No yearly time steps provided");

        Ok(Self {
            full_steps_per_year,
            blocks: split_into_blocks(full_steps_per_year, operation_steps_per_year),
            years,
        })
    }

    /// The number of full-resolution time steps per year
    pub fn full_steps_per_year(&self) -> u32 {
        self.full_steps_per_year
    }

    /// The number of operational time steps per year
    pub fn operation_steps_per_year(&self) -> u32 {
        self.blocks.len() as u32
    }

    /// The yearly steps covered by this mapping
    pub fn years(&self) -> &[YearlyStep] {
        &self.years
    }

    /// The first yearly step covered
    pub fn first_year(&self) -> YearlyStep {
        self.years[0]
    }

    /// Whether the given yearly step is covered
    pub fn contains_year(&self, year: YearlyStep) -> bool {
        self.years.contains(&year)
    }

    /// Whether the given operational step is covered
    pub fn contains_operation_step(&self, step: OperationStep) -> bool {
        self.contains_year(self.invest_step_of(step))
    }

    /// The operational step containing a full-resolution step of the given year
    pub fn operation_step_of(&self, year: YearlyStep, full_step: u32) -> Option<OperationStep> {
        let local = self
            .blocks
            .iter()
            .position(|block| block.contains(&full_step))?;

        Some(year * self.operation_steps_per_year() + local as u32)
    }

    /// The yearly step an operational step belongs to
    pub fn invest_step_of(&self, step: OperationStep) -> YearlyStep {
        step / self.operation_steps_per_year()
    }

    /// The position of an operational step within its year
    pub fn local_step_of(&self, step: OperationStep) -> u32 {
        step % self.operation_steps_per_year()
    }

    /// The operational steps of a year, in order
    pub fn operation_steps_of_year(&self, year: YearlyStep) -> Range<OperationStep> {
        let per_year = self.operation_steps_per_year();
        year * per_year..(year + 1) * per_year
    }

    /// Iterate over every operational step covered, in order
    pub fn iter_operation_steps(&self) -> impl Iterator<Item = OperationStep> + '_ {
        self.years
            .iter()
            .flat_map(|year| self.operation_steps_of_year(*year))
    }

    /// The full-resolution steps (within the year) making up an operational step
    pub fn full_steps_of(&self, step: OperationStep) -> Range<u32> {
        self.blocks[self.local_step_of(step) as usize].clone()
    }

    /// The duration of an operational step, in full-resolution steps
    pub fn duration(&self, step: OperationStep) -> u32 {
        self.full_steps_of(step).len() as u32
    }

    /// The operational step before this one in the same year, wrapping around at the start
    pub fn previous_in_year(&self, step: OperationStep) -> OperationStep {
        let year_start = self.operation_steps_of_year(self.invest_step_of(step)).start;
        let local = self.local_step_of(step);
        if local == 0 {
            year_start + self.operation_steps_per_year() - 1
        } else {
            step - 1
        }
    }

    /// Aggregate a full-resolution series into an operational step by taking the mean
    pub fn aggregate_mean<F>(&self, step: OperationStep, mut value_of: F) -> Result<f64>
    where
        F: FnMut(u32) -> Result<f64>,
    {
        let full_steps = self.full_steps_of(step);
        let count = full_steps.len() as f64;
        let mut total = 0.0;
        for full_step in full_steps {
            total += value_of(full_step)?;
        }

        Ok(total / count)
    }

    /// The local operational step of each full-resolution step of a year
    pub fn sequence(&self) -> Vec<u32> {
        (0..self.full_steps_per_year)
            .map(|full_step| {
                self.blocks
                    .iter()
                    .position(|block| block.contains(&full_step))
                    .map_or(0, |local| local as u32)
            })
            .collect()
    }
}

/// Split `n` full steps into `k` contiguous blocks.
///
/// The first `n mod k` blocks are one step longer than the rest. If `k >= n`, every block is a
/// single step.
fn split_into_blocks(n: u32, k: u32) -> Vec<Range<u32>> {
    let k = k.min(n);
    let base = n / k;
    let remainder = n % k;

    let mut blocks = Vec::with_capacity(k as usize);
    let mut start = 0;
    for i in 0..k {
        let len = if i < remainder { base + 1 } else { base };
        blocks.push(start..start + len);
        start += len;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;
    use rstest::rstest;

    #[rstest]
    #[case(4, 2, vec![0..2, 2..4])]
    #[case(5, 2, vec![0..3, 3..5])]
    #[case(7, 3, vec![0..3, 3..5, 5..7])]
    #[case(3, 3, vec![0..1, 1..2, 2..3])]
    #[case(2, 5, vec![0..1, 1..2])]
    fn test_split_into_blocks(#[case] n: u32, #[case] k: u32, #[case] expected: Vec<Range<u32>>) {
        assert_eq!(split_into_blocks(n, k), expected);
    }

    #[test]
    fn test_zero_operation_steps() {
        let err = TimeStepMapper::new(4, 0, vec![0])
            .unwrap_err()
            .downcast::<ModelError>()
            .unwrap();
        assert!(matches!(err, ModelError::Configuration { .. }));
    }

    #[test]
    fn test_mapping_is_total() {
        let mapper = TimeStepMapper::new(7, 3, vec![1, 2]).unwrap();
        for year in mapper.years().to_vec() {
            let steps = (0..7)
                .map(|full| mapper.operation_step_of(year, full).unwrap())
                .collect_vec();

            // Every full step maps to one operational step and one yearly step...
            assert!(steps.iter().all(|step| mapper.invest_step_of(*step) == year));

            // ...in contiguous, non-decreasing blocks covering every operational step of the year
            assert!(steps.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
            assert_equal_steps(&steps, mapper.operation_steps_of_year(year));
        }
        assert_eq!(mapper.operation_step_of(1, 7), None);
    }

    fn assert_equal_steps(steps: &[u32], expected: Range<u32>) {
        let unique = steps.iter().copied().dedup().collect_vec();
        assert_eq!(unique, expected.collect_vec());
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let first = TimeStepMapper::new(5, 2, vec![0, 1, 2]).unwrap();
        let second = TimeStepMapper::new(5, 2, vec![0, 1, 2]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sequence(), second.sequence());
    }

    #[test]
    fn test_global_ids() {
        let mapper = TimeStepMapper::new(4, 2, vec![2, 3]).unwrap();
        assert_eq!(mapper.iter_operation_steps().collect_vec(), vec![4, 5, 6, 7]);
        assert_eq!(mapper.operation_step_of(3, 3), Some(7));
        assert_eq!(mapper.invest_step_of(5), 2);
        assert_eq!(mapper.full_steps_of(7), 2..4);
        assert!(mapper.contains_operation_step(6));
        assert!(!mapper.contains_operation_step(1));
    }

    #[test]
    fn test_previous_in_year() {
        let mapper = TimeStepMapper::new(3, 3, vec![1]).unwrap();
        assert_eq!(mapper.previous_in_year(3), 5);
        assert_eq!(mapper.previous_in_year(4), 3);
        assert_eq!(mapper.previous_in_year(5), 4);
    }

    #[test]
    fn test_aggregate_mean_and_duration() {
        let mapper = TimeStepMapper::new(5, 2, vec![0]).unwrap();
        assert_eq!(mapper.duration(0), 3);
        assert_eq!(mapper.duration(1), 2);
        let mean = |step| mapper.aggregate_mean(step, |full| Ok(full as f64)).unwrap();
        assert_approx_eq!(f64, mean(0), 1.0);
        assert_approx_eq!(f64, mean(1), 3.5);
        assert_eq!(mapper.sequence(), vec![0, 0, 0, 1, 1]);
    }
}
