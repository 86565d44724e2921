//! Output drain loop.
//!
//! Pulls output units from a transform until it asks for more input,
//! concatenating every produced payload in call order.

use crate::{Buffer, OutputRequirements, PumpError, TransformHandle, TransformStatus};

/// Cached output requirements.
///
/// Becomes stale after a `FormatChanged` status; a stale cache is always
/// refreshed from the transform before the next drain or submission.
#[derive(Debug, Default)]
pub struct RequirementsCache {
    current: Option<OutputRequirements>,
}

impl RequirementsCache {
    /// Create an empty (stale) cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the requirements must be re-queried.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.current.is_none()
    }

    /// Mark the cached requirements as stale.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Query the transform and cache the result.
    pub fn refresh<T: TransformHandle + ?Sized>(&mut self, transform: &mut T) -> OutputRequirements {
        let requirements = transform.query_output_requirements();
        tracing::trace!(
            min_buffer_size = requirements.min_buffer_size,
            provides_own_buffers = requirements.provides_own_buffers,
            "Output requirements refreshed"
        );
        self.current = Some(requirements);
        requirements
    }

    /// Requirements to use for the next drain call.
    ///
    /// Re-queries when stale, and whenever the pump is responsible for
    /// allocating output buffers.
    pub fn for_drain<T: TransformHandle + ?Sized>(&mut self, transform: &mut T) -> OutputRequirements {
        match self.current {
            Some(requirements) if requirements.provides_own_buffers => requirements,
            _ => self.refresh(transform),
        }
    }
}

/// Bytes gathered by one drain loop.
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Concatenated payload of every produced unit, in order.
    pub data: Vec<u8>,
    /// Number of output units produced.
    pub units: usize,
    /// True if the loop stopped on `FormatChanged` rather than
    /// `NeedsMoreInput`; `data` is then a partial result.
    pub format_changed: bool,
}

/// Drain the transform until it needs more input.
///
/// - `Produced`: append the unit's bytes and keep going.
/// - `NeedsMoreInput`: return everything gathered (possibly nothing).
/// - `FormatChanged`: invalidate `requirements` and return the partial
///   result, flagged.
/// - `Failed`: discard the partial result and return `DrainFailed`.
pub fn drain_output<T: TransformHandle + ?Sized>(
    transform: &mut T,
    requirements: &mut RequirementsCache,
) -> Result<DrainOutcome, PumpError> {
    let mut outcome = DrainOutcome::default();

    loop {
        let reqs = requirements.for_drain(transform);
        let buffer = if reqs.provides_own_buffers {
            None
        } else {
            Some(Buffer::allocate(reqs.min_buffer_size))
        };

        match transform.drain_one(buffer) {
            TransformStatus::Produced(unit) => {
                let appended = unit.append_to(&mut outcome.data)?;
                outcome.units += 1;
                tracing::trace!(unit = outcome.units, bytes = appended, "Output unit produced");
                // unit and its buffers are released here
            }
            TransformStatus::NeedsMoreInput => return Ok(outcome),
            TransformStatus::FormatChanged => {
                tracing::info!(
                    units = outcome.units,
                    bytes = outcome.data.len(),
                    "Transform output format changed; requirements must be re-queried"
                );
                requirements.invalidate();
                outcome.format_changed = true;
                return Ok(outcome);
            }
            TransformStatus::Failed(code) => {
                tracing::error!(
                    code,
                    discarded_units = outcome.units,
                    "Transform failed while draining"
                );
                return Err(PumpError::DrainFailed(code));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransform, Step};

    #[test]
    fn test_zero_units() {
        let mut transform = ScriptedTransform::new();
        let mut cache = RequirementsCache::new();

        let outcome = drain_output(&mut transform, &mut cache).unwrap();
        assert!(outcome.data.is_empty());
        assert_eq!(outcome.units, 0);
        assert!(!outcome.format_changed);
    }

    #[test]
    fn test_many_units_concatenate_in_order() {
        let mut transform = ScriptedTransform::new().with_script([
            Step::produce(&[1, 2]),
            Step::Produce(vec![vec![3], vec![4, 5]]),
            Step::produce(&[6]),
            Step::NeedMore,
            Step::produce(&[99]),
        ]);
        let mut cache = RequirementsCache::new();

        let outcome = drain_output(&mut transform, &mut cache).unwrap();
        assert_eq!(outcome.data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(outcome.units, 3);

        // Nothing was pulled past NeedsMoreInput.
        assert_eq!(transform.log().drain_calls, 4);
        assert_eq!(transform.remaining_steps(), 1);
    }

    #[test]
    fn test_format_change_returns_partial_and_invalidates() {
        let mut transform = ScriptedTransform::new().with_script([
            Step::produce(&[1]),
            Step::FormatChange,
            Step::produce(&[2]),
        ]);
        let mut cache = RequirementsCache::new();

        let outcome = drain_output(&mut transform, &mut cache).unwrap();
        assert_eq!(outcome.data, vec![1]);
        assert!(outcome.format_changed);
        assert!(cache.is_stale());
        assert_eq!(transform.remaining_steps(), 1);

        // The next drain re-queries before pulling the post-change unit.
        let outcome = drain_output(&mut transform, &mut cache).unwrap();
        assert_eq!(outcome.data, vec![2]);
        assert!(!transform.log().stale_drain);
    }

    #[test]
    fn test_failure_discards_partial() {
        let mut transform = ScriptedTransform::new().with_script([
            Step::produce(&[1, 2, 3]),
            Step::Fail(-42),
        ]);
        let mut cache = RequirementsCache::new();

        let err = drain_output(&mut transform, &mut cache).unwrap_err();
        assert!(matches!(err, PumpError::DrainFailed(-42)));
    }

    #[test]
    fn test_pump_allocates_when_transform_does_not() {
        let mut transform = ScriptedTransform::new()
            .with_requirements(OutputRequirements {
                min_buffer_size: 64,
                provides_own_buffers: false,
            })
            .with_script([Step::produce(&[7; 10]), Step::produce(&[8; 10])]);
        let mut cache = RequirementsCache::new();

        let outcome = drain_output(&mut transform, &mut cache).unwrap();
        assert_eq!(outcome.units, 2);
        let log = transform.log();
        assert_eq!(log.buffers_received, 3);
        assert_eq!(log.min_capacity_received, Some(64));
        // Queried before every drain call since the pump allocates.
        assert_eq!(log.requirement_queries, 3);
    }

    #[test]
    fn test_transform_owned_buffers_query_once() {
        let mut transform = ScriptedTransform::new()
            .with_script([Step::produce(&[1]), Step::produce(&[2])]);
        let mut cache = RequirementsCache::new();

        drain_output(&mut transform, &mut cache).unwrap();
        let log = transform.log();
        assert_eq!(log.buffers_received, 0);
        assert_eq!(log.requirement_queries, 1);
    }
}
