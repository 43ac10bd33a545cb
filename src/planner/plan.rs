//! Reconciliation plan types.
//!
//! A plan is created fresh for every pass and discarded after execution.

use serde::Serialize;

use crate::config::DesiredContainerSpec;
use crate::runtime::ContainerIdentity;

/// The set of actions needed to converge the local container set.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ReconciliationPlan {
    /// Running containers to stop and remove.
    pub to_stop: Vec<ContainerIdentity>,
    /// Desired entries to pull, create, and start.
    pub to_start: Vec<PlannedStart>,
}

/// A single start entry: the logical name and its desired spec.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlannedStart {
    /// Logical container name from the desired set.
    pub name: String,
    /// Desired spec to start from.
    pub spec: DesiredContainerSpec,
}

impl ReconciliationPlan {
    /// Returns true if the plan requires no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_stop.is_empty() && self.to_start.is_empty()
    }

    /// Number of containers to stop.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.to_stop.len()
    }

    /// Number of containers to start.
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.to_start.len()
    }

    /// Total number of planned actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.stop_count() + self.start_count()
    }
}

impl std::fmt::Display for ReconciliationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "no changes required");
        }

        write!(f, "{} to stop, {} to start", self.stop_count(), self.start_count())?;

        if !self.to_stop.is_empty() {
            write!(f, "; stop: ")?;
            for (i, identity) in self.to_stop.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{identity}")?;
            }
        }

        if !self.to_start.is_empty() {
            write!(f, "; start: ")?;
            for (i, entry) in self.to_start.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", entry.name)?;
            }
        }

        Ok(())
    }
}
