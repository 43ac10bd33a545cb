//! Planner for comparing desired state against the local inventory.
//!
//! `plan` is a pure function of its inputs: no runtime calls, no clock, no
//! hidden state. Identical inputs always produce identical plans.

use tracing::debug;

use crate::config::DesiredSet;
use crate::runtime::LocalContainerRecord;

use super::plan::{PlannedStart, ReconciliationPlan};

/// Planner computing the stop and start sets for one pass.
#[derive(Debug, Default)]
pub struct Planner;

impl Planner {
    /// Creates a new planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the plan for converging the local container set.
    ///
    /// `running` is the currently running inventory (stop evaluation);
    /// `all` additionally includes exited containers (start evaluation).
    #[must_use]
    pub fn plan(
        &self,
        desired: &DesiredSet,
        running: &[LocalContainerRecord],
        all: &[LocalContainerRecord],
    ) -> ReconciliationPlan {
        let to_stop = Self::stop_set(desired, running);
        let to_start = Self::start_set(desired, all);

        debug!(
            "Planned {} stop(s), {} start(s) against {} desired entries",
            to_stop.len(),
            to_start.len(),
            desired.len()
        );

        ReconciliationPlan { to_stop, to_start }
    }

    /// A running container is stopped when it has no desired entry, its tag
    /// differs from the desired one, or the desired state is not running.
    ///
    /// A tag change therefore stops the old instance here; the replacement
    /// comes from the start set. Nothing is ever updated in place.
    fn stop_set(
        desired: &DesiredSet,
        running: &[LocalContainerRecord],
    ) -> Vec<crate::runtime::ContainerIdentity> {
        let mut to_stop = Vec::new();

        for record in running {
            let identity = record.identity();
            let stop = match desired.get(&identity.name) {
                None => true,
                Some(spec) => spec.tag != identity.tag || !spec.wants_running(),
            };

            if stop {
                debug!("Will stop {} ({})", identity, record.id);
                to_stop.push(identity);
            }
        }

        to_stop
    }

    /// A desired running entry is started unless a container with the same
    /// image and tag already exists and is currently running.
    ///
    /// A matching but stopped container does not count: it is replaced by a
    /// fresh pull/create/start, never resumed.
    fn start_set(desired: &DesiredSet, all: &[LocalContainerRecord]) -> Vec<PlannedStart> {
        let mut to_start = Vec::new();

        for (name, spec) in desired.iter() {
            if !spec.wants_running() {
                continue;
            }

            let mut found_locally = false;
            let mut is_running_locally = false;

            for record in all {
                let identity = record.identity();
                let matches = identity.image == spec.image && identity.tag == spec.tag;
                found_locally = found_locally || matches;
                is_running_locally = is_running_locally || (matches && record.is_running());
            }

            if !found_locally || !is_running_locally {
                debug!("Will start {name} from {}", spec.image_reference());
                to_start.push(PlannedStart {
                    name: name.clone(),
                    spec: spec.clone(),
                });
            }
        }

        to_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DesiredContainerSpec, DesiredRunState};
    use crate::runtime::RuntimeState;

    fn record(id: &str, image_ref: &str, state: RuntimeState) -> LocalContainerRecord {
        LocalContainerRecord {
            id: String::from(id),
            image_ref: String::from(image_ref),
            state,
        }
    }

    fn desired(entries: &[(&str, &str, Option<&str>, DesiredRunState)]) -> DesiredSet {
        entries
            .iter()
            .map(|(name, image, tag, state)| {
                (
                    (*name).to_string(),
                    DesiredContainerSpec {
                        image: (*image).to_string(),
                        tag: tag.map(String::from),
                        state: *state,
                        ..DesiredContainerSpec::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_tag_change_stops_old_and_starts_new() {
        let desired = desired(&[("app", "myrepo/app", Some("v2"), DesiredRunState::Running)]);
        let running = vec![record("c1", "myrepo/app:v1", RuntimeState::Running)];

        let plan = Planner::new().plan(&desired, &running, &running);

        assert_eq!(plan.stop_count(), 1);
        assert_eq!(plan.to_stop[0].name, "app");
        assert_eq!(plan.to_stop[0].tag.as_deref(), Some("v1"));
        assert_eq!(plan.start_count(), 1);
        assert_eq!(plan.to_start[0].name, "app");
        assert_eq!(plan.to_start[0].spec.tag.as_deref(), Some("v2"));
    }

    #[test]
    fn test_desired_stopped_entry_only_stops() {
        let desired = desired(&[("app", "myrepo/app", Some("v1"), DesiredRunState::Stopped)]);
        let running = vec![record("c1", "myrepo/app:v1", RuntimeState::Running)];

        let plan = Planner::new().plan(&desired, &running, &running);

        assert_eq!(plan.stop_count(), 1);
        assert_eq!(plan.start_count(), 0);
    }

    #[test]
    fn test_empty_desired_set_stops_everything() {
        let running = vec![
            record("c1", "myrepo/app:v1", RuntimeState::Running),
            record("c2", "library/redis:7", RuntimeState::Running),
        ];

        let plan = Planner::new().plan(&DesiredSet::new(), &running, &running);

        assert_eq!(plan.stop_count(), 2);
        assert_eq!(plan.start_count(), 0);
    }

    #[test]
    fn test_running_containers_absent_from_desired_all_stopped() {
        let desired = desired(&[("app", "myrepo/app", Some("v1"), DesiredRunState::Running)]);
        let running = vec![
            record("c1", "myrepo/app:v1", RuntimeState::Running),
            record("c2", "myrepo/orphan:v9", RuntimeState::Running),
        ];

        let plan = Planner::new().plan(&desired, &running, &running);

        assert_eq!(plan.stop_count(), 1);
        assert_eq!(plan.to_stop[0].name, "orphan");
    }

    #[test]
    fn test_matching_stopped_container_is_still_started() {
        let desired = desired(&[("app", "myrepo/app", Some("v1"), DesiredRunState::Running)]);
        let all = vec![record("c1", "myrepo/app:v1", RuntimeState::Exited)];

        let plan = Planner::new().plan(&desired, &[], &all);

        assert_eq!(plan.start_count(), 1);
        assert_eq!(plan.to_start[0].name, "app");
    }

    #[test]
    fn test_converged_inventory_yields_empty_plan() {
        let desired = desired(&[("app", "myrepo/app", Some("v2"), DesiredRunState::Running)]);
        let converged = vec![record("c1", "myrepo/app:v2", RuntimeState::Running)];

        let plan = Planner::new().plan(&desired, &converged, &converged);

        assert!(plan.is_empty());
    }

    #[test]
    fn test_non_running_entries_never_start() {
        let desired = desired(&[
            ("app", "myrepo/app", Some("v1"), DesiredRunState::Stopped),
            ("db", "library/postgres", Some("16"), DesiredRunState::Stopped),
        ]);

        let plan = Planner::new().plan(&desired, &[], &[]);

        assert_eq!(plan.start_count(), 0);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let desired = desired(&[
            ("app", "myrepo/app", Some("v2"), DesiredRunState::Running),
            ("db", "library/postgres", Some("16"), DesiredRunState::Running),
        ]);
        let running = vec![record("c1", "myrepo/app:v1", RuntimeState::Running)];
        let all = vec![
            record("c1", "myrepo/app:v1", RuntimeState::Running),
            record("c2", "library/postgres:15", RuntimeState::Exited),
        ];

        let planner = Planner::new();
        assert_eq!(
            planner.plan(&desired, &running, &all),
            planner.plan(&desired, &running, &all)
        );
    }

    #[test]
    fn test_untagged_desired_matches_untagged_local() {
        let desired = desired(&[("app", "myrepo/app", None, DesiredRunState::Running)]);
        let all = vec![record("c1", "myrepo/app", RuntimeState::Running)];

        let plan = Planner::new().plan(&desired, &all, &all);

        assert!(plan.is_empty());
    }
}
