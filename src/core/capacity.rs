use std::collections::BTreeMap;

use super::store::ModelStore;
use super::types::{AthleteCounts, CapacityResult, Level, Role, RoleCapacity};

pub fn required_hours(counts: &AthleteCounts, hours_per_athlete: &BTreeMap<Level, f64>) -> f64 {
    counts
        .iter()
        .map(|(level, count)| {
            f64::from(*count) * hours_per_athlete.get(level).copied().unwrap_or(0.0)
        })
        .sum()
}

pub fn available_hours(capacity: &RoleCapacity) -> f64 {
    f64::from(capacity.headcount) * capacity.max_hours_per_week
}

pub fn evaluate_role(role: Role, counts: &AthleteCounts, capacity: &RoleCapacity) -> CapacityResult {
    let required = required_hours(counts, &capacity.hours_per_athlete);
    let available = available_hours(capacity);
    CapacityResult {
        role,
        required_hours: required,
        available_hours: available,
        sufficient: required <= available,
    }
}

pub fn run_capacity_model(store: &ModelStore) -> Vec<CapacityResult> {
    store
        .capacity()
        .iter()
        .map(|(role, capacity)| evaluate_role(*role, store.counts(), capacity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qb_capacity(headcount: u32, max_hours: f64) -> RoleCapacity {
        RoleCapacity {
            headcount,
            max_hours_per_week: max_hours,
            hours_per_athlete: BTreeMap::from([(3, 0.5), (4, 3.0)]),
        }
    }

    #[test]
    fn required_hours_sum_over_levels() {
        let counts = AthleteCounts::from([(3, 10), (4, 5)]);
        let capacity = qb_capacity(2, 20.0);
        assert_eq!(required_hours(&counts, &capacity.hours_per_athlete), 20.0);
    }

    #[test]
    fn two_practitioners_cover_the_demand() {
        let counts = AthleteCounts::from([(3, 10), (4, 5)]);
        let result = evaluate_role(Role::Qb, &counts, &qb_capacity(2, 20.0));
        assert_eq!(result.required_hours, 20.0);
        assert_eq!(result.available_hours, 40.0);
        assert!(result.sufficient);
    }

    #[test]
    fn exact_coverage_counts_as_sufficient() {
        let counts = AthleteCounts::from([(3, 10), (4, 5)]);
        let result = evaluate_role(Role::Qb, &counts, &qb_capacity(1, 20.0));
        assert_eq!(result.available_hours, 20.0);
        assert!(result.sufficient);
    }

    #[test]
    fn shortfall_flips_the_verdict() {
        let counts = AthleteCounts::from([(3, 10), (4, 5)]);
        let result = evaluate_role(Role::Qb, &counts, &qb_capacity(1, 19.0));
        assert_eq!(result.available_hours, 19.0);
        assert!(!result.sufficient);
    }

    #[test]
    fn levels_without_service_hours_contribute_nothing() {
        let counts = AthleteCounts::from([(3, 10), (4, 5), (5, 100)]);
        let capacity = qb_capacity(2, 20.0);
        assert_eq!(required_hours(&counts, &capacity.hours_per_athlete), 20.0);
    }
}
