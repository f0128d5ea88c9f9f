/// Tiered machine search and the organization picker filter
use crate::domain::{Machine, Organization};

/// Ranked subset of the fleet for one query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub machines: Vec<Machine>,
    /// Partial matches dropped by the cap
    pub capped: usize,
}

/// Rank `fleet` against `query`.
///
/// Tiers, in order: exact id, exact name (queries longer than two
/// characters), then substring on name/model/category/id. Fleet order is
/// kept within a tier. Only the substring tier is capped at `max_results`.
/// An empty query returns the fleet as-is. Unkeyed machines only take
/// part in the name, model and category comparisons.
pub fn rank(fleet: &[Machine], query: &str, max_results: usize) -> SearchResult {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SearchResult {
            machines: fleet.to_vec(),
            capped: 0,
        };
    }

    let mut taken = vec![false; fleet.len()];
    let mut ranked = Vec::new();

    for (i, machine) in fleet.iter().enumerate() {
        if machine.id.as_deref().map(str::to_lowercase).as_deref() == Some(needle.as_str()) {
            taken[i] = true;
            ranked.push(machine.clone());
        }
    }

    if needle.chars().count() > 2 {
        for (i, machine) in fleet.iter().enumerate() {
            if taken[i] {
                continue;
            }
            if machine.name.as_deref().map(str::to_lowercase).as_deref() == Some(needle.as_str()) {
                taken[i] = true;
                ranked.push(machine.clone());
            }
        }
    }

    let mut partial = 0usize;
    for (i, machine) in fleet.iter().enumerate() {
        if taken[i] || !contains_query(machine, &needle) {
            continue;
        }
        partial += 1;
        if partial <= max_results {
            ranked.push(machine.clone());
        }
    }

    SearchResult {
        machines: ranked,
        capped: partial.saturating_sub(max_results),
    }
}

fn contains_query(machine: &Machine, needle: &str) -> bool {
    let fields = [
        machine.name.as_deref().unwrap_or(""),
        machine.model_text(),
        machine.category.as_deref().unwrap_or(""),
        machine.id.as_deref().unwrap_or(""),
    ];
    fields.iter().any(|f| f.to_lowercase().contains(needle))
}

/// Case-insensitive substring match on organization name or id.
/// A blank query keeps every organization.
pub fn filter_organizations(organizations: &[Organization], query: &str) -> Vec<Organization> {
    let needle = query.trim().to_lowercase();
    organizations
        .iter()
        .filter(|org| {
            needle.is_empty()
                || org.id.to_lowercase().contains(&needle)
                || org
                    .name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(result: &SearchResult) -> Vec<&str> {
        result
            .machines
            .iter()
            .map(|m| m.id.as_deref().unwrap_or("?"))
            .collect()
    }

    fn scenario_fleet() -> Vec<Machine> {
        vec![
            Machine::new("m1").with_name("Tractor A").with_location(1.0, 2.0),
            Machine::new("m2").with_name("Tractor B"),
        ]
    }

    #[test]
    fn test_empty_query_is_identity() {
        let fleet = scenario_fleet();
        let result = rank(&fleet, "", 1);
        assert_eq!(result.machines, fleet);
        assert_eq!(result.capped, 0);
        assert_eq!(rank(&fleet, "   ", 1).machines, fleet);
    }

    #[test]
    fn test_partial_name_match_returns_both() {
        let result = rank(&scenario_fleet(), "trac", 100);
        assert_eq!(ids(&result), vec!["m1", "m2"]);
    }

    #[test]
    fn test_exact_id_returns_only_that_machine() {
        let result = rank(&scenario_fleet(), "m2", 100);
        assert_eq!(ids(&result), vec!["m2"]);
    }

    #[test]
    fn test_exact_id_is_case_insensitive() {
        let result = rank(&scenario_fleet(), "M1", 100);
        assert_eq!(ids(&result), vec!["m1"]);
    }

    #[test]
    fn test_tiers_precede_fleet_order() {
        let fleet = vec![
            Machine::new("a").with_name("planter 7"),
            Machine::new("b").with_name("Planter"),
            Machine::new("planter"),
        ];
        let result = rank(&fleet, "planter", 100);
        assert_eq!(ids(&result), vec!["planter", "b", "a"]);
    }

    #[test]
    fn test_short_query_skips_exact_name_tier() {
        let fleet = vec![
            Machine::new("x1").with_name("go kart"),
            Machine::new("x2").with_name("Go"),
        ];
        // "go" is too short for the exact-name tier, so fleet order holds.
        let result = rank(&fleet, "go", 100);
        assert_eq!(ids(&result), vec!["x1", "x2"]);
    }

    #[test]
    fn test_matches_model_and_category() {
        let fleet = vec![
            Machine::new("c1").with_model("S780 Combine"),
            Machine::new("c2").with_category("Sprayer"),
            Machine::new("c3").with_name("Other"),
        ];
        assert_eq!(ids(&rank(&fleet, "s780", 100)), vec!["c1"]);
        assert_eq!(ids(&rank(&fleet, "spray", 100)), vec!["c2"]);
    }

    #[test]
    fn test_partial_tier_capped_and_counted() {
        let fleet: Vec<Machine> = (0..250)
            .map(|i| Machine::new(format!("unit-{}", i)).with_name("Harvester"))
            .collect();
        let result = rank(&fleet, "harv", 100);
        assert_eq!(result.machines.len(), 100);
        assert_eq!(result.capped, 150);
        assert_eq!(result.machines[0].id.as_deref(), Some("unit-0"));
    }

    #[test]
    fn test_exact_tiers_never_truncated() {
        let mut fleet: Vec<Machine> = (0..5)
            .map(|i| Machine::new(format!("t{}", i)).with_name("Tractor"))
            .collect();
        fleet.push(Machine::new("t9").with_name("Tractor 9"));
        let result = rank(&fleet, "tractor", 2);
        assert_eq!(result.machines.len(), 6);
        assert_eq!(result.machines[5].id.as_deref(), Some("t9"));
        assert_eq!(result.capped, 0);
    }

    #[test]
    fn test_result_never_exceeds_cap_without_exact_hits() {
        let fleet: Vec<Machine> = (0..40).map(|i| Machine::new(format!("m{}", i))).collect();
        for cap in [1usize, 5, 39] {
            assert!(rank(&fleet, "m", cap).machines.len() <= cap);
        }
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(rank(&scenario_fleet(), "combine", 10).machines.is_empty());
    }

    #[test]
    fn test_unkeyed_machine_found_by_name_only() {
        let mut fleet = scenario_fleet();
        fleet.insert(0, Machine::unkeyed().with_name("Orphan Combine"));

        let result = rank(&fleet, "orphan", 100);
        assert_eq!(result.machines.len(), 1);
        assert_eq!(result.machines[0].name.as_deref(), Some("Orphan Combine"));

        // Exact-name tier still applies; id tiers simply never match it.
        assert_eq!(ids(&rank(&fleet, "orphan combine", 100)), vec!["?"]);
        assert_eq!(ids(&rank(&fleet, "m1", 100)), vec!["m1"]);
        assert_eq!(rank(&fleet, "", 100).machines.len(), 3);
    }

    #[test]
    fn test_filter_organizations_by_name_or_id() {
        let orgs = vec![
            Organization::new("4711", "Green Acres"),
            Organization::new("9001", "Prairie Farms"),
        ];
        let names = |found: Vec<Organization>| -> Vec<String> {
            found.into_iter().map(|o| o.id).collect()
        };
        assert_eq!(names(filter_organizations(&orgs, "ACRES")), vec!["4711"]);
        assert_eq!(names(filter_organizations(&orgs, "900")), vec!["9001"]);
        assert_eq!(filter_organizations(&orgs, "  ").len(), 2);
        assert!(filter_organizations(&orgs, "orchard").is_empty());
    }
}
