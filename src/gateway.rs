use crate::models::{UsageMap, UsageRecord};
use tracing::debug;

pub const GATEWAY_PROJECT: &str = "gateway";
pub const KUBO_BUCKET: &str = "gateway-kubo";
pub const LB_BUCKET: &str = "gateway-lb";

fn bucket_for(record: &UsageRecord) -> Option<&'static str> {
    if record.name.starts_with("ipfs-") || (record.is_reservation() && record.plan.contains("medium"))
    {
        Some(KUBO_BUCKET)
    } else if record.name.starts_with("gateway-")
        || (record.is_reservation() && record.plan.contains("small"))
    {
        Some(LB_BUCKET)
    } else {
        None
    }
}

/// Re-keys the `gateway` project's usage into Kubo and load-balancer buckets.
/// Every other project is discarded, as are gateway lines matching neither bucket.
pub fn split_gateways(mut usages: UsageMap) -> UsageMap {
    let gateways = usages.remove(GATEWAY_PROJECT).unwrap_or_default();
    let mut split = UsageMap::new();
    let mut dropped = 0usize;

    for record in gateways {
        match bucket_for(&record) {
            Some(bucket) => split.entry(bucket.to_string()).or_default().push(record),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "gateway usage lines matched neither bucket");
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HARDWARE_RESERVATION;

    fn named(name: &str) -> UsageRecord {
        UsageRecord {
            name: name.into(),
            usage_type: "Instance".into(),
            total: 1.0,
            ..Default::default()
        }
    }

    fn reservation(plan: &str) -> UsageRecord {
        UsageRecord {
            plan: plan.into(),
            usage_type: HARDWARE_RESERVATION.into(),
            ..Default::default()
        }
    }

    #[test]
    fn splits_by_name_prefix() {
        let kubo = named("ipfs-node-1");
        let lb = named("gateway-lb-1");
        let usages = UsageMap::from([(GATEWAY_PROJECT.to_string(), vec![kubo.clone(), lb.clone()])]);

        let split = split_gateways(usages);
        assert_eq!(split[KUBO_BUCKET], vec![kubo]);
        assert_eq!(split[LB_BUCKET], vec![lb]);
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn splits_reservations_by_plan_size() {
        let medium = reservation("m3.medium.x86");
        let small = reservation("c3.small.x86");
        let usages =
            UsageMap::from([(GATEWAY_PROJECT.to_string(), vec![medium.clone(), small.clone()])]);

        let split = split_gateways(usages);
        assert_eq!(split[KUBO_BUCKET], vec![medium]);
        assert_eq!(split[LB_BUCKET], vec![small]);
    }

    #[test]
    fn plan_size_only_counts_for_reservations() {
        let instance = UsageRecord {
            plan: "m3.medium.x86".into(),
            name: "bastion".into(),
            usage_type: "Instance".into(),
            ..Default::default()
        };
        let usages = UsageMap::from([(GATEWAY_PROJECT.to_string(), vec![instance])]);
        assert!(split_gateways(usages).is_empty());
    }

    #[test]
    fn other_projects_and_unmatched_lines_are_dropped() {
        let usages = UsageMap::from([
            (GATEWAY_PROJECT.to_string(), vec![named("monitoring-1")]),
            ("storage".to_string(), vec![named("ipfs-node-9")]),
        ]);
        assert!(split_gateways(usages).is_empty());
    }
}
