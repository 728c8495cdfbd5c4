use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::changes::{ChangeSet, ZoneRef};
use crate::dns::{Record, Zone};
use crate::endpoint::{Endpoint, PlanChanges};
use crate::hostname::{make_relative_name, to_provider_target};
use crate::matcher::{index_by_target, matching_records};

/// Zone id to zone name, as of the last zone listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneIndex {
    names: HashMap<String, String>,
}

impl ZoneIndex {
    pub fn new(zones: &[Zone]) -> Self {
        Self {
            names: zones
                .iter()
                .map(|z| (z.id.clone(), z.name.clone()))
                .collect(),
        }
    }

    pub fn name(&self, zone_id: &str) -> Option<&str> {
        self.names.get(zone_id).map(String::as_str)
    }

    pub fn zone(&self, zone_id: &str) -> Option<ZoneRef> {
        self.name(zone_id).map(|name| ZoneRef {
            id: zone_id.to_owned(),
            name: name.to_owned(),
        })
    }

    pub fn find_zone(&self, dns_name: &str) -> Option<ZoneRef> {
        let dns_name = dns_name.trim_end_matches('.');
        self.names
            .iter()
            .filter(|(_, name)| {
                dns_name == name.as_str()
                    || dns_name
                        .strip_suffix(name.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .max_by_key(|(_, name)| name.len())
            .map(|(id, name)| ZoneRef {
                id: id.clone(),
                name: name.clone(),
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }
}

pub type RecordsByZone = HashMap<String, Vec<Record>>;

/// Endpoints of one category grouped by zone id. Every known zone has an
/// entry, possibly empty.
pub type EndpointsByZone<'a> = BTreeMap<String, Vec<&'a Endpoint>>;

pub fn endpoints_by_zone<'a>(
    zones: &ZoneIndex,
    endpoints: &'a [Endpoint],
) -> EndpointsByZone<'a> {
    let mut grouped: EndpointsByZone = zones
        .ids()
        .map(|id| (id.to_owned(), Vec::new()))
        .collect();

    for ep in endpoints {
        match zones.find_zone(&ep.dns_name) {
            Some(zone) => grouped.entry(zone.id).or_default().push(ep),
            None => debug!(name = %ep.dns_name, "skipping endpoint, no matching zone"),
        }
    }

    grouped
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    zones: &'a ZoneIndex,
    records: &'a RecordsByZone,
}

impl<'a> Reconciler<'a> {
    pub fn new(zones: &'a ZoneIndex, records: &'a RecordsByZone) -> Self {
        Self { zones, records }
    }

    pub fn reconcile(&self, plan: &PlanChanges, changes: &mut ChangeSet) {
        self.process_creates(&endpoints_by_zone(self.zones, &plan.create), changes);
        self.process_updates(&endpoints_by_zone(self.zones, &plan.update_new), changes);
        self.process_deletes(&endpoints_by_zone(self.zones, &plan.delete), changes);
    }

    /// Enqueues one create per target. Records already present at the
    /// name and type do not stop the create; the provider decides.
    pub fn process_creates(&self, creates: &EndpointsByZone, changes: &mut ChangeSet) {
        for (zone, endpoints, records) in self.zones_with_work(creates, "create") {
            for ep in endpoints {
                let existing = matching_records(records, &zone.name, ep);
                if !existing.is_empty() {
                    warn!(
                        zone = %zone.name,
                        name = %ep.dns_name,
                        record_type = %ep.record_type,
                        count = existing.len(),
                        "records already exist for a planned create"
                    );
                }

                let name = make_relative_name(&zone.name, &ep.dns_name);
                for target in &ep.targets {
                    let value = to_provider_target(&zone.name, &ep.record_type, target);
                    changes.add_create(&zone, name.clone(), &ep.record_type, value, ep.record_ttl);
                }
            }
        }
    }

    /// Diffs desired targets against existing records by target value:
    /// matches are updated in place, new targets created, and leftover
    /// records deleted.
    pub fn process_updates(&self, updates: &EndpointsByZone, changes: &mut ChangeSet) {
        for (zone, endpoints, records) in self.zones_with_work(updates, "update") {
            for ep in endpoints {
                let existing = matching_records(records, &zone.name, ep);
                if existing.is_empty() {
                    warn!(
                        zone = %zone.name,
                        name = %ep.dns_name,
                        record_type = %ep.record_type,
                        "no existing records for a planned update"
                    );
                }

                let mut by_target = index_by_target(&existing);
                let name = make_relative_name(&zone.name, &ep.dns_name);

                for target in &ep.targets {
                    let value = to_provider_target(&zone.name, &ep.record_type, target);
                    match by_target.remove(value.as_str()) {
                        Some(record) => {
                            changes.add_update(&zone, record, name.clone(), value, ep.record_ttl)
                        }
                        None => changes.add_create(
                            &zone,
                            name.clone(),
                            &ep.record_type,
                            value,
                            ep.record_ttl,
                        ),
                    }
                }

                // Walk the records rather than the index to keep deletes in
                // provider order.
                for record in existing {
                    let leftover = by_target
                        .get(record.value.as_str())
                        .is_some_and(|r| r.id == record.id);
                    if leftover {
                        changes.add_delete(&zone, record);
                    }
                }
            }
        }
    }

    /// Deletes only records whose value still matches one of the
    /// endpoint's targets.
    pub fn process_deletes(&self, deletes: &EndpointsByZone, changes: &mut ChangeSet) {
        for (zone, endpoints, records) in self.zones_with_work(deletes, "delete") {
            for ep in endpoints {
                let existing = matching_records(records, &zone.name, ep);
                if existing.is_empty() {
                    warn!(
                        zone = %zone.name,
                        name = %ep.dns_name,
                        record_type = %ep.record_type,
                        "no records found for a planned delete"
                    );
                }

                let values: Vec<String> = ep
                    .targets
                    .iter()
                    .map(|t| to_provider_target(&zone.name, &ep.record_type, t))
                    .collect();

                for record in existing {
                    if values.iter().any(|v| *v == record.value) {
                        changes.add_delete(&zone, record);
                    } else {
                        debug!(
                            zone = %zone.name,
                            id = %record.id,
                            value = %record.value,
                            "keeping record, target no longer matches"
                        );
                    }
                }
            }
        }
    }

    fn zones_with_work<'e>(
        &self,
        grouped: &'e EndpointsByZone<'e>,
        action: &'static str,
    ) -> impl Iterator<Item = (ZoneRef, &'e [&'e Endpoint], &'a [Record])> + 'e
    where
        'a: 'e,
    {
        let zones = self.zones;
        let records = self.records;

        grouped.iter().filter_map(move |(zone_id, endpoints)| {
            let Some(zone) = zones.zone(zone_id) else {
                debug!(zone_id = %zone_id, action, "skipping unknown zone");
                return None;
            };
            if endpoints.is_empty() {
                debug!(zone = %zone.name, action, "skipping zone, nothing to do");
                return None;
            }
            let records = records.get(zone_id).map(Vec::as_slice).unwrap_or_default();
            Some((zone, endpoints.as_slice(), records))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::test_util::{record, zone};

    fn alpha_index() -> ZoneIndex {
        ZoneIndex::new(&[
            zone("z1", "alpha.com"),
            zone("z2", "sub.alpha.com"),
            zone("z3", "beta.com"),
        ])
    }

    fn ep(name: &str, record_type: &str, targets: &[&str]) -> Endpoint {
        Endpoint::new(name, record_type, targets.iter().map(|t| t.to_string()).collect())
    }

    fn snapshot(records: Vec<Record>) -> RecordsByZone {
        let mut by_zone = RecordsByZone::new();
        for r in records {
            by_zone.entry(r.zone_id.clone()).or_default().push(r);
        }
        by_zone
    }

    fn run(plan: &PlanChanges, records: &RecordsByZone) -> ChangeSet {
        let zones = alpha_index();
        let mut changes = ChangeSet::new(false, 7200);
        Reconciler::new(&zones, records).reconcile(plan, &mut changes);
        changes
    }

    #[test]
    fn find_zone_prefers_longest_suffix() {
        let zones = alpha_index();
        assert_eq!(zones.find_zone("www.sub.alpha.com").unwrap().id, "z2");
        assert_eq!(zones.find_zone("sub.alpha.com").unwrap().id, "z2");
        assert_eq!(zones.find_zone("www.alpha.com").unwrap().id, "z1");
        assert_eq!(zones.find_zone("alpha.com.").unwrap().id, "z1");
        assert!(zones.find_zone("notalpha.com").is_none());
        assert!(zones.find_zone("gamma.org").is_none());
    }

    #[test]
    fn grouping_covers_every_zone() {
        let zones = alpha_index();
        let endpoints = vec![
            ep("www.alpha.com", "A", &["1.1.1.1"]),
            ep("x.gamma.org", "A", &["2.2.2.2"]),
        ];
        let grouped = endpoints_by_zone(&zones, &endpoints);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped["z1"].len(), 1);
        assert!(grouped["z3"].is_empty());
    }

    #[test]
    fn create_encodes_each_target() {
        let plan = PlanChanges {
            create: vec![
                ep("www.alpha.com", "A", &["1.1.1.1", "2.2.2.2"]).with_ttl(Some(60)),
                ep("alias.alpha.com", "CNAME", &["service.external.com"]),
                ep("alpha.com", "MX", &["10 mail.alpha.com"]),
            ],
            ..Default::default()
        };

        let changes = run(&plan, &RecordsByZone::new());
        let creates = changes.creates();
        assert_eq!(creates.len(), 4);
        assert_eq!(creates[0].name, "www");
        assert_eq!(creates[0].value, "1.1.1.1");
        assert_eq!(creates[0].ttl, Some(60));
        assert_eq!(creates[1].value, "2.2.2.2");
        assert_eq!(creates[2].value, "service.external.com.");
        assert_eq!(creates[2].ttl, None);
        assert_eq!(creates[3].name, "@");
        assert_eq!(creates[3].value, "10 mail");
        assert!(creates.iter().all(|c| c.zone.id == "z1"));
    }

    #[test]
    fn create_over_existing_record_is_still_enqueued() {
        let records = snapshot(vec![record("r1", "z1", "www", "A", "1.1.1.1")]);
        let plan = PlanChanges {
            create: vec![ep("www.alpha.com", "A", &["1.1.1.1"])],
            ..Default::default()
        };

        let changes = run(&plan, &records);
        assert_eq!(changes.creates().len(), 1);
        assert!(changes.updates().is_empty());
        assert!(changes.deletes().is_empty());
    }

    #[test]
    fn create_pass_is_repeatable() {
        let plan = PlanChanges {
            create: vec![
                ep("www.alpha.com", "A", &["1.1.1.1"]),
                ep("api.beta.com", "TXT", &["hello"]),
            ],
            ..Default::default()
        };
        let records = RecordsByZone::new();
        assert_eq!(run(&plan, &records), run(&plan, &records));
    }

    #[test]
    fn update_diffs_by_target_value() {
        let records = snapshot(vec![
            record("ra", "z1", "www", "A", "a"),
            record("rc", "z1", "www", "A", "c"),
            record("rx", "z1", "other", "A", "c"),
        ]);
        let plan = PlanChanges {
            update_new: vec![ep("www.alpha.com", "A", &["a", "b"])],
            ..Default::default()
        };

        let changes = run(&plan, &records);
        assert_eq!(changes.len(), 3);

        assert_eq!(changes.updates()[0].id, "ra");
        assert_eq!(changes.updates()[0].record.value, "a");
        assert_eq!(changes.creates()[0].value, "b");
        assert_eq!(changes.deletes()[0].id, "rc");
    }

    #[test]
    fn update_matches_encoded_cname_targets() {
        let records = snapshot(vec![record("r1", "z1", "alias", "CNAME", "www")]);
        let plan = PlanChanges {
            update_new: vec![
                ep("alias.alpha.com", "CNAME", &["www.alpha.com"]).with_ttl(Some(300)),
            ],
            ..Default::default()
        };

        let changes = run(&plan, &records);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.updates()[0].id, "r1");
        assert_eq!(changes.updates()[0].record.ttl, Some(300));
    }

    #[test]
    fn update_without_existing_records_creates() {
        let plan = PlanChanges {
            update_new: vec![ep("new.beta.com", "A", &["9.9.9.9"])],
            ..Default::default()
        };

        let changes = run(&plan, &RecordsByZone::new());
        assert_eq!(changes.creates().len(), 1);
        assert_eq!(changes.creates()[0].zone.id, "z3");
        assert!(changes.updates().is_empty());
    }

    #[test]
    fn update_leaves_shadowed_duplicates_alone() {
        let records = snapshot(vec![
            record("r1", "z1", "www", "A", "1.1.1.1"),
            record("r2", "z1", "www", "A", "1.1.1.1"),
            record("r3", "z1", "www", "A", "3.3.3.3"),
        ]);
        let plan = PlanChanges {
            update_new: vec![ep("www.alpha.com", "A", &["2.2.2.2"])],
            ..Default::default()
        };

        let changes = run(&plan, &records);
        let deleted: Vec<_> = changes.deletes().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(deleted, ["r2", "r3"]);
        assert_eq!(changes.creates().len(), 1);
    }

    #[test]
    fn delete_only_matching_targets() {
        let records = snapshot(vec![
            record("r1", "z1", "www", "A", "1.1.1.1"),
            record("r2", "z1", "www", "A", "2.2.2.2"),
            record("r3", "z1", "@", "MX", "10 mail"),
        ]);
        let plan = PlanChanges {
            delete: vec![
                ep("www.alpha.com", "A", &["1.1.1.1"]),
                ep("alpha.com", "MX", &["10 mail.alpha.com"]),
                ep("gone.alpha.com", "A", &["5.5.5.5"]),
            ],
            ..Default::default()
        };

        let changes = run(&plan, &records);
        let deleted: Vec<_> = changes.deletes().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(deleted, ["r1", "r3"]);
        assert!(changes.creates().is_empty());
    }

    #[test]
    fn endpoints_outside_known_zones_are_skipped() {
        let plan = PlanChanges {
            create: vec![ep("www.gamma.org", "A", &["1.1.1.1"])],
            delete: vec![ep("www.gamma.org", "A", &["1.1.1.1"])],
            ..Default::default()
        };
        assert!(run(&plan, &RecordsByZone::new()).is_empty());
    }

    #[test]
    fn subzone_records_are_relative_to_subzone() {
        let plan = PlanChanges {
            create: vec![ep("www.sub.alpha.com", "A", &["1.1.1.1"])],
            ..Default::default()
        };
        let changes = run(&plan, &RecordsByZone::new());
        assert_eq!(changes.creates()[0].zone.id, "z2");
        assert_eq!(changes.creates()[0].name, "www");
    }

    #[test]
    fn dotted_names_are_made_relative() {
        let records = snapshot(vec![record("r1", "z1", "www", "A", "1.1.1.1")]);
        let plan = PlanChanges {
            create: vec![ep("api.alpha.com.", "A", &["2.2.2.2"])],
            delete: vec![ep("www.alpha.com.", "A", &["1.1.1.1"])],
            ..Default::default()
        };

        let changes = run(&plan, &records);
        assert_eq!(changes.creates()[0].name, "api");
        assert_eq!(changes.creates()[0].zone.id, "z1");
        assert_eq!(changes.deletes()[0].id, "r1");
    }

    #[test]
    fn malformed_mx_target_is_created_verbatim() {
        let plan = PlanChanges {
            create: vec![
                ep("alpha.com", "MX", &["ten mail.alpha.com", "20 backup.alpha.com"]),
                ep("www.alpha.com", "A", &["1.1.1.1"]),
            ],
            ..Default::default()
        };

        let changes = run(&plan, &RecordsByZone::new());
        let values: Vec<_> = changes.creates().iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, ["ten mail.alpha.com", "20 backup", "1.1.1.1"]);
        assert_eq!(changes.creates()[0].name, "@");
    }
}
