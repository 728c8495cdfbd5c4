use std::collections::HashMap;

use tracing::warn;

use crate::dns::Record;
use crate::endpoint::Endpoint;
use crate::hostname::make_relative_name;

pub fn matching_records<'a>(
    records: &'a [Record],
    zone_name: &str,
    endpoint: &Endpoint,
) -> Vec<&'a Record> {
    if !endpoint.provider_specific.is_empty() {
        warn!(
            name = %endpoint.dns_name,
            record_type = %endpoint.record_type,
            properties = ?endpoint.provider_specific,
            "ignoring provider specific properties"
        );
    }

    let name = make_relative_name(zone_name, &endpoint.dns_name);
    records
        .iter()
        .filter(|r| r.name == name && r.record_type == endpoint.record_type)
        .collect()
}

/// Indexes records by their provider-encoded value. Later duplicates win.
pub fn index_by_target<'a>(records: &[&'a Record]) -> HashMap<&'a str, &'a Record> {
    records.iter().map(|r| (r.value.as_str(), *r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::test_util::record;
    use crate::endpoint::ProviderSpecific;

    fn zone_records() -> Vec<Record> {
        vec![
            record("1", "z1", "www", "A", "1.1.1.1"),
            record("2", "z1", "www", "A", "2.2.2.2"),
            record("3", "z1", "www", "AAAA", "::1"),
            record("4", "z1", "@", "MX", "10 mail"),
            record("5", "z1", "api", "A", "1.1.1.1"),
        ]
    }

    #[test]
    fn matches_by_relative_name_and_type() {
        let records = zone_records();
        let ep = Endpoint::new("www.alpha.com", "A", vec![]);
        let ids: Vec<_> = matching_records(&records, "alpha.com", &ep)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn apex_endpoint_matches_at_records() {
        let records = zone_records();
        let ep = Endpoint::new("alpha.com", "MX", vec![]);
        let found = matching_records(&records, "alpha.com", &ep);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "4");
    }

    #[test]
    fn provider_specific_does_not_change_matching() {
        let records = zone_records();
        let mut ep = Endpoint::new("api.alpha.com", "A", vec![]);
        ep.provider_specific.push(ProviderSpecific {
            name: "alias".to_owned(),
            value: "true".to_owned(),
        });
        assert_eq!(matching_records(&records, "alpha.com", &ep).len(), 1);
    }

    #[test]
    fn index_last_write_wins() {
        let a = record("1", "z1", "www", "A", "1.1.1.1");
        let b = record("2", "z1", "www", "A", "1.1.1.1");
        let c = record("3", "z1", "www", "A", "3.3.3.3");
        let index = index_by_target(&[&a, &b, &c]);
        assert_eq!(index.len(), 2);
        assert_eq!(index["1.1.1.1"].id, "2");
        assert_eq!(index["3.3.3.3"].id, "3");
    }
}
