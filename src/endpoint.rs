use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

pub const RECORD_TYPE_A: &str = "A";
pub const RECORD_TYPE_AAAA: &str = "AAAA";
pub const RECORD_TYPE_CNAME: &str = "CNAME";
pub const RECORD_TYPE_MX: &str = "MX";
pub const RECORD_TYPE_NS: &str = "NS";
pub const RECORD_TYPE_SRV: &str = "SRV";
pub const RECORD_TYPE_TXT: &str = "TXT";

pub const SUPPORTED_RECORD_TYPES: &[&str] = &[
    RECORD_TYPE_A,
    RECORD_TYPE_AAAA,
    RECORD_TYPE_CNAME,
    RECORD_TYPE_MX,
    RECORD_TYPE_NS,
    RECORD_TYPE_SRV,
    RECORD_TYPE_TXT,
];

pub fn is_supported_record_type(record_type: &str) -> bool {
    SUPPORTED_RECORD_TYPES.contains(&record_type)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecific {
    pub name: String,
    pub value: String,
}

/// Desired state for one name and type. `record_ttl` of `None` means the
/// TTL is not configured and the provider default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,
    pub record_type: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(
        rename = "recordTTL",
        default,
        deserialize_with = "configured_ttl",
        skip_serializing_if = "Option::is_none"
    )]
    pub record_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_specific: Vec<ProviderSpecific>,
}

impl Endpoint {
    pub fn new<N, T>(dns_name: N, record_type: T, targets: Vec<String>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            dns_name: dns_name.into(),
            record_type: record_type.into(),
            targets,
            record_ttl: None,
            provider_specific: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<i64>) -> Self {
        self.record_ttl = ttl;
        self
    }
}

// The engine sends 0 (or nothing) for an unconfigured TTL.
fn configured_ttl<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let ttl = Option::<i64>::deserialize(deserializer)?;
    Ok(ttl.filter(|t| *t > 0))
}

/// A plan computed by the DNS engine. Only the new side of updates is
/// acted upon; `update_old` is accepted for wire compatibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChanges {
    #[serde(default)]
    pub create: Vec<Endpoint>,
    #[serde(default)]
    pub update_old: Vec<Endpoint>,
    #[serde(default)]
    pub update_new: Vec<Endpoint>,
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl PlanChanges {
    pub fn has_changes(&self) -> bool {
        !(self.create.is_empty() && self.update_new.is_empty() && self.delete.is_empty())
    }
}

/// Folds endpoints sharing a name and type into one multi-target endpoint.
///
/// Groups keep the position of their first member, and that member's TTL.
/// When nothing merges the input is returned as is.
pub fn merge_endpoints(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for ep in &endpoints {
        let next = index.len();
        index
            .entry((ep.dns_name.clone(), ep.record_type.clone()))
            .or_insert(next);
    }

    if index.len() == endpoints.len() {
        return endpoints;
    }

    let mut merged: Vec<Endpoint> = Vec::with_capacity(index.len());
    for ep in endpoints {
        let slot = index[&(ep.dns_name.clone(), ep.record_type.clone())];
        if slot < merged.len() {
            merged[slot].targets.extend(ep.targets);
        } else {
            merged.push(ep);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(name: &str, record_type: &str, target: &str) -> Endpoint {
        Endpoint::new(name, record_type, vec![target.to_owned()])
    }

    #[test]
    fn merge_groups_by_name_and_type() {
        let merged = merge_endpoints(vec![
            ep("www.alpha.com", "A", "1.1.1.1").with_ttl(Some(60)),
            ep("www.alpha.com", "AAAA", "::1"),
            ep("www.alpha.com", "A", "2.2.2.2").with_ttl(Some(120)),
            ep("mail.alpha.com", "A", "3.3.3.3"),
        ]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].targets, ["1.1.1.1", "2.2.2.2"]);
        assert_eq!(merged[0].record_ttl, Some(60));
        assert_eq!(merged[1].record_type, "AAAA");
        assert_eq!(merged[2].dns_name, "mail.alpha.com");
    }

    #[test]
    fn merge_without_duplicates_keeps_input() {
        let input = vec![
            ep("b.alpha.com", "A", "1.1.1.1"),
            ep("a.alpha.com", "A", "2.2.2.2"),
        ];
        assert_eq!(merge_endpoints(input.clone()), input);
    }

    #[test]
    fn plan_changes_ignore_update_old() {
        let plan = PlanChanges {
            update_old: vec![ep("www.alpha.com", "A", "1.1.1.1")],
            ..Default::default()
        };
        assert!(!plan.has_changes());
    }

    #[test]
    fn endpoint_wire_format() {
        let json = serde_json::json!({
            "dnsName": "www.alpha.com",
            "recordType": "A",
            "targets": ["1.1.1.1"],
            "recordTTL": 300,
        });
        let parsed: Endpoint = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.record_ttl, Some(300));
        assert!(parsed.provider_specific.is_empty());

        let unset: Endpoint = serde_json::from_value(serde_json::json!({
            "dnsName": "www.alpha.com",
            "recordType": "A",
            "recordTTL": 0,
        }))
        .unwrap();
        assert_eq!(unset.record_ttl, None);
        assert!(unset.targets.is_empty());
    }
}
