use tracing::warn;

use crate::endpoint::{RECORD_TYPE_CNAME, RECORD_TYPE_MX};

// Local host references are relative with no trailing dot, external ones
// are absolute and always dotted.
pub const APEX: &str = "@";

pub fn to_provider_cname(zone_name: &str, target: &str) -> String {
    let suffix = format!(".{zone_name}");

    if let Some(local) = target.strip_suffix(&suffix) {
        local.to_owned()
    } else if let Some(local) = target
        .strip_suffix('.')
        .and_then(|t| t.strip_suffix(&suffix))
    {
        local.to_owned()
    } else if target.ends_with('.') {
        target.to_owned()
    } else {
        format!("{target}.")
    }
}

pub fn from_provider(zone_name: &str, host: &str) -> String {
    if host == APEX {
        zone_name.to_owned()
    } else if let Some(external) = host.strip_suffix('.') {
        external.to_owned()
    } else {
        format!("{host}.{zone_name}")
    }
}

/// Encodes an MX target of the form `<priority> <hostname>`.
///
/// Malformed values are passed through untouched.
pub fn to_provider_mx(zone_name: &str, target: &str) -> String {
    let Some((priority, host)) = target.split_once(' ') else {
        warn!(target, "MX target has no priority, passing it through");
        return target.to_owned();
    };

    if priority.parse::<i64>().is_err() {
        warn!(target, priority, "MX priority is not a number, passing it through");
        return target.to_owned();
    }

    if host.trim_end_matches('.') == zone_name {
        format!("{priority} {APEX}")
    } else {
        format!("{priority} {}", to_provider_cname(zone_name, host))
    }
}

pub fn from_provider_mx(zone_name: &str, value: &str) -> String {
    match value.split_once(' ') {
        Some((priority, host)) => format!("{priority} {}", from_provider(zone_name, host)),
        None => {
            warn!(value, "MX value has no priority, leaving it untouched");
            value.to_owned()
        }
    }
}

/// Encodes an endpoint target according to its record type. Only host
/// references are rewritten.
pub fn to_provider_target(zone_name: &str, record_type: &str, target: &str) -> String {
    match record_type {
        RECORD_TYPE_CNAME => to_provider_cname(zone_name, target),
        RECORD_TYPE_MX => to_provider_mx(zone_name, target),
        _ => target.to_owned(),
    }
}

pub fn from_provider_target(zone_name: &str, record_type: &str, value: &str) -> String {
    match record_type {
        RECORD_TYPE_CNAME => from_provider(zone_name, value),
        RECORD_TYPE_MX => from_provider_mx(zone_name, value),
        _ => value.to_owned(),
    }
}

/// Strips the zone suffix from an FQDN. The zone itself maps to `@`.
pub fn make_relative_name(zone_name: &str, fqdn: &str) -> String {
    let fqdn = fqdn.strip_suffix('.').unwrap_or(fqdn);
    let relative = fqdn
        .strip_suffix(zone_name)
        .and_then(|n| n.strip_suffix('.'))
        .unwrap_or(fqdn);

    if relative == zone_name {
        APEX.to_owned()
    } else {
        relative.to_owned()
    }
}

pub fn make_fqdn(zone_name: &str, name: &str) -> String {
    if name == APEX {
        zone_name.to_owned()
    } else {
        format!("{name}.{zone_name}")
    }
}
