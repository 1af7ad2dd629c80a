//! Device type naming and type-mapping seeds

use relay_core::{Device, Generation};

/// Working device type for a capability inferred from this device
///
/// Gen1 devices are named by `raw_type`, RPC devices by `raw_app`. Without
/// those the id prefix is used, and as a last resort the MAC (or id).
pub fn device_type_for(device: &Device) -> String {
    let vendor = match device.generation {
        Generation::Gen1 => device.raw_type(),
        g if g.is_rpc() => device.raw_app(),
        _ => None,
    };
    if let Some(name) = vendor.or_else(|| device.id_prefix()) {
        return name.to_string();
    }
    match device.mac() {
        Some(mac) => format!("unknown_{}", mac),
        None => format!("unknown_{}", device.id.trim()),
    }
}

/// Raw identifiers a new capability should be indexed under
///
/// The id prefix is only a useful mapping when it names a family
/// ("shellyplug") rather than a single unit ("shelly1").
pub fn seed_mappings(device: &Device) -> Vec<String> {
    let mut seeds: Vec<String> = [device.raw_type(), device.raw_app(), device.raw_model()]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    if let Some(prefix) = device.id_prefix() {
        if !prefix.chars().any(|c| c.is_ascii_digit()) {
            seeds.push(prefix.to_string());
        }
    }
    seeds
}
