//! `lsblk --json` parsing.
//!
//! The loop depends only on a machine-parsable listing of identifiers;
//! everything else lsblk reports is ignored.

use super::{DiskUnit, UnitKind};
use crate::error::StewardError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LsblkReport {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    children: Vec<LsblkDevice>,
}

/// Flatten an lsblk report into verify/repair order: each disk first,
/// then that disk's partitions. Loop devices, optical drives, and
/// other non-disk toplevel entries are skipped.
pub fn parse_units(json: &str) -> Result<Vec<DiskUnit>, StewardError> {
    let report: LsblkReport = serde_json::from_str(json).map_err(|e| StewardError::Parse {
        what: "lsblk output",
        reason: e.to_string(),
    })?;

    let mut units = Vec::new();
    for dev in &report.blockdevices {
        if dev.kind != "disk" {
            continue;
        }
        let disk_id = device_path(&dev.name);
        units.push(DiskUnit {
            identifier: disk_id.clone(),
            kind: UnitKind::Disk,
            parent: None,
        });
        for child in &dev.children {
            if child.kind != "part" {
                continue;
            }
            units.push(DiskUnit {
                identifier: device_path(&child.name),
                kind: UnitKind::Partition,
                parent: Some(disk_id.clone()),
            });
        }
    }
    Ok(units)
}

fn device_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/dev/{}", name)
    }
}
