//! OSD tree model and CRUSH weight capture.
//!
//! The rebalance experiment needs the original CRUSH weight of every OSD it
//! is going to evacuate, captured once before any mutation. A member missing
//! from the tree (or carrying no weight) aborts the run up front; discovering
//! it halfway through would leave the cluster in a half-mutated topology.

use std::collections::HashMap;

use cephbench_common::{BenchError, BenchResult};
use serde::Deserialize;

/// One node of `ceph osd tree -f json`.
#[derive(Debug, Clone, Deserialize)]
pub struct OsdNode {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub crush_weight: Option<f64>,
    #[serde(default)]
    pub device_class: Option<String>,
}

/// Parsed OSD tree.
#[derive(Debug, Clone, Deserialize)]
pub struct OsdTree {
    pub nodes: Vec<OsdNode>,
}

impl OsdTree {
    /// Iterate over OSD leaf nodes only.
    pub fn osds(&self) -> impl Iterator<Item = &OsdNode> {
        self.nodes.iter().filter(|n| n.node_type == "osd")
    }

    /// OSD ids belonging to a device class.
    pub fn osds_of_class(&self, class: &str) -> Vec<u32> {
        self.osds()
            .filter(|n| n.device_class.as_deref() == Some(class))
            .filter(|n| n.id >= 0)
            .map(|n| n.id as u32)
            .collect()
    }

    /// CRUSH weights for exactly the given OSD ids, all-or-abort.
    pub fn crush_weights_for(&self, osd_ids: &[u32]) -> BenchResult<HashMap<u32, f64>> {
        let mut weights = HashMap::with_capacity(osd_ids.len());
        for node in self.osds() {
            if node.id >= 0 && osd_ids.contains(&(node.id as u32)) {
                let weight = node.crush_weight.ok_or_else(|| {
                    BenchError::configuration(format!(
                        "osd.{} has no crush weight in the osd tree",
                        node.id
                    ))
                })?;
                weights.insert(node.id as u32, weight);
            }
        }

        for id in osd_ids {
            if !weights.contains_key(id) {
                return Err(BenchError::configuration(format!(
                    "osd.{id} not present in the osd tree"
                )));
            }
        }
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> OsdTree {
        serde_json::from_str(
            r#"{"nodes": [
                {"id": -1, "name": "default", "type": "root", "children": [-2]},
                {"id": -2, "name": "host-a", "type": "host", "type_id": 2, "children": [0, 1]},
                {"id": 0, "name": "osd.0", "type": "osd", "crush_weight": 1.81929,
                 "device_class": "sata", "status": "up"},
                {"id": 1, "name": "osd.1", "type": "osd", "crush_weight": 0.90959,
                 "device_class": "ssd", "status": "up"}
            ], "stray": []}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_osd_iteration_skips_buckets() {
        let tree = sample_tree();
        let names: Vec<&str> = tree.osds().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["osd.0", "osd.1"]);
    }

    #[test]
    fn test_osds_of_class() {
        let tree = sample_tree();
        assert_eq!(tree.osds_of_class("sata"), vec![0]);
        assert_eq!(tree.osds_of_class("ssd"), vec![1]);
        assert!(tree.osds_of_class("nvme").is_empty());
    }

    #[test]
    fn test_weight_capture() {
        let tree = sample_tree();
        let weights = tree.crush_weights_for(&[0, 1]).unwrap();
        assert_eq!(weights[&0], 1.81929);
        assert_eq!(weights[&1], 0.90959);
    }

    #[test]
    fn test_weight_capture_missing_member_aborts() {
        let tree = sample_tree();
        let err = tree.crush_weights_for(&[0, 7]).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("osd.7"));
    }

    #[test]
    fn test_weight_capture_missing_weight_aborts() {
        let tree: OsdTree = serde_json::from_str(
            r#"{"nodes": [{"id": 3, "name": "osd.3", "type": "osd"}]}"#,
        )
        .unwrap();
        let err = tree.crush_weights_for(&[3]).unwrap_err();
        assert!(err.is_configuration());
    }
}
