use serde::{Deserialize, Serialize};

use crate::error::CopcError;
use crate::las::header::{f64_at, u64_at};

pub const COPC_INFO_LENGTH: usize = 160;

/// The `copc`/1 info VLR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopcInfo {
    pub center: [f64; 3],
    pub halfsize: f64,
    pub spacing: f64,
    pub root_hierarchy_offset: u64,
    pub root_hierarchy_length: u64,
    pub gps_time_range: [f64; 2],
}

impl CopcInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self, CopcError> {
        if bytes.len() != COPC_INFO_LENGTH {
            return Err(CopcError::InvalidInfoLength {
                length: bytes.len(),
            });
        }

        Ok(Self {
            center: [f64_at(bytes, 0), f64_at(bytes, 8), f64_at(bytes, 16)],
            halfsize: f64_at(bytes, 24),
            spacing: f64_at(bytes, 32),
            root_hierarchy_offset: u64_at(bytes, 40),
            root_hierarchy_length: u64_at(bytes, 48),
            gps_time_range: [f64_at(bytes, 56), f64_at(bytes, 64)],
        })
    }

    /// Bounds of the root octree cube
    pub fn cube(&self) -> Bounds {
        let [x, y, z] = self.center;
        let h = self.halfsize;
        Bounds {
            min: [x - h, y - h, z - h],
            max: [x + h, y + h, z + h],
        }
    }
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    /// Inclusive containment with a per-axis tolerance
    pub fn contains(&self, point: [f64; 3], tolerance: [f64; 3]) -> bool {
        (0..3).all(|axis| {
            point[axis] >= self.min[axis] - tolerance[axis]
                && point[axis] <= self.max[axis] + tolerance[axis]
        })
    }
}
