//! Octree hierarchy pages and keys

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::copc::info::{Bounds, CopcInfo};
use crate::error::{CopcError, Result};
use crate::getter::Getter;
use crate::las::header::{i32_at, u64_at};

pub const HIERARCHY_ENTRY_LENGTH: usize = 32;

/// Octree node key: depth plus integer position at that depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoxelKey {
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelKey {
    pub const ROOT: VoxelKey = VoxelKey {
        level: 0,
        x: 0,
        y: 0,
        z: 0,
    };

    pub fn new(level: i32, x: i32, y: i32, z: i32) -> Self {
        Self { level, x, y, z }
    }

    pub fn parent(&self) -> Option<VoxelKey> {
        (self.level > 0).then(|| VoxelKey {
            level: self.level - 1,
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z >> 1,
        })
    }

    /// Bounds of this node inside the root cube
    pub fn bounds(&self, cube: &Bounds) -> Bounds {
        let cells = 2f64.powi(self.level);
        let position = [self.x, self.y, self.z];
        let mut bounds = Bounds {
            min: [0.0; 3],
            max: [0.0; 3],
        };
        for axis in 0..3 {
            let side = (cube.max[axis] - cube.min[axis]) / cells;
            bounds.min[axis] = cube.min[axis] + position[axis] as f64 * side;
            bounds.max[axis] = bounds.min[axis] + side;
        }
        bounds
    }
}

impl fmt::Display for VoxelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.level, self.x, self.y, self.z)
    }
}

impl Serialize for VoxelKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A node with point data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub point_count: u64,
    pub point_data_offset: u64,
    pub point_data_length: u64,
}

/// Location of a hierarchy page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef {
    pub offset: u64,
    pub length: u64,
}

/// One decoded hierarchy page: its nodes and the child pages it points at
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyPage {
    pub nodes: BTreeMap<VoxelKey, Node>,
    pub pages: BTreeMap<VoxelKey, PageRef>,
}

impl HierarchyPage {
    pub async fn read(getter: &dyn Getter, page: PageRef) -> Result<Self> {
        let end = page
            .offset
            .checked_add(page.length)
            .ok_or_else(|| CopcError::InvalidHierarchyPage {
                offset: page.offset,
                details: format!("length {} overflows", page.length),
            })?;
        let bytes = getter.get(page.offset, end).await?;
        Ok(Self::parse(&bytes, page.offset)?)
    }

    pub fn parse(bytes: &[u8], offset: u64) -> std::result::Result<Self, CopcError> {
        if bytes.len() % HIERARCHY_ENTRY_LENGTH != 0 {
            return Err(CopcError::InvalidHierarchyPage {
                offset,
                details: format!(
                    "length {} is not a multiple of {}",
                    bytes.len(),
                    HIERARCHY_ENTRY_LENGTH
                ),
            });
        }

        let mut page = HierarchyPage::default();
        for entry in bytes.chunks_exact(HIERARCHY_ENTRY_LENGTH) {
            let key = VoxelKey::new(
                i32_at(entry, 0),
                i32_at(entry, 4),
                i32_at(entry, 8),
                i32_at(entry, 12),
            );
            let data_offset = u64_at(entry, 16);
            let byte_size = i32_at(entry, 24);
            let point_count = i32_at(entry, 28);

            if key.level < 0 || byte_size < 0 {
                return Err(CopcError::InvalidHierarchyEntry {
                    key: key.to_string(),
                    details: format!("negative level or byte size ({})", byte_size),
                });
            }

            match point_count {
                -1 => {
                    page.pages.insert(
                        key,
                        PageRef {
                            offset: data_offset,
                            length: byte_size as u64,
                        },
                    );
                }
                count if count >= 0 => {
                    page.nodes.insert(
                        key,
                        Node {
                            point_count: count as u64,
                            point_data_offset: data_offset,
                            point_data_length: byte_size as u64,
                        },
                    );
                }
                count => {
                    return Err(CopcError::InvalidHierarchyEntry {
                        key: key.to_string(),
                        details: format!("invalid point count {}", count),
                    });
                }
            }
        }

        Ok(page)
    }
}

/// Every node of the octree, merged from all hierarchy pages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub nodes: BTreeMap<VoxelKey, Node>,
}

impl Hierarchy {
    /// Load the root page and every page reachable from it
    pub async fn load(getter: &dyn Getter, info: &CopcInfo) -> Result<Self> {
        let root = PageRef {
            offset: info.root_hierarchy_offset,
            length: info.root_hierarchy_length,
        };

        let mut nodes = BTreeMap::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root]);

        while let Some(page_ref) = queue.pop_front() {
            if !visited.insert(page_ref.offset) {
                return Err(CopcError::InvalidHierarchyPage {
                    offset: page_ref.offset,
                    details: "page referenced more than once".to_string(),
                }
                .into());
            }

            let page = HierarchyPage::read(getter, page_ref).await?;
            for (key, node) in page.nodes {
                if nodes.insert(key, node).is_some() {
                    return Err(CopcError::InvalidHierarchyEntry {
                        key: key.to_string(),
                        details: "node listed in more than one page".to_string(),
                    }
                    .into());
                }
            }
            queue.extend(page.pages.into_values());
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_points(&self) -> u64 {
        self.nodes.values().map(|node| node.point_count).sum()
    }
}
