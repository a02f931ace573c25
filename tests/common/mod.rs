//! Synthetic COPC byte images for integration tests
//!
//! Files are LAS 1.4, point format 7, scale 0.01, with an octree cube centred
//! on (50, 50, 50) with half-size 50. Point data is one run per node, stored
//! as plain records or, with `compressed`, as one LAZ chunk per node behind a
//! `laszip encoded` VLR.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use copc_validator::{MemoryGetter, SharedGetter, VoxelKey};
use laz::record::{LayeredPointRecordCompressor, RecordCompressor};
use laz::{LazVlr, LazVlrBuilder};
use tempfile::NamedTempFile;

pub const HEADER_LENGTH: usize = 375;
pub const RECORD_LENGTH: usize = 36;
pub const SCALE: f64 = 0.01;
pub const CENTER: f64 = 50.0;
pub const HALFSIZE: f64 = 50.0;
pub const GPS_TIME_RANGE: [f64; 2] = [0.0, 1000.0];
pub const WKT: &[u8] = b"PROJCS[\"synthetic\",GEOGCS[\"WGS 84\"]]\0";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestPoint {
    pub xyz: [f64; 3],
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub gps_time: f64,
    pub rgb: [u16; 3],
}

impl TestPoint {
    fn record(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; RECORD_LENGTH];
        for axis in 0..3 {
            let raw = (self.xyz[axis] / SCALE).round() as i32;
            bytes[axis * 4..axis * 4 + 4].copy_from_slice(&raw.to_le_bytes());
        }
        bytes[12..14].copy_from_slice(&self.intensity.to_le_bytes());
        bytes[14] = self.return_number | (self.number_of_returns << 4);
        bytes[22..30].copy_from_slice(&self.gps_time.to_le_bytes());
        for (i, channel) in self.rgb.iter().enumerate() {
            bytes[30 + i * 2..32 + i * 2].copy_from_slice(&channel.to_le_bytes());
        }
        bytes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestNode {
    pub key: VoxelKey,
    pub points: Vec<TestPoint>,
    /// Listed in the child hierarchy page instead of the root page
    pub in_child_page: bool,
    /// Point count written to the hierarchy instead of the real one
    pub declared_points: Option<i32>,
}

impl TestNode {
    fn declared(&self) -> i32 {
        self.declared_points.unwrap_or(self.points.len() as i32)
    }
}

/// Bounds of `key` inside the test cube
pub fn node_bounds(key: VoxelKey) -> ([f64; 3], [f64; 3]) {
    let side = 2.0 * HALFSIZE / 2f64.powi(key.level);
    let base = CENTER - HALFSIZE;
    let min = [
        base + key.x as f64 * side,
        base + key.y as f64 * side,
        base + key.z as f64 * side,
    ];
    (min, [min[0] + side, min[1] + side, min[2] + side])
}

/// `count` well-formed points strictly inside the node, sorted by GPS time,
/// with 16-bit colour and intensity
pub fn points_for(key: VoxelKey, count: usize, first_gps_time: f64) -> Vec<TestPoint> {
    let (min, max) = node_bounds(key);
    (0..count)
        .map(|i| {
            let t = (i + 1) as f64 / (count + 1) as f64;
            TestPoint {
                xyz: [
                    min[0] + (max[0] - min[0]) * t,
                    min[1] + (max[1] - min[1]) * t,
                    min[2] + (max[2] - min[2]) * t,
                ],
                intensity: 1000 + i as u16,
                return_number: 1,
                number_of_returns: 1,
                gps_time: first_gps_time + i as f64,
                rgb: [300 + i as u16, 4000, 65535],
            }
        })
        .collect()
}

/// Builds a COPC byte image
#[derive(Debug, Clone)]
pub struct CopcBuilder {
    pub nodes: Vec<TestNode>,
    pub minor_version: u8,
    pub include_hierarchy: bool,
    pub include_wkt: bool,
    /// Added to the header point count, to make the hierarchy disagree
    pub point_count_skew: i64,
    /// Write LAZ chunks and the `laszip encoded` VLR
    pub compressed: bool,
}

impl Default for CopcBuilder {
    /// Root node plus three children; `1-0-0-0` and `2-0-0-0` live in a
    /// child hierarchy page
    fn default() -> Self {
        let node = |key: VoxelKey, count: usize, gps: f64, in_child_page: bool| TestNode {
            key,
            points: points_for(key, count, gps),
            in_child_page,
            declared_points: None,
        };
        Self {
            nodes: vec![
                node(VoxelKey::ROOT, 5, 0.0, false),
                node(VoxelKey::new(1, 0, 0, 0), 4, 100.0, true),
                node(VoxelKey::new(1, 1, 1, 1), 3, 200.0, false),
                node(VoxelKey::new(2, 0, 0, 0), 2, 300.0, true),
            ],
            minor_version: 4,
            include_hierarchy: true,
            include_wkt: true,
            point_count_skew: 0,
            compressed: false,
        }
    }
}

impl CopcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Many level-3 nodes with `points_per_node` points each, all in the root page
    pub fn wide(node_count: usize, points_per_node: usize) -> Self {
        let mut nodes = Vec::with_capacity(node_count);
        'outer: for x in 0..8 {
            for y in 0..8 {
                for z in 0..8 {
                    if nodes.len() == node_count {
                        break 'outer;
                    }
                    let key = VoxelKey::new(3, x, y, z);
                    nodes.push(TestNode {
                        key,
                        points: points_for(key, points_per_node, 0.0),
                        in_child_page: false,
                        declared_points: None,
                    });
                }
            }
        }
        Self {
            nodes,
            ..Self::default()
        }
    }

    /// The default fixture with LAZ-compressed nodes
    pub fn compressed() -> Self {
        Self {
            compressed: true,
            ..Self::default()
        }
    }

    pub fn node_mut(&mut self, key: VoxelKey) -> &mut TestNode {
        self.nodes
            .iter_mut()
            .find(|n| n.key == key)
            .expect("node not in fixture")
    }

    pub fn total_points(&self) -> u64 {
        self.nodes.iter().map(|n| n.points.len() as u64).sum()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut vlrs = Vec::new();
        let info_vlr_at = HEADER_LENGTH;
        vlrs.extend(vlr("copc", 1, &[0u8; 160]));
        let mut vlr_count = 1u32;
        let laz_vlr = self.compressed.then(laz_vlr);
        if let Some(laz_vlr) = &laz_vlr {
            let mut content = Vec::new();
            laz_vlr.write_to(&mut content).expect("write laszip VLR");
            vlrs.extend(vlr("laszip encoded", 22204, &content));
            vlr_count += 1;
        }
        if self.include_wkt {
            vlrs.extend(vlr("LASF_Projection", 2112, WKT));
            vlr_count += 1;
        }
        let point_data_offset = HEADER_LENGTH + vlrs.len();

        // Point data, one run per node
        let mut point_data = Vec::new();
        let mut chunks = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let offset = (point_data_offset + point_data.len()) as u64;
            match &laz_vlr {
                Some(laz_vlr) => point_data.extend(compress_chunk(laz_vlr, &node.points)),
                None => {
                    for point in &node.points {
                        point_data.extend(point.record());
                    }
                }
            }
            let length = (point_data_offset + point_data.len()) as u64 - offset;
            chunks.push((node, offset, length));
        }

        // Hierarchy: root page then the optional child page
        let evlr_offset = (point_data_offset + point_data.len()) as u64;
        let root_page_offset = evlr_offset + 60;
        let has_child_page = self.nodes.iter().any(|n| n.in_child_page);

        let mut child_page = Vec::new();
        for (node, offset, length) in chunks.iter().filter(|(n, _, _)| n.in_child_page) {
            child_page.extend(entry(node.key, *offset, *length as i32, node.declared()));
        }

        let mut root_entries: Vec<Vec<u8>> = chunks
            .iter()
            .filter(|(n, _, _)| !n.in_child_page)
            .map(|(node, offset, length)| {
                entry(node.key, *offset, *length as i32, node.declared())
            })
            .collect();
        let root_page_length = (root_entries.len() + has_child_page as usize) as u64 * 32;
        if has_child_page {
            let child_key = self
                .nodes
                .iter()
                .filter(|n| n.in_child_page)
                .map(|n| n.key)
                .min()
                .unwrap_or(VoxelKey::ROOT);
            root_entries.push(entry(
                child_key,
                root_page_offset + root_page_length,
                child_page.len() as i32,
                -1,
            ));
        }
        let mut hierarchy: Vec<u8> = root_entries.concat();
        hierarchy.extend(&child_page);

        let mut info = Vec::with_capacity(160);
        for value in [CENTER, CENTER, CENTER, HALFSIZE, 1.0] {
            info.extend(value.to_le_bytes());
        }
        info.extend(root_page_offset.to_le_bytes());
        info.extend(root_page_length.to_le_bytes());
        info.extend(GPS_TIME_RANGE[0].to_le_bytes());
        info.extend(GPS_TIME_RANGE[1].to_le_bytes());
        info.resize(160, 0);
        let info_at = info_vlr_at - HEADER_LENGTH + 54;
        vlrs[info_at..info_at + 160].copy_from_slice(&info);

        let point_count = (self.total_points() as i64 + self.point_count_skew) as u64;
        let mut bytes = self.header(point_data_offset as u32, vlr_count, point_count);
        bytes.extend(vlrs);
        bytes.extend(point_data);

        if self.include_hierarchy {
            bytes[235..243].copy_from_slice(&evlr_offset.to_le_bytes());
            bytes[243..247].copy_from_slice(&1u32.to_le_bytes());
            bytes.extend(evlr_header("copc", 1000, hierarchy.len() as u64));
            bytes.extend(hierarchy);
        }
        bytes
    }

    fn header(&self, point_data_offset: u32, vlr_count: u32, point_count: u64) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LENGTH];
        bytes[0..4].copy_from_slice(b"LASF");
        bytes[6..8].copy_from_slice(&(1u16 << 4).to_le_bytes());
        bytes[24] = 1;
        bytes[25] = self.minor_version;
        bytes[26..35].copy_from_slice(b"synthetic");
        bytes[94..96].copy_from_slice(&(HEADER_LENGTH as u16).to_le_bytes());
        bytes[96..100].copy_from_slice(&point_data_offset.to_le_bytes());
        bytes[100..104].copy_from_slice(&vlr_count.to_le_bytes());
        bytes[104] = if self.compressed { 7 | 0x80 } else { 7 };
        bytes[105..107].copy_from_slice(&(RECORD_LENGTH as u16).to_le_bytes());
        for axis in 0..3 {
            let at = 131 + axis * 8;
            bytes[at..at + 8].copy_from_slice(&SCALE.to_le_bytes());
        }
        // max x, min x, max y, min y, max z, min z
        for axis in 0..3 {
            let at = 179 + axis * 16;
            bytes[at..at + 8].copy_from_slice(&(CENTER + HALFSIZE).to_le_bytes());
            bytes[at + 8..at + 16].copy_from_slice(&(CENTER - HALFSIZE).to_le_bytes());
        }
        bytes[247..255].copy_from_slice(&point_count.to_le_bytes());
        bytes[255..263].copy_from_slice(&point_count.to_le_bytes());
        bytes
    }

    pub fn getter(&self) -> SharedGetter {
        Arc::new(MemoryGetter::new("synthetic.copc.laz", self.build()))
    }
}

fn laz_vlr() -> LazVlr {
    LazVlrBuilder::default()
        .with_point_format(7, 0)
        .expect("format 7 is supported")
        .with_variable_chunk_size()
        .build()
}

/// One LAZ chunk holding `points`
fn compress_chunk(laz_vlr: &LazVlr, points: &[TestPoint]) -> Vec<u8> {
    let mut compressor = LayeredPointRecordCompressor::new(Vec::<u8>::new());
    compressor
        .set_fields_from(laz_vlr.items())
        .expect("set LAZ fields");
    for point in points {
        compressor
            .compress_next(&point.record())
            .expect("compress point");
    }
    compressor.done().expect("finish chunk");
    compressor.into_inner()
}

pub fn vlr(user_id: &str, record_id: u16, content: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 54];
    bytes[2..2 + user_id.len()].copy_from_slice(user_id.as_bytes());
    bytes[18..20].copy_from_slice(&record_id.to_le_bytes());
    bytes[20..22].copy_from_slice(&(content.len() as u16).to_le_bytes());
    bytes.extend_from_slice(content);
    bytes
}

pub fn evlr_header(user_id: &str, record_id: u16, length: u64) -> Vec<u8> {
    let mut bytes = vec![0u8; 60];
    bytes[2..2 + user_id.len()].copy_from_slice(user_id.as_bytes());
    bytes[18..20].copy_from_slice(&record_id.to_le_bytes());
    bytes[20..28].copy_from_slice(&length.to_le_bytes());
    bytes
}

pub fn entry(key: VoxelKey, offset: u64, byte_size: i32, point_count: i32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32);
    for value in [key.level, key.x, key.y, key.z] {
        bytes.extend(value.to_le_bytes());
    }
    bytes.extend(offset.to_le_bytes());
    bytes.extend(byte_size.to_le_bytes());
    bytes.extend(point_count.to_le_bytes());
    bytes
}

pub fn getter_for(name: &str, bytes: Vec<u8>) -> SharedGetter {
    Arc::new(MemoryGetter::new(name, bytes))
}

/// Write bytes to a temporary `.copc.laz` file
pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".copc.laz")
        .tempfile()
        .expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}
