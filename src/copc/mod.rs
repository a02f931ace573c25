//! COPC decoding on top of the LAS primitives: the info VLR, the octree
//! hierarchy and node point chunks.

pub mod chunk;
pub mod hierarchy;
pub mod info;

pub use hierarchy::{Hierarchy, HierarchyPage, Node, PageRef, VoxelKey};
pub use info::{Bounds, CopcInfo};

use std::sync::Arc;

use laz::LazVlr;

use crate::error::{CopcError, Result};
use crate::getter::Getter;
use crate::las::{Header, Las, Vlr, vlr};

pub const COPC_USER_ID: &str = "copc";
pub const COPC_INFO_RECORD_ID: u16 = 1;
pub const COPC_HIERARCHY_RECORD_ID: u16 = 1000;
pub const LAZ_USER_ID: &str = "laszip encoded";
pub const LAZ_RECORD_ID: u16 = 22204;

/// A fully decoded COPC file
#[derive(Debug, Clone)]
pub struct Copc {
    pub header: Header,
    pub vlrs: Vec<Vlr>,
    pub info: CopcInfo,
    pub root_page: HierarchyPage,
    pub laz_vlr: Option<Arc<LazVlr>>,
}

impl Copc {
    /// Decode header, VLRs, the info VLR and the root hierarchy page
    pub async fn read(getter: &dyn Getter) -> Result<Self> {
        let Las { header, vlrs } = Las::read(getter).await?;

        let info_vlr = vlr::find(&vlrs, COPC_USER_ID, COPC_INFO_RECORD_ID)
            .into_iter()
            .next()
            .ok_or(CopcError::MissingInfo)?;
        let info = CopcInfo::parse(&info_vlr.data)?;

        if vlr::find(&vlrs, COPC_USER_ID, COPC_HIERARCHY_RECORD_ID).is_empty() {
            return Err(CopcError::MissingHierarchy.into());
        }

        let root_page = HierarchyPage::read(
            getter,
            PageRef {
                offset: info.root_hierarchy_offset,
                length: info.root_hierarchy_length,
            },
        )
        .await?;

        let laz_vlr = match vlr::find(&vlrs, LAZ_USER_ID, LAZ_RECORD_ID).first() {
            Some(found) => Some(Arc::new(chunk::parse_laz_vlr(&found.data)?)),
            None => None,
        };

        Ok(Self {
            header,
            vlrs,
            info,
            root_page,
            laz_vlr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copc::hierarchy::tests::entry;
    use crate::copc::info::tests::info_bytes;
    use crate::getter::MemoryGetter;
    use crate::las::header::tests::las14_header_bytes;
    use crate::las::vlr::tests::{evlr_header_bytes, vlr_bytes};

    fn copc_bytes(with_hierarchy: bool) -> Vec<u8> {
        let mut bytes = las14_header_bytes();
        let info_at = bytes.len() + 54;
        bytes.extend(vlr_bytes("copc", 1, &[0u8; 160]));
        let point_data_offset = bytes.len() as u32;
        let evlr_offset = bytes.len() as u64;
        let page_offset = evlr_offset + 60;
        bytes.extend(evlr_header_bytes("copc", 1000, 32));
        bytes.extend(entry(VoxelKey::ROOT, point_data_offset as u64, 0, 0));

        let info = info_bytes([50.0; 3], 50.0, (page_offset, 32), [0.0, 10.0]);
        bytes[info_at..info_at + 160].copy_from_slice(&info);
        bytes[96..100].copy_from_slice(&point_data_offset.to_le_bytes());
        bytes[100..104].copy_from_slice(&1u32.to_le_bytes());
        if with_hierarchy {
            bytes[235..243].copy_from_slice(&evlr_offset.to_le_bytes());
            bytes[243..247].copy_from_slice(&1u32.to_le_bytes());
        }
        bytes
    }

    #[tokio::test]
    async fn test_read_copc() {
        let getter = MemoryGetter::new("copc", copc_bytes(true));
        let copc = Copc::read(&getter).await.unwrap();
        assert_eq!(copc.info.halfsize, 50.0);
        assert_eq!(copc.root_page.nodes.len(), 1);
        assert!(copc.laz_vlr.is_none());
        assert_eq!(copc.vlrs.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_hierarchy() {
        let getter = MemoryGetter::new("copc", copc_bytes(false));
        let error = Copc::read(&getter).await.unwrap_err();
        assert!(error.to_string().contains("Missing copc hierarchy VLR"));
    }

    #[tokio::test]
    async fn test_missing_info() {
        let mut bytes = las14_header_bytes();
        bytes.extend(vlr_bytes("LASF_Projection", 2112, b"WKT\0"));
        bytes[100..104].copy_from_slice(&1u32.to_le_bytes());
        let getter = MemoryGetter::new("las", bytes);
        let error = Copc::read(&getter).await.unwrap_err();
        assert!(error.to_string().contains("Missing copc info VLR"));
    }
}
