//! LAS decoding primitives: the public header, VLRs and point records.

pub mod header;
pub mod point;
pub mod vlr;

pub use header::Header;
pub use point::{PointLayout, PointRecord};
pub use vlr::Vlr;

use crate::error::Result;
use crate::getter::Getter;

/// A plain LAS decode: header plus VLR walk, with no COPC semantics
#[derive(Debug, Clone)]
pub struct Las {
    pub header: Header,
    pub vlrs: Vec<Vlr>,
}

impl Las {
    pub async fn read(getter: &dyn Getter) -> Result<Self> {
        let header = Header::read(getter).await?;
        let vlrs = Vlr::walk(getter, &header).await?;
        Ok(Self { header, vlrs })
    }
}
