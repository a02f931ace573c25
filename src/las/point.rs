//! Point data records for formats 6-10

use crate::error::{LasError, LasResult};
use crate::las::header::{Header, f64_at, i32_at, u16_at};

/// What a reader needs to turn raw records into points
#[derive(Debug, Clone, PartialEq)]
pub struct PointLayout {
    pub format: u8,
    pub record_length: u16,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
}

impl PointLayout {
    pub fn from_header(header: &Header) -> Self {
        Self {
            format: header.point_data_record_format,
            record_length: header.point_data_record_length,
            scale: header.scale,
            offset: header.offset,
        }
    }

    pub fn has_rgb(&self) -> bool {
        matches!(self.format, 7 | 8 | 10)
    }
}

/// Smallest record length of a point data record format, if supported
pub fn base_record_length(format: u8) -> Option<u16> {
    match format {
        0 => Some(20),
        1 => Some(28),
        2 => Some(26),
        3 => Some(34),
        4 => Some(57),
        5 => Some(63),
        6 => Some(30),
        7 => Some(36),
        8 => Some(38),
        9 => Some(59),
        10 => Some(67),
        _ => None,
    }
}

/// The dimensions the point rules inspect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: u16,
    pub return_number: u8,
    pub number_of_returns: u8,
    pub gps_time: f64,
    pub rgb: Option<[u16; 3]>,
}

impl PointRecord {
    pub fn parse(bytes: &[u8], layout: &PointLayout) -> LasResult<Self> {
        if !(6..=10).contains(&layout.format) {
            return Err(LasError::UnsupportedPointFormat {
                format: layout.format,
            });
        }
        let minimum = base_record_length(layout.format).unwrap_or(30) as usize;
        if bytes.len() < minimum {
            return Err(LasError::PointRecordTooShort {
                format: layout.format,
                length: bytes.len(),
                minimum,
            });
        }

        let returns = bytes[14];
        let rgb = layout
            .has_rgb()
            .then(|| [u16_at(bytes, 30), u16_at(bytes, 32), u16_at(bytes, 34)]);

        Ok(Self {
            x: i32_at(bytes, 0) as f64 * layout.scale[0] + layout.offset[0],
            y: i32_at(bytes, 4) as f64 * layout.scale[1] + layout.offset[1],
            z: i32_at(bytes, 8) as f64 * layout.scale[2] + layout.offset[2],
            intensity: u16_at(bytes, 12),
            return_number: returns & 0x0f,
            number_of_returns: returns >> 4,
            gps_time: f64_at(bytes, 22),
            rgb,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(format: u8) -> PointLayout {
        PointLayout {
            format,
            record_length: base_record_length(format).unwrap(),
            scale: [0.01, 0.01, 0.01],
            offset: [100.0, 200.0, 0.0],
        }
    }

    fn record(format: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; base_record_length(format).unwrap() as usize];
        bytes[0..4].copy_from_slice(&150i32.to_le_bytes());
        bytes[4..8].copy_from_slice(&(-250i32).to_le_bytes());
        bytes[8..12].copy_from_slice(&1000i32.to_le_bytes());
        bytes[12..14].copy_from_slice(&4000u16.to_le_bytes());
        bytes[14] = 2 | (3 << 4);
        bytes[22..30].copy_from_slice(&12.5f64.to_le_bytes());
        if format >= 7 {
            bytes[30..32].copy_from_slice(&300u16.to_le_bytes());
            bytes[32..34].copy_from_slice(&20u16.to_le_bytes());
            bytes[34..36].copy_from_slice(&65535u16.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_parse_format_7() {
        let point = PointRecord::parse(&record(7), &layout(7)).unwrap();
        assert!((point.x - 101.5).abs() < 1e-9);
        assert!((point.y - 197.5).abs() < 1e-9);
        assert!((point.z - 10.0).abs() < 1e-9);
        assert_eq!(point.intensity, 4000);
        assert_eq!(point.return_number, 2);
        assert_eq!(point.number_of_returns, 3);
        assert_eq!(point.gps_time, 12.5);
        assert_eq!(point.rgb, Some([300, 20, 65535]));
    }

    #[test]
    fn test_parse_format_6_has_no_rgb() {
        let point = PointRecord::parse(&record(6), &layout(6)).unwrap();
        assert_eq!(point.rgb, None);
    }

    #[test]
    fn test_legacy_format_unsupported() {
        let mut legacy = layout(6);
        legacy.format = 3;
        assert!(matches!(
            PointRecord::parse(&[0u8; 34], &legacy),
            Err(LasError::UnsupportedPointFormat { format: 3 })
        ));
    }

    #[test]
    fn test_short_record() {
        assert!(matches!(
            PointRecord::parse(&[0u8; 20], &layout(8)),
            Err(LasError::PointRecordTooShort { minimum: 38, .. })
        ));
    }
}
