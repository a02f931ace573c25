//! Public header rules

use crate::check::{Expected, Status, basic_check, complex_check};
use crate::fallback::ManualHeader;
use crate::las::Header;
use crate::las::header::LAS14_HEADER_LENGTH;
use crate::las::point::base_record_length;
use crate::suite::Suite;

const COPC_POINT_FORMATS: [u8; 3] = [6, 7, 8];

/// Rules over a decoded header
pub fn header_suite() -> Suite<Header> {
    Suite::<Header>::new()
        .check("minorVersion", |h| minor_version(h.minor_version))
        .check("pointDataRecordFormat", |h| {
            point_data_record_format(h.point_data_record_format)
        })
        .check("headerLength", |h| header_length(h.header_length))
        .check("pointCountByReturn", |h| {
            let sum: u128 = h.point_count_by_return.iter().map(|&c| c as u128).sum();
            complex_check(sum, |sum| *sum == h.point_count as u128)
                .on_failure(format!(
                    "Point count by return sums to {}, header point count is {}",
                    sum, h.point_count
                ))
                .status()
        })
        .check("pointDataRecordLength", |h| {
            let format = h.point_data_record_format;
            let length = h.point_data_record_length;
            match base_record_length(format) {
                Some(minimum) => complex_check(length, |l| *l >= minimum)
                    .on_failure(format!(
                        "Record length {} is shorter than the {} bytes format {} needs",
                        length, minimum, format
                    ))
                    .status(),
                None => Status::fail(format!("Unknown point data record format {}", format)),
            }
        })
        .check("globalEncoding", |h| {
            complex_check(h, |h| h.has_wkt_bit())
                .on_failure(format!(
                    "WKT bit (4) is not set in global encoding {:#06x}",
                    h.global_encoding
                ))
                .status()
        })
}

/// Rules over hand-parsed header fields, for files the decoder rejected
pub fn manual_header_suite() -> Suite<ManualHeader> {
    Suite::<ManualHeader>::new()
        .check("fileSignature", |h| {
            basic_check(
                h.file_signature.as_str(),
                Expected::eq("LASF"),
                Some(format!("{:?}", h.file_signature)),
            )
        })
        .check("majorVersion", |h| {
            complex_check(h.major_version, |v| *v == 1)
                .on_failure(format!("Expected 1, found {}", h.major_version))
                .status()
        })
        .check("minorVersion", |h| minor_version(h.minor_version))
        .check("headerLength", |h| header_length(h.header_length))
        .check("pointDataRecordFormat", |h| {
            point_data_record_format(h.point_data_record_format)
        })
}

fn minor_version(minor: u8) -> Status {
    complex_check(minor, |v| *v == 4)
        .on_failure(format!("Expected 4, found {}", minor))
        .status()
}

fn header_length(length: u16) -> Status {
    complex_check(length as usize, |l| *l == LAS14_HEADER_LENGTH)
        .on_failure(format!("Expected {}, found {}", LAS14_HEADER_LENGTH, length))
        .status()
}

fn point_data_record_format(format: u8) -> Status {
    basic_check(
        format,
        Expected::one_of(COPC_POINT_FORMATS),
        (!COPC_POINT_FORMATS.contains(&format))
            .then(|| format!("Format {} is not one of 6, 7, 8", format)),
    )
}
