//! Turning downloaded GRIB2 bytes into a [`GridField`].
//!
//! Grid geometry and product identification are read straight from sections 3 and 4
//! of each message. Value unpacking is delegated to the `grib` crate, which handles
//! the simple, complex and PNG packing templates NCEP uses.

use crate::grid::field::GridField;
use crate::grid::projection::{
    GridGeometry, LambertConformal, Projection, RegularLatLon, ScanningMode, NCEP_EARTH_RADIUS_M,
};
use crate::provider::error::ProviderError;
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::io::Cursor;

const MISSING_U32: u32 = u32::MAX;

/// GRIB2 code table 4.5 value for "specified height level above ground (m)".
const HEIGHT_ABOVE_GROUND: u8 = 103;

/// Discipline / category / number triple identifying a GRIB2 parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterId {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
}

impl ParameterId {
    pub const UGRD: ParameterId = ParameterId {
        discipline: 0,
        category: 2,
        number: 2,
    };
    pub const VGRD: ParameterId = ParameterId {
        discipline: 0,
        category: 2,
        number: 3,
    };
}

/// Metadata of one field (submessage) inside a GRIB2 message.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHeader {
    pub parameter: Option<ParameterId>,
    pub surface_type: u8,
    pub surface_value: f64,
    pub geometry: GridGeometry,
}

impl FieldHeader {
    fn is_10m_component(&self, parameter: ParameterId) -> bool {
        self.parameter == Some(parameter)
            && self.surface_type == HEIGHT_ABOVE_GROUND
            && (self.surface_value - 10.0).abs() < 1e-6
    }
}

/// Splits a buffer of concatenated GRIB2 messages using the length in section 0.
pub fn split_messages(bytes: &[u8]) -> Result<Vec<&[u8]>, ProviderError> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < 16 || &rest[..4] != b"GRIB" {
            return Err(ProviderError::MalformedGrib(format!(
                "expected GRIB indicator at byte {}",
                offset
            )));
        }
        if rest[7] != 2 {
            return Err(ProviderError::MalformedGrib(format!(
                "expected GRIB edition 2 at byte {}, found edition {}",
                offset, rest[7]
            )));
        }
        let length = read_u64(rest, 8) as usize;
        if length < 16 || length > rest.len() {
            return Err(ProviderError::MalformedGrib(format!(
                "message at byte {} claims {} bytes but only {} remain",
                offset,
                length,
                rest.len()
            )));
        }
        messages.push(&rest[..length]);
        offset += length;
    }
    Ok(messages)
}

/// Reads the header of every field in a message, in storage order.
pub fn parse_field_headers(message: &[u8]) -> Result<Vec<FieldHeader>, ProviderError> {
    require_len(message, 16, 0)?;
    let discipline = message[6];
    let mut headers = Vec::new();
    let mut geometry: Option<GridGeometry> = None;
    let mut product: Option<(Option<ParameterId>, u8, f64)> = None;

    let mut offset = 16;
    loop {
        let rest = &message[offset..];
        if rest.starts_with(b"7777") {
            break;
        }
        if rest.len() < 5 {
            return Err(ProviderError::MalformedGrib(
                "message ends without end section".to_string(),
            ));
        }
        let length = read_u32(rest, 0) as usize;
        if length < 5 || length > rest.len() {
            return Err(ProviderError::MalformedGrib(format!(
                "section at byte {} has invalid length {}",
                offset, length
            )));
        }
        let section = &rest[..length];
        match section[4] {
            3 => geometry = Some(parse_grid_definition(section)?),
            4 => product = Some(parse_product_definition(section, discipline)?),
            7 => {
                let geometry = geometry.clone().ok_or_else(|| {
                    ProviderError::MalformedGrib("data section before grid definition".to_string())
                })?;
                let (parameter, surface_type, surface_value) = product.take().ok_or_else(|| {
                    ProviderError::MalformedGrib(
                        "data section before product definition".to_string(),
                    )
                })?;
                headers.push(FieldHeader {
                    parameter,
                    surface_type,
                    surface_value,
                    geometry,
                });
            }
            _ => {}
        }
        offset += length;
    }
    Ok(headers)
}

fn parse_grid_definition(section: &[u8]) -> Result<GridGeometry, ProviderError> {
    require_len(section, 14, 3)?;
    let template = read_u16(section, 12);
    match template {
        0 => {
            require_len(section, 72, 3)?;
            let nx = read_u32(section, 30) as usize;
            let ny = read_u32(section, 34) as usize;
            let basic_angle = read_u32(section, 38);
            let subdivisions = read_u32(section, 42);
            let unit = if basic_angle == 0 || basic_angle == MISSING_U32 || subdivisions == 0 {
                1e-6
            } else {
                f64::from(basic_angle) / f64::from(subdivisions)
            };
            let scanning = scanning_mode(section[71])?;
            Ok(GridGeometry {
                projection: Projection::LatLon(RegularLatLon {
                    lat1: f64::from(read_i32(section, 46)) * unit,
                    lon1: f64::from(read_i32(section, 50)) * unit,
                    di: f64::from(read_u32(section, 63)) * unit,
                    dj: f64::from(read_u32(section, 67)) * unit,
                }),
                scanning,
                nx,
                ny,
            })
        }
        30 => {
            require_len(section, 81, 3)?;
            let radius = earth_radius(section[14], section[15], read_u32(section, 16));
            let nx = read_u32(section, 30) as usize;
            let ny = read_u32(section, 34) as usize;
            let scanning = scanning_mode(section[64])?;
            let lambert = LambertConformal::new(
                f64::from(read_i32(section, 38)) * 1e-6,
                f64::from(read_i32(section, 42)) * 1e-6,
                f64::from(read_i32(section, 51)) * 1e-6,
                f64::from(read_i32(section, 65)) * 1e-6,
                f64::from(read_i32(section, 69)) * 1e-6,
                f64::from(read_u32(section, 55)) * 1e-3,
                f64::from(read_u32(section, 59)) * 1e-3,
                radius,
            );
            Ok(GridGeometry {
                projection: Projection::Lambert(lambert),
                scanning,
                nx,
                ny,
            })
        }
        other => Err(ProviderError::UnsupportedGrid(other)),
    }
}

fn parse_product_definition(
    section: &[u8],
    discipline: u8,
) -> Result<(Option<ParameterId>, u8, f64), ProviderError> {
    require_len(section, 9, 4)?;
    let template = read_u16(section, 7);
    // Templates 4.0 to 4.15 share the parameter and first fixed surface layout.
    if template > 15 {
        debug!("Skipping product definition template 4.{}", template);
        return Ok((None, 255, f64::NAN));
    }
    require_len(section, 28, 4)?;
    let parameter = ParameterId {
        discipline,
        category: section[9],
        number: section[10],
    };
    let surface_type = section[22];
    let scale = sign_magnitude_i8(section[23]);
    let scaled_value = read_i32(section, 24);
    let surface_value = f64::from(scaled_value) / 10f64.powi(i32::from(scale));
    Ok((Some(parameter), surface_type, surface_value))
}

fn scanning_mode(flags: u8) -> Result<ScanningMode, ProviderError> {
    ScanningMode::from_flags(flags).ok_or(ProviderError::UnsupportedScanningMode(flags))
}

/// Earth radius from GRIB2 code table 3.2.
fn earth_radius(shape: u8, scale_factor: u8, scaled_value: u32) -> f64 {
    match shape {
        0 => 6_367_470.0,
        1 if scaled_value != MISSING_U32 && scaled_value != 0 => {
            f64::from(scaled_value) / 10f64.powi(i32::from(sign_magnitude_i8(scale_factor)))
        }
        6 => NCEP_EARTH_RADIUS_M,
        other => {
            warn!(
                "Shape of earth {} is not a sphere of known radius, assuming {} m",
                other, NCEP_EARTH_RADIUS_M
            );
            NCEP_EARTH_RADIUS_M
        }
    }
}

/// Unpacks the values of every field in a message, in storage order.
fn unpack_values(message: &[u8]) -> Result<Vec<Vec<f32>>, ProviderError> {
    let grib2 = grib::from_reader(Cursor::new(message))
        .map_err(|e| ProviderError::Unpack(e.to_string()))?;
    let mut fields = Vec::new();
    for (_index, submessage) in grib2.iter() {
        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| ProviderError::Unpack(e.to_string()))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| ProviderError::Unpack(e.to_string()))?
            .collect();
        fields.push(values);
    }
    Ok(fields)
}

/// Decodes the 10 m U and V components from a buffer of GRIB2 messages.
pub fn decode_wind_field(
    bytes: &[u8],
    valid_time: NaiveDateTime,
) -> Result<GridField, ProviderError> {
    let mut u: Option<(GridGeometry, Vec<f32>)> = None;
    let mut v: Option<(GridGeometry, Vec<f32>)> = None;

    for message in split_messages(bytes)? {
        let headers = parse_field_headers(message)?;
        let wanted = headers.iter().any(|header| {
            header.is_10m_component(ParameterId::UGRD) || header.is_10m_component(ParameterId::VGRD)
        });
        if !wanted {
            continue;
        }

        let values = unpack_values(message)?;
        if values.len() != headers.len() {
            return Err(ProviderError::MalformedGrib(format!(
                "found {} field headers but unpacked {} fields",
                headers.len(),
                values.len()
            )));
        }

        for (header, values) in headers.into_iter().zip(values) {
            let expected = header.geometry.nx * header.geometry.ny;
            if values.len() != expected {
                return Err(ProviderError::MalformedGrib(format!(
                    "field has {} values, grid defines {}",
                    values.len(),
                    expected
                )));
            }
            if u.is_none() && header.is_10m_component(ParameterId::UGRD) {
                u = Some((header.geometry, values));
            } else if v.is_none() && header.is_10m_component(ParameterId::VGRD) {
                v = Some((header.geometry, values));
            }
        }
    }

    let (u_geometry, u) = u.ok_or(ProviderError::MissingVariable("UGRD at 10 m above ground"))?;
    let (v_geometry, v) = v.ok_or(ProviderError::MissingVariable("VGRD at 10 m above ground"))?;
    if u_geometry != v_geometry {
        return Err(ProviderError::GridMismatch);
    }
    debug!(
        "Decoded {}x{} wind field valid at {}",
        u_geometry.nx, u_geometry.ny, valid_time
    );
    Ok(GridField::from_geometry(u_geometry, u, v)?.with_valid_time(valid_time))
}

fn require_len(section: &[u8], len: usize, number: u8) -> Result<(), ProviderError> {
    if section.len() < len {
        return Err(ProviderError::MalformedGrib(format!(
            "section {} is {} bytes, expected at least {}",
            number,
            section.len(),
            len
        )));
    }
    Ok(())
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(buf)
}

/// GRIB2 stores signed integers as sign and magnitude, not two's complement.
fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let raw = read_u32(bytes, at);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn sign_magnitude_i8(raw: u8) -> i8 {
    let magnitude = (raw & 0x7F) as i8;
    if raw & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}
