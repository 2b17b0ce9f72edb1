//! TIFF stack support.
//!
//! Microscopy volumes arrive as multi-page grayscale TIFFs: one page per
//! Z-slice, all pages the same size. OTF tables are single-page float
//! TIFFs holding packed complex pairs along X.
//!
//! # Features
//!
//! - 8/16/32-bit integer and 32/64-bit float grayscale pages on read
//! - 32-bit float pages on write
//! - Raw intensities, no normalization
//!
//! # Example
//!
//! ```rust,ignore
//! use lsdecon_io::tiff;
//!
//! let stack = tiff::read("cell1_ch0_stack0000.tif")?;
//! tiff::write("cell1_ch0_stack0000_decon.tif", &stack)?;
//! ```

use crate::{IoError, IoResult};
use lsdecon_core::{Extents, Volume};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;

fn decode_err(e: tiff::TiffError) -> IoError {
    IoError::DecodeError(e.to_string())
}

fn encode_err(e: tiff::TiffError) -> IoError {
    IoError::EncodeError(e.to_string())
}

/// Reads a multi-page TIFF into a volume (one page per Z-slice).
///
/// # Errors
///
/// - [`IoError::DimensionMismatch`] if pages differ in size
/// - [`IoError::UnsupportedSampleType`] for color or packed-bit pages
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Volume> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(decode_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(decode_err)?;
    let mut data = Vec::new();
    let mut pages = 0usize;

    loop {
        let dims = decoder.dimensions().map_err(decode_err)?;
        if dims != (width, height) {
            return Err(IoError::DimensionMismatch {
                expected: format!("{}x{} page", width, height),
                actual: format!("{}x{} at page {}", dims.0, dims.1, pages),
            });
        }

        let color_type = decoder.colortype().map_err(decode_err)?;
        let page = decoder.read_image().map_err(decode_err)?;
        append_page(&mut data, color_type, page)?;
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(decode_err)?;
    }

    let extents = Extents::new(width as usize, height as usize, pages);
    tracing::debug!(path = %path.display(), %extents, "read TIFF stack");
    Ok(Volume::from_vec(extents, data)?)
}

/// Reads a single-page TIFF as a 2-D table (a volume with one Z-slice).
///
/// # Errors
///
/// Returns [`IoError::DimensionMismatch`] if the file holds more than one page.
pub fn read_plane<P: AsRef<Path>>(path: P) -> IoResult<Volume> {
    let table = read(path)?;
    if table.nz() != 1 {
        return Err(IoError::DimensionMismatch {
            expected: "1 page".to_string(),
            actual: format!("{} pages", table.nz()),
        });
    }
    Ok(table)
}

fn append_page(out: &mut Vec<f32>, color_type: ColorType, page: DecodingResult) -> IoResult<()> {
    match (color_type, page) {
        (ColorType::Gray(8), DecodingResult::U8(buf)) => {
            out.extend(buf.iter().map(|&v| v as f32));
        }
        (ColorType::Gray(16), DecodingResult::U16(buf)) => {
            out.extend(buf.iter().map(|&v| v as f32));
        }
        (ColorType::Gray(16), DecodingResult::I16(buf)) => {
            out.extend(buf.iter().map(|&v| v as f32));
        }
        (ColorType::Gray(32), DecodingResult::U32(buf)) => {
            out.extend(buf.iter().map(|&v| v as f32));
        }
        (ColorType::Gray(32), DecodingResult::F32(buf)) => {
            out.extend_from_slice(&buf);
        }
        (ColorType::Gray(64), DecodingResult::F64(buf)) => {
            out.extend(buf.iter().map(|&v| v as f32));
        }
        (ct, _) => {
            return Err(IoError::UnsupportedSampleType(format!(
                "TIFF color type {:?} (expected grayscale)",
                ct
            )));
        }
    }
    Ok(())
}

/// Writes a volume as a multi-page 32-bit float TIFF.
pub fn write<P: AsRef<Path>>(path: P, volume: &Volume) -> IoResult<()> {
    use tiff::encoder::{colortype, TiffEncoder};

    let path = path.as_ref();
    let extents = volume.extents();
    let width = u32::try_from(extents.nx)
        .map_err(|_| IoError::EncodeError(format!("width {} exceeds TIFF limit", extents.nx)))?;
    let height = u32::try_from(extents.ny)
        .map_err(|_| IoError::EncodeError(format!("height {} exceeds TIFF limit", extents.ny)))?;

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file).map_err(encode_err)?;

    for z in 0..extents.nz {
        encoder
            .write_image::<colortype::Gray32Float>(width, height, volume.slice(z))
            .map_err(encode_err)?;
    }

    tracing::debug!(path = %path.display(), %extents, "wrote TIFF stack");
    Ok(())
}
