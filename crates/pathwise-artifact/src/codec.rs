//! Binary layouts for density frames and coupling matrices.
//!
//! All integers are little-endian. Both layouts open with four magic
//! bytes and a one-byte version:
//!
//! ```text
//! density: [b"PWDN"] [version u8] [index u32] [ndim u32] [shape u32 * ndim] [f32 * cells]
//! pi.bin:  [b"PWPI"] [version u8] [rows u32]  [cols u32] [f64 * rows * cols]
//! ```

use std::io::Read;

use crate::error::ArtifactError;

/// Magic bytes of a density frame.
pub const DENSITY_MAGIC: [u8; 4] = *b"PWDN";
/// Magic bytes of a coupling matrix.
pub const COUPLING_MAGIC: [u8; 4] = *b"PWPI";
/// Current version of both layouts.
pub const LAYOUT_VERSION: u8 = 1;

/// A decoded density frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityFrame {
    /// Frame number within the run.
    pub index: u32,
    /// Grid shape.
    pub shape: Vec<u32>,
    /// Cell values, narrowed to `f32`.
    pub values: Vec<f32>,
}

/// A decoded coupling matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CouplingMatrix {
    /// Source count.
    pub rows: u32,
    /// Target count.
    pub cols: u32,
    /// Row-major entries.
    pub values: Vec<f64>,
}

pub(crate) fn to_u32(what: &str, n: usize) -> Result<u32, ArtifactError> {
    u32::try_from(n).map_err(|_| ArtifactError::Malformed {
        detail: format!("{what} {n} does not fit in u32"),
    })
}

fn read_u8(r: &mut dyn Read) -> Result<u8, ArtifactError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, ArtifactError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32_le(r: &mut dyn Read) -> Result<f32, ArtifactError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, ArtifactError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_preamble(r: &mut dyn Read, magic: [u8; 4]) -> Result<(), ArtifactError> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if found != magic {
        return Err(ArtifactError::InvalidMagic { expected: magic });
    }
    let version = read_u8(r)?;
    if version != LAYOUT_VERSION {
        return Err(ArtifactError::UnsupportedVersion { found: version });
    }
    Ok(())
}

fn expect_end(r: &mut dyn Read) -> Result<(), ArtifactError> {
    let mut probe = [0u8; 1];
    match r.read(&mut probe)? {
        0 => Ok(()),
        _ => Err(ArtifactError::Malformed {
            detail: "trailing bytes after payload".into(),
        }),
    }
}

pub(crate) fn write_density(index: u32, shape: &[u32], values: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(13 + 4 * shape.len() + 4 * values.len());
    buf.extend_from_slice(&DENSITY_MAGIC);
    buf.push(LAYOUT_VERSION);
    buf.extend_from_slice(&index.to_le_bytes());
    buf.extend_from_slice(&(shape.len() as u32).to_le_bytes());
    for s in shape {
        buf.extend_from_slice(&s.to_le_bytes());
    }
    for v in values {
        buf.extend_from_slice(&(*v as f32).to_le_bytes());
    }
    buf
}

pub(crate) fn write_coupling(rows: u32, cols: u32, values: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(13 + 8 * values.len());
    buf.extend_from_slice(&COUPLING_MAGIC);
    buf.push(LAYOUT_VERSION);
    buf.extend_from_slice(&rows.to_le_bytes());
    buf.extend_from_slice(&cols.to_le_bytes());
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Decode a `density_NNN.bin` payload.
pub fn decode_density_frame(mut bytes: &[u8]) -> Result<DensityFrame, ArtifactError> {
    let r: &mut dyn Read = &mut bytes;
    read_preamble(r, DENSITY_MAGIC)?;
    let index = read_u32_le(r)?;
    let ndim = read_u32_le(r)?;
    let shape = (0..ndim)
        .map(|_| read_u32_le(r))
        .collect::<Result<Vec<_>, _>>()?;
    let cells = shape
        .iter()
        .try_fold(1usize, |acc, &s| acc.checked_mul(s as usize))
        .ok_or_else(|| ArtifactError::Malformed {
            detail: "shape product overflows".into(),
        })?;
    let values = (0..cells)
        .map(|_| read_f32_le(r))
        .collect::<Result<Vec<_>, _>>()?;
    expect_end(r)?;
    Ok(DensityFrame {
        index,
        shape,
        values,
    })
}

/// Decode a `pi.bin` payload.
pub fn decode_coupling(mut bytes: &[u8]) -> Result<CouplingMatrix, ArtifactError> {
    let r: &mut dyn Read = &mut bytes;
    read_preamble(r, COUPLING_MAGIC)?;
    let rows = read_u32_le(r)?;
    let cols = read_u32_le(r)?;
    let cells = (rows as usize)
        .checked_mul(cols as usize)
        .ok_or_else(|| ArtifactError::Malformed {
            detail: "rows * cols overflows".into(),
        })?;
    let values = (0..cells)
        .map(|_| read_f64_le(r))
        .collect::<Result<Vec<_>, _>>()?;
    expect_end(r)?;
    Ok(CouplingMatrix { rows, cols, values })
}
