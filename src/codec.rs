//! A versioned binary codec for numeric arrays.
//!
//! Stored arrays must survive the byte round trip exactly, the `-1` no-data
//! sentinel included, and a store file must stay interpretable without any
//! runtime-registered conversion hook. The layout is a small plain header
//! (magic, version, dtype tag, rank, dims) followed by the flat payload in
//! row-major order, gzip-compressed at rest.

use crate::errors::SodarDataErr;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use ndarray::{Array, Array2, ArrayD, Dimension, IxDyn};
use std::io::{Read, Write};

const MAGIC: [u8; 2] = *b"SD";
const VERSION: u8 = 1;
const DTYPE_F64_LE: u8 = 1;

/// Encode an array into its storable binary representation.
pub fn encode<D>(array: &Array<f64, D>) -> Result<Vec<u8>, SodarDataErr>
where
    D: Dimension,
{
    let mut buf = Vec::with_capacity(5 + 4 * array.ndim());
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(DTYPE_F64_LE);
    buf.push(array.ndim() as u8);
    for &dim in array.shape() {
        buf.extend_from_slice(&(dim as u32).to_le_bytes());
    }

    let mut encoder = GzEncoder::new(buf, Compression::default());
    for &val in array.iter() {
        encoder.write_all(&val.to_le_bytes())?;
    }

    Ok(encoder.finish()?)
}

/// Decode bytes produced by [`encode`] back into an array.
///
/// Any byte layout that cannot be parsed into a rectangular array of a known
/// numeric type is a [`SodarDataErr::CorruptRecord`] error. No default or
/// zeroed array is ever substituted.
pub fn decode(bytes: &[u8]) -> Result<ArrayD<f64>, SodarDataErr> {
    if bytes.len() < 5 {
        return Err(corrupt("array blob shorter than its header"));
    }
    if bytes[0..2] != MAGIC {
        return Err(corrupt("array blob has the wrong magic bytes"));
    }
    if bytes[2] != VERSION {
        return Err(SodarDataErr::CorruptRecord(format!(
            "unsupported array codec version {}",
            bytes[2]
        )));
    }
    if bytes[3] != DTYPE_F64_LE {
        return Err(SodarDataErr::CorruptRecord(format!(
            "unknown array dtype tag {}",
            bytes[3]
        )));
    }

    let rank = bytes[4] as usize;
    let header_len = 5 + 4 * rank;
    if bytes.len() < header_len {
        return Err(corrupt("array blob truncated inside its dims"));
    }

    let mut dims = Vec::with_capacity(rank);
    for i in 0..rank {
        let start = 5 + 4 * i;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[start..(start + 4)]);
        dims.push(u32::from_le_bytes(raw) as usize);
    }

    let num_elements: usize = dims.iter().product();
    let mut payload = Vec::with_capacity(num_elements * 8);
    GzDecoder::new(&bytes[header_len..])
        .read_to_end(&mut payload)
        .map_err(|err| {
            SodarDataErr::CorruptRecord(format!("array payload does not inflate: {}", err))
        })?;

    if payload.len() != num_elements * 8 {
        return Err(SodarDataErr::CorruptRecord(format!(
            "array payload holds {} bytes but the shape {:?} requires {}",
            payload.len(),
            dims,
            num_elements * 8
        )));
    }

    let data: Vec<f64> = payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();

    ArrayD::from_shape_vec(IxDyn(&dims), data)
        .map_err(|err| SodarDataErr::CorruptRecord(format!("array shape rejected: {}", err)))
}

/// Decode bytes that must hold a two dimensional array.
pub fn decode_2d(bytes: &[u8]) -> Result<Array2<f64>, SodarDataErr> {
    decode(bytes)?
        .into_dimensionality()
        .map_err(|_| corrupt("stored array is not two dimensional"))
}

fn corrupt(msg: &str) -> SodarDataErr {
    SodarDataErr::CorruptRecord(msg.to_owned())
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
