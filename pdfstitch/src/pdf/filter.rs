//! Stream filters.
//!
//! Only what the parser needs to read cross-reference and object streams,
//! plus Flate encoding for the serializer's cross-reference stream.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tracing::warn;

use crate::pdf::error::DecodeError;
use crate::pdf::object::{Dictionary, PdfValue, Stream};

/// Undo every filter of a stream, outermost first.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>, DecodeError> {
    let filters = stream.filters();
    let params = decode_params(&stream.dict, filters.len());

    let mut data = stream.content.clone();
    for (filter, params) in filters.iter().zip(params) {
        data = match filter.as_slice() {
            b"FlateDecode" | b"Fl" => {
                let inflated = flate_decode(&data)?;
                match params {
                    Some(params) => apply_predictor(inflated, params)?,
                    None => inflated,
                }
            }
            b"ASCIIHexDecode" | b"AHx" => ascii_hex_decode(&data)?,
            b"ASCII85Decode" | b"A85" => ascii85_decode(&data)?,
            other => {
                return Err(DecodeError::UnsupportedFilter(
                    String::from_utf8_lossy(other).into_owned(),
                ));
            }
        };
    }

    Ok(data)
}

/// `/DecodeParms` aligned with the filter list.
fn decode_params(dict: &Dictionary, count: usize) -> Vec<Option<&Dictionary>> {
    match dict.get(b"DecodeParms") {
        Some(PdfValue::Dictionary(params)) => {
            let mut aligned = vec![None; count];
            if let Some(first) = aligned.first_mut() {
                *first = Some(params);
            }
            aligned
        }
        Some(PdfValue::Array(items)) => (0..count)
            .map(|i| items.get(i).and_then(|item| item.as_dict()))
            .collect(),
        _ => vec![None; count],
    }
}

/// Inflate zlib data.
///
/// Some producers truncate the trailing checksum; whatever inflated cleanly
/// before the error is kept.
pub fn flate_decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(err) if !out.is_empty() => {
            warn!("Flate stream ended early after {} bytes: {}", out.len(), err);
            Ok(out)
        }
        Err(err) => Err(DecodeError::Corrupt {
            filter: "FlateDecode",
            reason: err.to_string(),
        }),
    }
}

/// Deflate data with zlib framing.
pub fn flate_encode(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn param(params: &Dictionary, key: &[u8], default: i64) -> i64 {
    params.get(key).and_then(PdfValue::as_i64).unwrap_or(default)
}

fn predictor_error(reason: String) -> DecodeError {
    DecodeError::Corrupt {
        filter: "FlateDecode",
        reason,
    }
}

/// A positive `/DecodeParms` entry as `usize`.
fn size_param(params: &Dictionary, key: &[u8], default: i64) -> Result<usize, DecodeError> {
    let value = param(params, key, default);
    usize::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| {
            predictor_error(format!(
                "/{} {value} is out of range",
                String::from_utf8_lossy(key)
            ))
        })
}

fn apply_predictor(data: Vec<u8>, params: &Dictionary) -> Result<Vec<u8>, DecodeError> {
    let predictor = param(params, b"Predictor", 1);
    if predictor == 1 || data.is_empty() {
        return Ok(data);
    }
    if predictor != 2 && !(10..=15).contains(&predictor) {
        return Err(DecodeError::UnsupportedPredictor(predictor));
    }

    let colors = size_param(params, b"Colors", 1)?;
    let bits = size_param(params, b"BitsPerComponent", 8)?;
    let columns = size_param(params, b"Columns", 1)?;

    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(predictor_error(format!("/BitsPerComponent {bits} is invalid")));
    }

    let overflow = || {
        predictor_error(format!(
            "row of {columns} columns x {colors} colors x {bits} bits overflows"
        ))
    };
    let bits_per_pixel = colors.checked_mul(bits).ok_or_else(overflow)?;
    let row_len = bits_per_pixel
        .checked_mul(columns)
        .ok_or_else(overflow)?
        .div_ceil(8);
    if row_len > data.len() {
        return Err(predictor_error(format!(
            "predictor row of {row_len} bytes exceeds the {}-byte stream",
            data.len()
        )));
    }
    let bytes_per_pixel = bits_per_pixel.div_ceil(8);

    match predictor {
        2 if bits == 8 => Ok(tiff_undo(data, row_len, bytes_per_pixel)),
        2 => Err(DecodeError::UnsupportedPredictor(predictor)),
        _ => png_undo(&data, row_len, bytes_per_pixel),
    }
}

fn tiff_undo(mut data: Vec<u8>, row_len: usize, bpp: usize) -> Vec<u8> {
    for row in data.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    data
}

fn png_undo(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&kind, encoded) = chunk.split_first().ok_or_else(|| DecodeError::Corrupt {
            filter: "FlateDecode",
            reason: "empty predictor row".to_string(),
        })?;

        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };

            row[i] = match kind {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(DecodeError::Corrupt {
                        filter: "FlateDecode",
                        reason: format!("unknown PNG row filter {other}"),
                    });
                }
            };
        }

        out.extend_from_slice(&row);
        previous = row;
    }

    Ok(out)
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let estimate = i16::from(left) + i16::from(up) - i16::from(up_left);
    let distance_left = (estimate - i16::from(left)).abs();
    let distance_up = (estimate - i16::from(up)).abs();
    let distance_up_left = (estimate - i16::from(up_left)).abs();

    if distance_left <= distance_up && distance_left <= distance_up_left {
        left
    } else if distance_up <= distance_up_left {
        up
    } else {
        up_left
    }
}

fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }
        let nibble = hex_value(byte).ok_or_else(|| DecodeError::Corrupt {
            filter: "ASCIIHexDecode",
            reason: format!("invalid hex digit 0x{byte:02x}"),
        })?;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    if let Some(h) = high {
        out.push(h << 4);
    }

    Ok(out)
}

pub(crate) fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let corrupt = |reason: &str| DecodeError::Corrupt {
        filter: "ASCII85Decode",
        reason: reason.to_string(),
    };

    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut filled = 0;

    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &byte in body {
        match byte {
            b'~' => break,
            b'z' if filled == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = byte - b'!';
                filled += 1;
                if filled == 5 {
                    out.extend_from_slice(&base85_word(&group).to_be_bytes());
                    filled = 0;
                }
            }
            _ if byte.is_ascii_whitespace() => {}
            _ => return Err(corrupt("byte outside the base-85 alphabet")),
        }
    }

    if filled == 1 {
        return Err(corrupt("dangling single character in final group"));
    }
    if filled > 1 {
        for slot in group.iter_mut().skip(filled) {
            *slot = 84;
        }
        let word = base85_word(&group).to_be_bytes();
        out.extend_from_slice(&word[..filled - 1]);
    }

    Ok(out)
}

fn base85_word(group: &[u8; 5]) -> u32 {
    group
        .iter()
        .fold(0u32, |acc, &digit| acc.wrapping_mul(85).wrapping_add(u32::from(digit)))
}
