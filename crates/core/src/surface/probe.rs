//! Natural video size read straight from container headers.

use super::Dimensions;
use crate::{AsciiscopeError, Result};

/// Containers nest a handful of levels at most; anything deeper is garbage.
const MAX_NESTING: usize = 8;

const EBML_MAGIC: [u8; 4] = [0x1a, 0x45, 0xdf, 0xa3];

const SEGMENT: u64 = 0x1853_8067;
const TRACKS: u64 = 0x1654_ae6b;
const TRACK_ENTRY: u64 = 0xae;
const VIDEO: u64 = 0xe0;
const PIXEL_WIDTH: u64 = 0xb0;
const PIXEL_HEIGHT: u64 = 0xba;

/// Reads natural video dimensions from container bytes.
pub trait VideoProbe: Send + Sync {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions>;
}

fn not_found() -> AsciiscopeError {
    AsciiscopeError::msg("no video track dimensions found in container")
}

/// Picks the container reader from the leading magic: EBML for Matroska and
/// WebM, ISO base media otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerProbe;

impl VideoProbe for ContainerProbe {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions> {
        if bytes.starts_with(&EBML_MAGIC) {
            MatroskaProbe.probe(bytes)
        } else {
            IsoBmffProbe.probe(bytes)
        }
    }
}

/// Probe for ISO base media files (`.mp4`, `.mov`): first track header with a
/// non-zero presentation size.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsoBmffProbe;

impl VideoProbe for IsoBmffProbe {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions> {
        track_dimensions(bytes, 0).ok_or_else(not_found)
    }
}

fn track_dimensions(mut data: &[u8], depth: usize) -> Option<Dimensions> {
    if depth > MAX_NESTING {
        return None;
    }
    while data.len() >= 8 {
        let declared = u64::from(read_be_u32(data, 0)?);
        let (header, size) = match declared {
            0 => (8, data.len() as u64),
            1 => (16, read_be_u64(data, 8)?),
            size => (8, size),
        };
        if size < header as u64 || size > data.len() as u64 {
            return None;
        }
        let body = &data[header..size as usize];
        let found = match &data[4..8] {
            b"moov" | b"trak" => track_dimensions(body, depth + 1),
            b"tkhd" => track_header_dimensions(body),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
        data = &data[size as usize..];
    }
    None
}

fn track_header_dimensions(body: &[u8]) -> Option<Dimensions> {
    // version/flags, then times and ids whose width depends on the version,
    // then reserved(8) layer(2) group(2) volume(2) reserved(2) matrix(36).
    let timing = if *body.first()? == 1 { 32 } else { 20 };
    let offset = 4 + timing + 52;
    let width = read_be_u32(body, offset)? >> 16;
    let height = read_be_u32(body, offset + 4)? >> 16;
    let dimensions = Dimensions::new(width, height);
    (!dimensions.is_empty()).then_some(dimensions)
}

fn read_be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

fn read_be_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

/// Probe for Matroska and WebM: `PixelWidth`/`PixelHeight` of the first
/// `Segment/Tracks/TrackEntry/Video` element that carries both.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatroskaProbe;

impl VideoProbe for MatroskaProbe {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions> {
        if !bytes.starts_with(&EBML_MAGIC) {
            return Err(AsciiscopeError::InvalidInput("missing EBML header"));
        }
        ebml_dimensions(bytes, 0).ok_or_else(not_found)
    }
}

/// Variable-length integer. IDs keep their length marker, sizes drop it.
fn read_vint(data: &[u8], keep_marker: bool) -> Option<(u64, usize)> {
    let first = *data.first()?;
    let len = first.leading_zeros() as usize + 1;
    if len > 8 {
        return None;
    }
    let bytes = data.get(..len)?;
    let lead = if keep_marker {
        u64::from(first)
    } else {
        u64::from(first) & (0xff_u64 >> len)
    };
    let value = bytes[1..]
        .iter()
        .fold(lead, |value, &byte| (value << 8) | u64::from(byte));
    Some((value, len))
}

/// Splits the next element off `data`: `(id, body, rest)`. An unknown size
/// (all value bits set) runs to the end of `data`.
fn next_element(data: &[u8]) -> Option<(u64, &[u8], &[u8])> {
    let (id, id_len) = read_vint(data, true)?;
    let (size, size_len) = read_vint(&data[id_len..], false)?;
    let start = id_len + size_len;
    let end = if size == (1_u64 << (7 * size_len)) - 1 {
        data.len()
    } else {
        start.checked_add(usize::try_from(size).ok()?)?
    };
    let body = data.get(start..end)?;
    Some((id, body, &data[end..]))
}

fn ebml_dimensions(mut data: &[u8], depth: usize) -> Option<Dimensions> {
    if depth > MAX_NESTING {
        return None;
    }
    while !data.is_empty() {
        let (id, body, rest) = next_element(data)?;
        let found = match id {
            SEGMENT | TRACKS | TRACK_ENTRY => ebml_dimensions(body, depth + 1),
            VIDEO => video_dimensions(body),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
        data = rest;
    }
    None
}

fn video_dimensions(mut data: &[u8]) -> Option<Dimensions> {
    let (mut width, mut height) = (0, 0);
    while !data.is_empty() {
        let (id, body, rest) = next_element(data)?;
        match id {
            PIXEL_WIDTH => width = read_uint(body)?,
            PIXEL_HEIGHT => height = read_uint(body)?,
            _ => {}
        }
        data = rest;
    }
    let dimensions = Dimensions::new(width, height);
    (!dimensions.is_empty()).then_some(dimensions)
}

fn read_uint(bytes: &[u8]) -> Option<u32> {
    if bytes.len() > 8 {
        return None;
    }
    let value = bytes
        .iter()
        .fold(0_u64, |value, &byte| (value << 8) | u64::from(byte));
    u32::try_from(value).ok()
}

#[cfg(test)]
pub(crate) mod fixtures {
    fn boxed(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    fn tkhd(width: u32, height: u32) -> Vec<u8> {
        let mut body = vec![0u8; 76];
        body.extend_from_slice(&(width << 16).to_be_bytes());
        body.extend_from_slice(&(height << 16).to_be_bytes());
        boxed(b"tkhd", &body)
    }

    /// `ftyp` + `moov` with an audio-like track (zero size) before the video
    /// track.
    pub fn mp4_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut tracks = boxed(b"trak", &tkhd(0, 0));
        tracks.extend(boxed(b"trak", &tkhd(width, height)));
        let mut file = boxed(b"ftyp", b"isom\0\0\0\0");
        file.extend(boxed(b"moov", &tracks));
        file
    }

    /// EBML element with an eight-byte size field.
    pub fn element(id: &[u8], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.push(0x01);
        out.extend_from_slice(&(body.len() as u64).to_be_bytes()[1..]);
        out.extend_from_slice(body);
        out
    }

    /// WebM header, segment info, an audio track and then the video track.
    pub fn webm_tracks(width: u16, height: u16) -> Vec<u8> {
        let audio = element(&[0xae], &element(&[0x83], &[2]));
        let mut video_fields = element(&[0xb0], &width.to_be_bytes());
        video_fields.extend(element(&[0xba], &height.to_be_bytes()));
        let mut video = element(&[0x83], &[1]);
        video.extend(element(&[0xe0], &video_fields));

        let mut tracks = audio;
        tracks.extend(element(&[0xae], &video));
        let mut segment = element(&[0x15, 0x49, 0xa9, 0x66], &[]);
        segment.extend(element(&[0x16, 0x54, 0xae, 0x6b], &tracks));
        segment
    }

    pub fn webm_bytes(width: u16, height: u16) -> Vec<u8> {
        let mut file = element(&[0x1a, 0x45, 0xdf, 0xa3], &element(&[0x42, 0x82], b"webm"));
        file.extend(element(&[0x18, 0x53, 0x80, 0x67], &webm_tracks(width, height)));
        file
    }
}
