use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::media::SourceFile;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("not an ISO media file")]
    NotIsoMedia,

    #[error("missing '{0}' box")]
    MissingBox(&'static str),

    #[error("truncated '{0}' box")]
    Truncated(String),

    #[error("zero timescale in movie header")]
    ZeroTimescale,
}

/// Reads playback metadata from a selected file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn video_duration(&self, file: &SourceFile) -> Result<Duration, ProbeError>;
}

/// Duration probe for MP4/QuickTime containers, read from `moov/mvhd`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4Probe;

#[async_trait]
impl MediaProbe for Mp4Probe {
    async fn video_duration(&self, file: &SourceFile) -> Result<Duration, ProbeError> {
        let duration = mp4_duration(file.bytes())?;
        log::debug!("Probed {}: {:?}", file.name(), duration);
        Ok(duration)
    }
}

struct BoxHeader<'a> {
    kind: &'a [u8],
    body: &'a [u8],
}

fn box_name(kind: &[u8]) -> String {
    String::from_utf8_lossy(kind).to_string()
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    data.get(at..at + 8).map(|b| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        u64::from_be_bytes(buf)
    })
}

/// Splits `data` into its sibling boxes. A size of 0 runs to the end of `data`,
/// a size of 1 means a 64-bit size follows the type.
fn boxes(data: &[u8]) -> Result<Vec<BoxHeader<'_>>, ProbeError> {
    let mut found = Vec::new();
    let mut offset = 0usize;

    while offset + 8 <= data.len() {
        let size32 = read_u32(data, offset).unwrap_or(0) as u64;
        let kind = &data[offset + 4..offset + 8];

        let (header_len, size) = match size32 {
            0 => (8usize, (data.len() - offset) as u64),
            1 => {
                let large = read_u64(data, offset + 8)
                    .ok_or_else(|| ProbeError::Truncated(box_name(kind)))?;
                (16usize, large)
            }
            n => (8usize, n),
        };

        if size < header_len as u64 || offset as u64 + size > data.len() as u64 {
            return Err(ProbeError::Truncated(box_name(kind)));
        }

        let end = offset + size as usize;
        found.push(BoxHeader {
            kind,
            body: &data[offset + header_len..end],
        });
        offset = end;
    }

    Ok(found)
}

pub fn mp4_duration(data: &[u8]) -> Result<Duration, ProbeError> {
    let top = boxes(data)?;
    if top.is_empty() || !top.iter().any(|b| matches!(b.kind, b"ftyp" | b"moov")) {
        return Err(ProbeError::NotIsoMedia);
    }

    let moov = top
        .iter()
        .find(|b| b.kind == b"moov")
        .ok_or(ProbeError::MissingBox("moov"))?;

    let children = boxes(moov.body)?;
    let mvhd = children
        .iter()
        .find(|b| b.kind == b"mvhd")
        .ok_or(ProbeError::MissingBox("mvhd"))?;

    let body = mvhd.body;
    let truncated = || ProbeError::Truncated("mvhd".to_string());
    let version = *body.first().ok_or_else(truncated)?;

    // version(1) + flags(3), then creation/modification times
    let (timescale, duration) = if version == 1 {
        let timescale = read_u32(body, 20).ok_or_else(truncated)?;
        let duration = read_u64(body, 24).ok_or_else(truncated)?;
        (timescale, duration)
    } else {
        let timescale = read_u32(body, 12).ok_or_else(truncated)?;
        let duration = read_u32(body, 16).ok_or_else(truncated)? as u64;
        (timescale, duration)
    };

    if timescale == 0 {
        return Err(ProbeError::ZeroTimescale);
    }

    let millis = duration.saturating_mul(1000) / timescale as u64;
    Ok(Duration::from_millis(millis))
}
