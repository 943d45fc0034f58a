//! Radiance HDR (RGBE) input.
//!
//! Supports flat and RLE scanlines. The raster is decoded once, on the first
//! pixel request, and served from memory afterwards. Native format is
//! 3-channel `Float`.
//!
//! Open checks the file holds at least the smallest raster the header allows
//! (every byte for flat data, one maximal run per channel chunk for RLE), so
//! truncated files and absurd resolutions fail there and not on read.

use crate::detect::{is_hdr, read_header as sniff};
use crate::plugin::{Feature, ImageInputPlugin};
use crate::registry::PluginInfo;
use crate::{IoError, IoResult};
use byteorder::{ByteOrder, NativeEndian};
use imgin_core::buffer::zeroed;
use imgin_core::{BaseType, ImageSpec};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::debug;

const HDR_MAGIC: &str = "#?";

/// Format name.
pub const FORMAT_NAME: &str = "hdr";

/// Registry entry.
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: FORMAT_NAME,
        extensions: &["hdr", "rgbe", "pic"],
        create: || -> Box<dyn ImageInputPlugin> { Box::new(HdrInput::new()) },
        valid_file,
    }
}

/// Checks the `#?` magic.
pub fn valid_file(path: &Path) -> bool {
    is_hdr(&sniff(path, 2))
}

struct Session {
    path: PathBuf,
    data_offset: u64,
    width: usize,
    height: usize,
    pixels: Option<Vec<f32>>,
}

impl Session {
    fn pixels(&mut self) -> IoResult<&[f32]> {
        if self.pixels.is_none() {
            let mut reader = BufReader::new(File::open(&self.path)?);
            reader.seek(std::io::SeekFrom::Start(self.data_offset))?;
            debug!(width = self.width, height = self.height, "decoding hdr raster");
            self.pixels = Some(read_pixels(&mut reader, self.width, self.height)?);
        }
        Ok(self.pixels.as_deref().unwrap_or_default())
    }
}

/// Radiance HDR codec plugin.
#[derive(Default)]
pub struct HdrInput {
    session: Option<Session>,
}

impl HdrInput {
    /// Creates a closed plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageInputPlugin for HdrInput {
    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn valid_file(&self, path: &Path) -> bool {
        valid_file(path)
    }

    fn supports(&self, _feature: Feature) -> bool {
        false
    }

    fn open(&mut self, path: &Path) -> IoResult<ImageSpec> {
        self.session = None;
        let mut reader = BufReader::new(File::open(path)?);
        let spec = read_header(&mut reader)?;
        let data_offset = reader.stream_position()?;
        let available = reader.get_ref().metadata()?.len().saturating_sub(data_offset);

        let mut first = [0u8; 4];
        reader
            .read_exact(&mut first)
            .map_err(|_| IoError::InvalidFile("HDR raster missing".into()))?;
        let needed = min_raster_bytes(spec.width as usize, spec.height as usize, first);
        if available < needed {
            return Err(IoError::InvalidFile(format!(
                "HDR raster truncated: {}x{} needs at least {needed} bytes, file has {available}",
                spec.width, spec.height
            )));
        }

        self.session = Some(Session {
            path: path.to_path_buf(),
            data_offset,
            width: spec.width as usize,
            height: spec.height as usize,
            pixels: None,
        });
        Ok(spec)
    }

    fn close(&mut self) -> IoResult<()> {
        self.session = None;
        Ok(())
    }

    fn current_subimage(&self) -> usize {
        0
    }

    fn current_miplevel(&self) -> usize {
        0
    }

    fn seek_subimage(&mut self, subimage: usize, miplevel: usize) -> IoResult<ImageSpec> {
        Err(IoError::SeekFailed(format!(
            "hdr holds a single image, no subimage {subimage} level {miplevel}"
        )))
    }

    fn read_native_scanline(&mut self, y: u32, _z: u32, data: &mut [u8]) -> IoResult<()> {
        let s = self.session.as_mut().ok_or(IoError::NotOpen)?;
        let row = s.width * 3;
        let start = y as usize * row;
        let pixels = s.pixels()?;
        let src = pixels
            .get(start..start + row)
            .ok_or_else(|| IoError::DecodeError(format!("scanline {y} not decoded")))?;
        NativeEndian::write_f32_into(src, &mut data[..row * 4]);
        Ok(())
    }
}

fn read_header<R: BufRead>(reader: &mut R) -> IoResult<ImageSpec> {
    let mut attrs = Vec::new();
    let mut line = String::new();

    reader.read_line(&mut line)?;
    let magic_line = trim_line(&line);
    if !magic_line.starts_with(HDR_MAGIC) {
        return Err(IoError::InvalidFile("HDR magic not found".into()));
    }
    let format_id = magic_line.trim_start_matches(HDR_MAGIC);
    if !format_id.is_empty() {
        attrs.push(("FormatIdentifier".to_string(), format_id.to_string()));
    }

    let mut resolution = None;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = trim_line(&line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('+') || line.starts_with('-') {
            resolution = Some(
                parse_resolution(line)
                    .ok_or_else(|| IoError::InvalidFile("Invalid HDR resolution line".into()))?,
            );
            break;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = match key.trim().to_uppercase().as_str() {
                "FORMAT" => "Format".to_string(),
                "EXPOSURE" => "Exposure".to_string(),
                "GAMMA" => "Gamma".to_string(),
                "PIXASPECT" => "PixelAspectRatio".to_string(),
                "SOFTWARE" => "Software".to_string(),
                "PRIMARIES" => "Primaries".to_string(),
                "VIEW" => "View".to_string(),
                other => format!("hdr:{other}"),
            };
            attrs.push((key, value.trim().to_string()));
        }
    }

    let (width, height) =
        resolution.ok_or_else(|| IoError::InvalidFile("Missing HDR resolution".into()))?;
    let mut spec = ImageSpec::new(width, height, 3, BaseType::Float);
    for (key, value) in attrs {
        match value.parse::<f32>() {
            Ok(v) if key != "Format" => spec.set_attr(key, v),
            _ => spec.set_attr(key, value),
        }
    }
    Ok(spec)
}

fn read_pixels<R: Read>(reader: &mut R, width: usize, height: usize) -> IoResult<Vec<f32>> {
    let mut first = [0u8; 4];
    reader.read_exact(&mut first)?;

    let row = width * 4;
    let total = row
        .checked_mul(height)
        .ok_or_else(|| IoError::InvalidFile("HDR raster too large".into()))?;
    let mut rgbe = zeroed::<u8>(total)?;

    if is_rle(width, first) {
        let mut header = first;
        for y in 0..height {
            if y > 0 {
                reader.read_exact(&mut header)?;
            }
            decode_rle_scanline(reader, width, &mut rgbe[y * row..(y + 1) * row], header)?;
        }
    } else {
        rgbe[0..4].copy_from_slice(&first);
        reader.read_exact(&mut rgbe[4..])?;
    }

    let mut data = zeroed::<f32>(total / 4 * 3)?;
    for (px, chunk) in data.chunks_exact_mut(3).zip(rgbe.chunks_exact(4)) {
        let (r, g, b) = rgbe_to_f32(chunk[0], chunk[1], chunk[2], chunk[3]);
        px.copy_from_slice(&[r, g, b]);
    }
    Ok(data)
}

/// Whether a raster starting with `first` uses new-style RLE scanlines.
fn is_rle(width: usize, first: [u8; 4]) -> bool {
    (8..=0x7fff).contains(&width)
        && first[0] == 2
        && first[1] == 2
        && ((first[2] as usize) << 8 | first[3] as usize) == width
}

/// Smallest byte count a valid raster of this size can occupy.
fn min_raster_bytes(width: usize, height: usize, first: [u8; 4]) -> u64 {
    let (width, height) = (width as u64, height as u64);
    let per_row = if is_rle(width as usize, first) {
        // scanline header, then runs of at most 127 repeated bytes per channel
        4 + 4 * 2 * width.div_ceil(127)
    } else {
        width.saturating_mul(4)
    };
    per_row.saturating_mul(height)
}

fn decode_rle_scanline<R: Read>(
    reader: &mut R,
    width: usize,
    out: &mut [u8],
    header: [u8; 4],
) -> IoResult<()> {
    if header[0] != 2 || header[1] != 2 {
        return Err(IoError::InvalidFile("HDR RLE header invalid".into()));
    }
    let encoded_width = ((header[2] as usize) << 8) | (header[3] as usize);
    if encoded_width != width {
        return Err(IoError::InvalidFile("HDR RLE width mismatch".into()));
    }

    let mut channel = vec![0u8; width];
    for c in 0..4 {
        let mut idx = 0usize;
        while idx < width {
            let mut count = [0u8; 1];
            reader.read_exact(&mut count)?;
            let (run, repeat) = match count[0] as usize {
                0 => return Err(IoError::InvalidFile("HDR RLE zero-length run".into())),
                n if n > 128 => (n - 128, true),
                n => (n, false),
            };
            if idx + run > width {
                return Err(IoError::InvalidFile("HDR RLE run overflows scanline".into()));
            }
            if repeat {
                let mut value = [0u8; 1];
                reader.read_exact(&mut value)?;
                channel[idx..idx + run].fill(value[0]);
            } else {
                reader.read_exact(&mut channel[idx..idx + run])?;
            }
            idx += run;
        }

        for (x, &v) in channel.iter().enumerate() {
            out[x * 4 + c] = v;
        }
    }
    Ok(())
}

fn rgbe_to_f32(r: u8, g: u8, b: u8, e: u8) -> (f32, f32, f32) {
    if e == 0 {
        return (0.0, 0.0, 0.0);
    }
    let f = 2.0_f32.powi(e as i32 - 136);
    (r as f32 * f, g as f32 * f, b as f32 * f)
}

fn parse_resolution(line: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 4 {
        return None;
    }

    let mut width = 0u32;
    let mut height = 0u32;
    for pair in parts.chunks_exact(2) {
        let value: u32 = pair[1].parse().ok()?;
        if pair[0].ends_with('X') {
            width = value;
        } else if pair[0].ends_with('Y') {
            height = value;
        }
    }

    (width > 0 && height > 0).then_some((width, height))
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}
