//! Binary PNM input: PGM (`P5`), PPM (`P6`) and PFM (`Pf`, `PF`).
//!
//! # Layout
//!
//! ```text
//! P6\n
//! # optional comments
//! 64 32\n
//! 255\n            <- exactly one whitespace byte before the raster
//! <raster>         <- rows top to bottom, big-endian if maxval > 255
//! [P6 ...]         <- further images are subimages
//! ```
//!
//! PFM stores `f32` rows bottom to top; a negative scale means
//! little-endian samples.
//!
//! # Subimages
//!
//! Images are concatenated back to back, so image `n` can only be found by
//! walking the headers of images `0..n`. Seeking backwards rewinds to the
//! first image and walks forward again.
//!
//! # Example
//!
//! ```rust,no_run
//! use imgin_io::ImageInput;
//!
//! let mut input = ImageInput::open("frames.ppm")?;
//! while input.seek_subimage(input.current_subimage() as i32 + 1, None) {}
//! println!("{} frames", input.current_subimage() + 1);
//! # Ok::<(), imgin_io::IoError>(())
//! ```

use crate::detect::{is_pnm, read_header};
use crate::plugin::{Feature, ImageInputPlugin};
use crate::registry::PluginInfo;
use crate::{IoError, IoResult};
use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use imgin_core::{BaseType, ImageSpec};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Format name.
pub const FORMAT_NAME: &str = "pnm";

/// Registry entry.
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: FORMAT_NAME,
        extensions: &["pnm", "pgm", "ppm", "pfm"],
        create: create_plugin,
        valid_file,
    }
}

fn create_plugin() -> Box<dyn ImageInputPlugin> {
    Box::new(PnmInput::new())
}

/// Checks the two-byte magic plus separator.
pub fn valid_file(path: &Path) -> bool {
    is_pnm(&read_header(path, 3))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Gray,
    Rgb,
    FloatGray,
    FloatRgb,
}

impl Kind {
    fn from_magic(m: u8) -> Option<Self> {
        match m {
            b'5' => Some(Self::Gray),
            b'6' => Some(Self::Rgb),
            b'f' => Some(Self::FloatGray),
            b'F' => Some(Self::FloatRgb),
            _ => None,
        }
    }

    fn channels(self) -> u32 {
        match self {
            Self::Gray | Self::FloatGray => 1,
            Self::Rgb | Self::FloatRgb => 3,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Self::FloatGray | Self::FloatRgb)
    }
}

/// One parsed image header.
#[derive(Debug, Clone)]
struct Frame {
    kind: Kind,
    width: u32,
    height: u32,
    /// Integer maxval, 0 for PFM.
    maxval: u32,
    /// PFM scale; negative means little-endian.
    scale: f32,
    /// Offset of the first raster byte.
    data_offset: u64,
}

impl Frame {
    fn sample_bytes(&self) -> usize {
        if self.kind.is_float() {
            4
        } else if self.maxval > 255 {
            2
        } else {
            1
        }
    }

    fn row_bytes(&self) -> IoResult<usize> {
        (self.width as usize)
            .checked_mul(self.kind.channels() as usize)
            .and_then(|n| n.checked_mul(self.sample_bytes()))
            .ok_or_else(|| IoError::InvalidFile(format!("row of width {} too large", self.width)))
    }

    fn body_bytes(&self) -> IoResult<u64> {
        (self.row_bytes()? as u64)
            .checked_mul(u64::from(self.height))
            .ok_or_else(|| IoError::InvalidFile("raster size overflows".into()))
    }

    fn end_offset(&self) -> IoResult<u64> {
        self.data_offset
            .checked_add(self.body_bytes()?)
            .ok_or_else(|| IoError::InvalidFile("raster size overflows".into()))
    }

    fn format(&self) -> BaseType {
        match self.sample_bytes() {
            4 => BaseType::Float,
            2 => BaseType::UInt16,
            _ => BaseType::UInt8,
        }
    }

    fn spec(&self) -> ImageSpec {
        let mut spec = ImageSpec::new(self.width, self.height, self.kind.channels(), self.format());
        spec.set_attr("BitsPerSample", (self.sample_bytes() * 8) as u32);
        if self.kind.is_float() {
            spec.set_attr("pnm:scale", self.scale.abs());
        } else {
            spec.set_attr("pnm:maxval", self.maxval);
        }
        spec
    }
}

struct Session {
    reader: BufReader<File>,
    file_len: u64,
    frame: Frame,
    subimage: usize,
    raw: Vec<u8>,
}

/// PNM codec plugin.
#[derive(Default)]
pub struct PnmInput {
    session: Option<Session>,
}

impl PnmInput {
    /// Creates a closed plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageInputPlugin for PnmInput {
    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn valid_file(&self, path: &Path) -> bool {
        valid_file(path)
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(feature, Feature::MultiImage)
    }

    fn open(&mut self, path: &Path) -> IoResult<ImageSpec> {
        self.session = None;
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let frame = parse_frame(&mut reader, false)?
            .ok_or_else(|| IoError::InvalidFile("empty file".into()))?;
        check_complete(&frame, file_len)?;

        debug!(
            width = frame.width,
            height = frame.height,
            kind = ?frame.kind,
            "pnm header"
        );
        let spec = frame.spec();
        self.session = Some(Session {
            reader,
            file_len,
            raw: Vec::new(),
            frame,
            subimage: 0,
        });
        Ok(spec)
    }

    fn close(&mut self) -> IoResult<()> {
        self.session = None;
        Ok(())
    }

    fn current_subimage(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.subimage)
    }

    fn current_miplevel(&self) -> usize {
        0
    }

    fn seek_subimage(&mut self, subimage: usize, miplevel: usize) -> IoResult<ImageSpec> {
        let s = self.session.as_mut().ok_or(IoError::NotOpen)?;
        if miplevel != 0 {
            return Err(IoError::SeekFailed(format!("pnm has no MIP level {miplevel}")));
        }
        if subimage == s.subimage {
            return Ok(s.frame.spec());
        }

        // walk from the current image, or replay from the first one
        let (mut index, mut frame) = if subimage > s.subimage {
            (s.subimage, s.frame.clone())
        } else {
            debug!(from = s.subimage, to = subimage, "pnm rewinding to replay subimages");
            s.reader.seek(SeekFrom::Start(0))?;
            let first = parse_frame(&mut s.reader, false)?
                .ok_or_else(|| IoError::SeekFailed("file no longer holds an image".into()))?;
            (0, first)
        };
        while index < subimage {
            s.reader.seek(SeekFrom::Start(frame.end_offset()?))?;
            frame = parse_frame(&mut s.reader, true)?.ok_or_else(|| {
                IoError::SeekFailed(format!("subimage {subimage} out of range ({} images)", index + 1))
            })?;
            check_complete(&frame, s.file_len)?;
            index += 1;
            trace!(index, "pnm walked header");
        }

        s.frame = frame;
        s.subimage = subimage;
        Ok(s.frame.spec())
    }

    fn read_native_scanline(&mut self, y: u32, _z: u32, data: &mut [u8]) -> IoResult<()> {
        let s = self.session.as_mut().ok_or(IoError::NotOpen)?;
        let frame = &s.frame;
        let row_bytes = frame.row_bytes()?;
        let row = if frame.kind.is_float() {
            frame.height - 1 - y
        } else {
            y
        };
        let offset = frame.data_offset + row as u64 * row_bytes as u64;

        s.raw.resize(row_bytes, 0);
        s.reader.seek(SeekFrom::Start(offset))?;
        s.reader.read_exact(&mut s.raw)?;

        let data = data
            .get_mut(..row_bytes)
            .ok_or_else(|| IoError::DecodeError("scanline buffer too small".into()))?;
        match frame.sample_bytes() {
            4 => {
                let mut vals = vec![0f32; row_bytes / 4];
                if frame.scale < 0.0 {
                    LittleEndian::read_f32_into(&s.raw, &mut vals);
                } else {
                    BigEndian::read_f32_into(&s.raw, &mut vals);
                }
                NativeEndian::write_f32_into(&vals, data);
            }
            2 => {
                let mut vals = vec![0u16; row_bytes / 2];
                BigEndian::read_u16_into(&s.raw, &mut vals);
                if frame.maxval != 65535 {
                    for v in &mut vals {
                        *v = rescale(u32::from(*v), frame.maxval, 65535) as u16;
                    }
                }
                NativeEndian::write_u16_into(&vals, data);
            }
            _ => {
                if frame.maxval == 255 {
                    data.copy_from_slice(&s.raw);
                } else {
                    for (d, &v) in data.iter_mut().zip(&s.raw) {
                        *d = rescale(u32::from(v), frame.maxval, 255) as u8;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Maps `0..=maxval` onto `0..=full`, clamping out-of-range samples.
fn rescale(v: u32, maxval: u32, full: u32) -> u32 {
    let v = v.min(maxval);
    (v * full + maxval / 2) / maxval
}

fn check_complete(frame: &Frame, file_len: u64) -> IoResult<()> {
    let end = frame.end_offset()?;
    if end > file_len {
        return Err(IoError::InvalidFile(format!(
            "truncated raster: need {} bytes, file has {}",
            end,
            file_len
        )));
    }
    Ok(())
}

/// Parses a header at the reader position.
///
/// Returns `Ok(None)` at end of file. With `skip_leading`, whitespace before
/// the magic is tolerated, as found between concatenated images.
fn parse_frame<R: BufRead + Seek>(r: &mut R, skip_leading: bool) -> IoResult<Option<Frame>> {
    let Some(mut first) = next_byte(r)? else {
        return Ok(None);
    };
    if skip_leading {
        while first.is_ascii_whitespace() {
            match next_byte(r)? {
                Some(b) => first = b,
                None => return Ok(None),
            }
        }
    }
    let second = next_byte(r)?.ok_or_else(|| IoError::InvalidFile("truncated magic".into()))?;
    let kind = (first == b'P')
        .then(|| Kind::from_magic(second))
        .flatten()
        .ok_or_else(|| IoError::InvalidFile(format!("bad magic {:?}", [first as char, second as char])))?;

    let width = parse_u32(&next_token(r)?, "width")?;
    let height = parse_u32(&next_token(r)?, "height")?;
    if width == 0 || height == 0 {
        return Err(IoError::InvalidFile(format!("invalid size {width}x{height}")));
    }

    let (maxval, scale) = if kind.is_float() {
        let tok = next_token(r)?;
        let scale: f32 = tok
            .parse()
            .map_err(|_| IoError::InvalidFile(format!("invalid scale '{tok}'")))?;
        if scale == 0.0 || !scale.is_finite() {
            return Err(IoError::InvalidFile(format!("invalid scale {scale}")));
        }
        (0, scale)
    } else {
        let maxval = parse_u32(&next_token(r)?, "maxval")?;
        if maxval == 0 || maxval > 65535 {
            return Err(IoError::InvalidFile(format!("invalid maxval {maxval}")));
        }
        (maxval, 1.0)
    };

    let data_offset = r.stream_position()?;
    Ok(Some(Frame {
        kind,
        width,
        height,
        maxval,
        scale,
        data_offset,
    }))
}

fn next_byte<R: Read>(r: &mut R) -> IoResult<Option<u8>> {
    let mut b = [0u8; 1];
    match r.read(&mut b)? {
        0 => Ok(None),
        _ => Ok(Some(b[0])),
    }
}

/// Reads one whitespace-delimited token, skipping `#` comments.
///
/// Consumes exactly one whitespace byte after the token.
fn next_token<R: BufRead>(r: &mut R) -> IoResult<String> {
    let mut tok = Vec::new();
    loop {
        let b = next_byte(r)?.ok_or_else(|| IoError::InvalidFile("truncated header".into()))?;
        if b == b'#' && tok.is_empty() {
            let mut comment = Vec::new();
            r.read_until(b'\n', &mut comment)?;
        } else if b.is_ascii_whitespace() {
            if !tok.is_empty() {
                break;
            }
        } else {
            tok.push(b);
            if tok.len() > 32 {
                return Err(IoError::InvalidFile("header token too long".into()));
            }
        }
    }
    String::from_utf8(tok).map_err(|_| IoError::InvalidFile("non-ASCII header".into()))
}

fn parse_u32(tok: &str, what: &str) -> IoResult<u32> {
    tok.parse()
        .map_err(|_| IoError::InvalidFile(format!("invalid {what} '{tok}'")))
}
