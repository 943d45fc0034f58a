//! TIFF input via the `tiff` crate.
//!
//! Each page (IFD) is a subimage, reached directly with `seek_to_image`.
//! Stripped pages are read as scanlines, tiled pages expose their tile size
//! and are read tile by tile. Both go through the crate's chunk API, so only
//! the strips or tiles a read touches are decoded.
//!
//! | TIFF samples | Native format |
//! |--------------|---------------|
//! | 8-bit | `UInt8` |
//! | 16-bit | `UInt16` |
//! | 32-bit (float or uint) | `Float` |
//! | 64-bit float | `Float` |

use crate::detect::{is_tiff, read_header, SNIFF_LEN};
use crate::plugin::{Feature, ImageInputPlugin};
use crate::registry::PluginInfo;
use crate::{IoError, IoResult};
use ::tiff::decoder::{ChunkType, Decoder, DecodingResult};
use ::tiff::ColorType;
use byteorder::{ByteOrder, NativeEndian};
use imgin_core::{BaseType, ImageSpec};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

/// Format name.
pub const FORMAT_NAME: &str = "tiff";

/// Registry entry.
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: FORMAT_NAME,
        extensions: &["tif", "tiff", "tx"],
        create: || -> Box<dyn ImageInputPlugin> { Box::new(TiffInput::new()) },
        valid_file,
    }
}

/// Checks the `II*\0` / `MM\0*` byte-order mark.
pub fn valid_file(path: &Path) -> bool {
    is_tiff(&read_header(path, SNIFF_LEN))
}

/// Layout of the current page.
#[derive(Debug, Clone, Copy)]
struct Page {
    width: u32,
    height: u32,
    channels: u32,
    format: BaseType,
    tiled: bool,
    chunk_width: u32,
    chunk_height: u32,
}

impl Page {
    fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }

    fn pixel_bytes(&self) -> usize {
        self.channels as usize * self.format.size()
    }

    fn spec(&self) -> ImageSpec {
        let mut spec = ImageSpec::new(self.width, self.height, self.channels, self.format);
        if self.tiled {
            spec = spec.with_tiles(self.chunk_width, self.chunk_height, 0);
        }
        spec.set_attr("BitsPerSample", (self.format.size() * 8) as u32);
        spec
    }
}

/// Last decoded chunk, as native bytes.
struct Chunk {
    index: u32,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

struct Session {
    decoder: Decoder<BufReader<File>>,
    page: Page,
    subimage: usize,
    cached: Option<Chunk>,
}

impl Session {
    fn chunk(&mut self, index: u32) -> IoResult<&Chunk> {
        if self.cached.as_ref().is_none_or(|c| c.index != index) {
            trace!(index, "decoding tiff chunk");
            let result = self
                .decoder
                .read_chunk(index)
                .map_err(|e| IoError::DecodeError(format!("TIFF chunk {index}: {e}")))?;
            let (width, height) = self.decoder.chunk_data_dimensions(index);
            self.cached = Some(Chunk {
                index,
                width,
                height,
                data: to_native(result)?,
            });
        }
        self.cached
            .as_ref()
            .ok_or_else(|| IoError::DecodeError(format!("TIFF chunk {index} missing")))
    }
}

/// TIFF codec plugin.
#[derive(Default)]
pub struct TiffInput {
    session: Option<Session>,
}

impl TiffInput {
    /// Creates a closed plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageInputPlugin for TiffInput {
    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn valid_file(&self, path: &Path) -> bool {
        valid_file(path)
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Tiles | Feature::MultiImage | Feature::RandomAccess
        )
    }

    fn open(&mut self, path: &Path) -> IoResult<ImageSpec> {
        self.session = None;
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| IoError::InvalidFile(format!("TIFF header: {e}")))?;
        let page = read_page(&mut decoder)?;
        debug!(page = ?page, "tiff page 0");

        let spec = page.spec();
        self.session = Some(Session {
            decoder,
            page,
            subimage: 0,
            cached: None,
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
            return Err(IoError::SeekFailed(format!("tiff has no MIP level {miplevel}")));
        }
        if subimage == s.subimage {
            return Ok(s.page.spec());
        }

        let moved = s
            .decoder
            .seek_to_image(subimage)
            .map_err(|e| IoError::SeekFailed(format!("TIFF page {subimage}: {e}")))
            .and_then(|_| read_page(&mut s.decoder));
        match moved {
            Ok(page) => {
                s.page = page;
                s.subimage = subimage;
                s.cached = None;
                Ok(page.spec())
            }
            Err(e) => {
                // the decoder may sit on a partially read directory
                if let Err(back) = s.decoder.seek_to_image(s.subimage) {
                    return Err(IoError::SeekFailed(format!("{e}; could not return to page {}: {back}", s.subimage)));
                }
                Err(e)
            }
        }
    }

    fn read_native_scanline(&mut self, y: u32, _z: u32, data: &mut [u8]) -> IoResult<()> {
        let s = self.session.as_mut().ok_or(IoError::NotOpen)?;
        let page = s.page;
        if page.tiled {
            return Err(IoError::UnsupportedOperation("tiled TIFF page is read by tiles".into()));
        }
        let row_bytes = page.width as usize * page.pixel_bytes();
        let chunk = s.chunk(y / page.chunk_height)?;
        let row = (y % page.chunk_height) as usize;
        let src = chunk
            .data
            .get(row * row_bytes..(row + 1) * row_bytes)
            .ok_or_else(|| IoError::DecodeError(format!("TIFF strip too short for row {y}")))?;
        data[..row_bytes].copy_from_slice(src);
        Ok(())
    }

    fn read_native_tile(&mut self, x: u32, y: u32, _z: u32, data: &mut [u8]) -> IoResult<()> {
        let s = self.session.as_mut().ok_or(IoError::NotOpen)?;
        let page = s.page;
        if !page.tiled {
            return Err(IoError::UnsupportedOperation("stripped TIFF page has no tiles".into()));
        }
        let index = (y / page.chunk_height) * page.chunks_across() + x / page.chunk_width;
        let px = page.pixel_bytes();
        let tile_row = page.chunk_width as usize * px;
        let chunk = s.chunk(index)?;

        // edge tiles come back cropped; pad to the full tile
        let src_row = chunk.width as usize * px;
        data.fill(0);
        for row in 0..chunk.height.min(page.chunk_height) as usize {
            let src = chunk
                .data
                .get(row * src_row..(row + 1) * src_row)
                .ok_or_else(|| IoError::DecodeError(format!("TIFF tile {index} too short")))?;
            data[row * tile_row..row * tile_row + src_row].copy_from_slice(src);
        }
        Ok(())
    }
}

fn read_page(decoder: &mut Decoder<BufReader<File>>) -> IoResult<Page> {
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| IoError::DecodeError(format!("TIFF dimensions: {e}")))?;
    let color_type = decoder
        .colortype()
        .map_err(|e| IoError::DecodeError(format!("TIFF colortype: {e}")))?;

    let (bits, channels) = match color_type {
        ColorType::Gray(b) => (b, 1),
        ColorType::GrayA(b) => (b, 2),
        ColorType::RGB(b) => (b, 3),
        ColorType::RGBA(b) => (b, 4),
        ColorType::CMYK(b) => (b, 4),
        other => {
            return Err(IoError::UnsupportedFormat(format!("TIFF color type {other:?}")));
        }
    };
    let format = match bits {
        8 => BaseType::UInt8,
        16 => BaseType::UInt16,
        32 | 64 => BaseType::Float,
        other => {
            return Err(IoError::UnsupportedFormat(format!("TIFF {other}-bit samples")));
        }
    };

    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    if chunk_width == 0 || chunk_height == 0 {
        return Err(IoError::InvalidFile("TIFF chunk size is zero".into()));
    }
    Ok(Page {
        width,
        height,
        channels,
        format,
        tiled: matches!(decoder.get_chunk_type(), ChunkType::Tile),
        chunk_width,
        chunk_height,
    })
}

/// Converts a decoded chunk to native-endian bytes of the page format.
fn to_native(result: DecodingResult) -> IoResult<Vec<u8>> {
    let bytes = match result {
        DecodingResult::U8(v) => v,
        DecodingResult::U16(v) => {
            let mut out = vec![0u8; v.len() * 2];
            NativeEndian::write_u16_into(&v, &mut out);
            out
        }
        DecodingResult::F32(v) => f32_bytes(&v),
        DecodingResult::U32(v) => {
            let f: Vec<f32> = v.iter().map(|&s| (s as f64 / u32::MAX as f64) as f32).collect();
            f32_bytes(&f)
        }
        DecodingResult::F64(v) => {
            let f: Vec<f32> = v.iter().map(|&s| s as f32).collect();
            f32_bytes(&f)
        }
        _ => {
            return Err(IoError::UnsupportedFormat("Unsupported TIFF sample format".into()));
        }
    };
    Ok(bytes)
}

fn f32_bytes(v: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; v.len() * 4];
    NativeEndian::write_f32_into(v, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_native() {
        assert_eq!(to_native(DecodingResult::U8(vec![1, 2])).unwrap(), vec![1, 2]);

        let bytes = to_native(DecodingResult::U16(vec![0x0102])).unwrap();
        assert_eq!(NativeEndian::read_u16(&bytes), 0x0102);

        let bytes = to_native(DecodingResult::U32(vec![u32::MAX])).unwrap();
        assert_eq!(NativeEndian::read_f32(&bytes), 1.0);

        let bytes = to_native(DecodingResult::F64(vec![0.25])).unwrap();
        assert_eq!(NativeEndian::read_f32(&bytes), 0.25);
    }

    #[test]
    fn test_page_spec() {
        let page = Page {
            width: 100,
            height: 50,
            channels: 3,
            format: BaseType::UInt16,
            tiled: true,
            chunk_width: 32,
            chunk_height: 16,
        };
        assert_eq!(page.chunks_across(), 4);
        let spec = page.spec();
        assert!(spec.is_tiled());
        assert_eq!((spec.tile_width, spec.tile_height), (32, 16));
        assert_eq!(spec.get_int("BitsPerSample"), Some(16));
    }
}
