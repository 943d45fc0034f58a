//! Synthetic images described entirely by their path.
//!
//! ```text
//! anything.null?RES=64x32&CHANNELS=3&TILE=16x16&TYPE=uint8&PATTERN=ramp
//! ```
//!
//! | Option | Meaning | Default |
//! |--------|---------|---------|
//! | `RES=WxH[xD]` | Data window size | `64x64` |
//! | `DEPTH=D` | Volume depth | `1` |
//! | `CHANNELS=N` | Channel count | `4` |
//! | `TILE=WxH[xD]` | Tile size (untiled if absent) | - |
//! | `TYPE=name` | Native type, see [`BaseType::from_name`] | `uint8` |
//! | `SUBIMAGES=N` | Subimage count | `1` |
//! | `MIP=1` | Full MIP chain down to 1x1 | `0` |
//! | `PATTERN=constant\|ramp` | Pixel content | `constant` |
//! | `VALUE=v0,v1,...` | Constant channel values, cycled | `0` |
//!
//! The ramp value of channel `c` at `(x, y, z)` in subimage `s` is
//! `((x + 2y + 3z + c + 7s) % 256) / 255`, so every read path can be
//! checked against [`ramp_value`]. No file is touched.

use crate::detect::extension_of;
use crate::plugin::{Feature, ImageInputPlugin};
use crate::registry::PluginInfo;
use crate::{IoError, IoResult};
use imgin_core::convert::store_normalized;
use imgin_core::{BaseType, ImageSpec};
use std::path::Path;
use tracing::debug;

/// Format name.
pub const FORMAT_NAME: &str = "null";

/// Registry entry.
pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: FORMAT_NAME,
        extensions: &["null"],
        create: || -> Box<dyn ImageInputPlugin> { Box::new(NullInput::new()) },
        valid_file,
    }
}

/// Accepts any path whose name (before `?`) ends in `.null`.
pub fn valid_file(path: &Path) -> bool {
    extension_of(path).as_deref() == Some("null")
}

/// Ramp pattern value of channel `c` at `(x, y, z)` in `subimage`.
pub fn ramp_value(x: u32, y: u32, z: u32, c: u32, subimage: usize) -> f64 {
    let n = u64::from(x) + 2 * u64::from(y) + 3 * u64::from(z) + u64::from(c) + 7 * subimage as u64;
    (n % 256) as f64 / 255.0
}

#[derive(Debug, Clone, PartialEq)]
struct Options {
    width: u32,
    height: u32,
    depth: u32,
    channels: u32,
    tile: Option<(u32, u32, u32)>,
    format: BaseType,
    subimages: usize,
    mip: bool,
    ramp: bool,
    values: Vec<f64>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            depth: 1,
            channels: 4,
            tile: None,
            format: BaseType::UInt8,
            subimages: 1,
            mip: false,
            ramp: false,
            values: vec![0.0],
        }
    }
}

impl Options {
    fn parse(path: &Path) -> IoResult<Self> {
        let mut opts = Self::default();
        let text = path.to_string_lossy();
        let Some((_, query)) = text.split_once('?') else {
            return Ok(opts);
        };

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| IoError::InvalidFile(format!("null option '{pair}' has no value")))?;
            match key.to_ascii_uppercase().as_str() {
                "RES" => {
                    let dims = parse_dims(value)?;
                    opts.width = dims[0];
                    opts.height = *dims.get(1).unwrap_or(&dims[0]);
                    if let Some(&d) = dims.get(2) {
                        opts.depth = d;
                    }
                }
                "DEPTH" => opts.depth = parse_num(key, value)?,
                "CHANNELS" => opts.channels = parse_num(key, value)?,
                "TILE" => {
                    let dims = parse_dims(value)?;
                    let th = *dims.get(1).unwrap_or(&dims[0]);
                    opts.tile = Some((dims[0], th, dims.get(2).copied().unwrap_or(0)));
                }
                "TYPE" => {
                    opts.format = BaseType::from_name(value)
                        .filter(|t| t.is_pixel_type())
                        .ok_or_else(|| IoError::InvalidFile(format!("null TYPE '{value}'")))?;
                }
                "SUBIMAGES" => opts.subimages = parse_num::<u32>(key, value)? as usize,
                "MIP" => opts.mip = parse_num::<u32>(key, value)? != 0,
                "PATTERN" => {
                    opts.ramp = match value.to_ascii_lowercase().as_str() {
                        "ramp" => true,
                        "constant" => false,
                        _ => return Err(IoError::InvalidFile(format!("null PATTERN '{value}'"))),
                    }
                }
                "VALUE" => {
                    opts.values = value
                        .split(',')
                        .map(|v| parse_num::<f64>(key, v))
                        .collect::<IoResult<_>>()?;
                }
                _ => debug!(key, "ignoring unknown null option"),
            }
        }

        if opts.width == 0 || opts.height == 0 || opts.depth == 0 || opts.channels == 0 {
            return Err(IoError::InvalidFile("null image has a zero dimension".into()));
        }
        if opts.subimages == 0 {
            return Err(IoError::InvalidFile("null image needs at least one subimage".into()));
        }
        if opts.tile.is_some_and(|(tw, th, _)| tw == 0 || th == 0) {
            return Err(IoError::InvalidFile("null tile size is zero".into()));
        }
        Ok(opts)
    }

    fn levels(&self) -> usize {
        if !self.mip {
            return 1;
        }
        let largest = self.width.max(self.height).max(self.depth);
        (u32::BITS - largest.leading_zeros()) as usize
    }

    fn spec(&self, subimage: usize, level: usize) -> ImageSpec {
        let shrink = |v: u32| (v >> level).max(1);
        let mut spec = ImageSpec::new(shrink(self.width), shrink(self.height), self.channels, self.format)
            .with_depth(shrink(self.depth));
        if let Some((tw, th, td)) = self.tile {
            spec = spec.with_tiles(tw, th, td);
        }
        spec.set_attr("null:pattern", if self.ramp { "ramp" } else { "constant" });
        spec.set_attr("null:subimage", subimage as u32);
        spec
    }

    fn value(&self, x: u32, y: u32, z: u32, c: u32, subimage: usize) -> f64 {
        if self.ramp {
            ramp_value(x, y, z, c, subimage)
        } else {
            self.values[c as usize % self.values.len()]
        }
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> IoResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IoError::InvalidFile(format!("null option {key}='{value}'")))
}

fn parse_dims(value: &str) -> IoResult<Vec<u32>> {
    let dims = value
        .split('x')
        .map(|v| parse_num::<u32>("dimension", v))
        .collect::<IoResult<Vec<_>>>()?;
    if dims.is_empty() || dims.len() > 3 {
        return Err(IoError::InvalidFile(format!("null dimensions '{value}'")));
    }
    Ok(dims)
}

/// Null codec plugin.
#[derive(Debug, Default)]
pub struct NullInput {
    opts: Option<Options>,
    subimage: usize,
    miplevel: usize,
    spec: ImageSpec,
}

impl NullInput {
    /// Creates a closed plugin.
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&self, origin: [u32; 3], size: [u32; 3], data: &mut [u8]) -> IoResult<()> {
        let [x0, y0, z0] = origin;
        let [w, h, d] = size;
        let opts = self.opts.as_ref().ok_or(IoError::NotOpen)?;
        let size = opts.format.size();
        let nch = opts.channels;
        let needed = (w as usize * h as usize * d as usize * nch as usize) * size;
        let data = data
            .get_mut(..needed)
            .ok_or_else(|| IoError::DecodeError("null buffer too small".into()))?;

        let mut samples = data.chunks_exact_mut(size);
        for z in z0..z0 + d {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    let inside = x < self.spec.width && y < self.spec.height && z < self.spec.depth;
                    for c in 0..nch {
                        let Some(out) = samples.next() else {
                            return Ok(());
                        };
                        let v = if inside { opts.value(x, y, z, c, self.subimage) } else { 0.0 };
                        store_normalized(v, opts.format, out);
                    }
                }
            }
        }
        Ok(())
    }
}

impl ImageInputPlugin for NullInput {
    fn format_name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn valid_file(&self, path: &Path) -> bool {
        valid_file(path)
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::Tiles
                | Feature::MipMap
                | Feature::MultiImage
                | Feature::Volumes
                | Feature::RandomAccess
        )
    }

    fn open(&mut self, path: &Path) -> IoResult<ImageSpec> {
        *self = Self::default();
        let opts = Options::parse(path)?;
        debug!(options = ?opts, "null image");
        self.spec = opts.spec(0, 0);
        self.opts = Some(opts);
        Ok(self.spec.clone())
    }

    fn close(&mut self) -> IoResult<()> {
        *self = Self::default();
        Ok(())
    }

    fn current_subimage(&self) -> usize {
        self.subimage
    }

    fn current_miplevel(&self) -> usize {
        self.miplevel
    }

    fn seek_subimage(&mut self, subimage: usize, miplevel: usize) -> IoResult<ImageSpec> {
        let opts = self.opts.as_ref().ok_or(IoError::NotOpen)?;
        if subimage >= opts.subimages {
            return Err(IoError::SeekFailed(format!(
                "subimage {subimage} out of range ({} subimages)",
                opts.subimages
            )));
        }
        if miplevel >= opts.levels() {
            return Err(IoError::SeekFailed(format!(
                "MIP level {miplevel} out of range ({} levels)",
                opts.levels()
            )));
        }
        self.spec = opts.spec(subimage, miplevel);
        self.subimage = subimage;
        self.miplevel = miplevel;
        Ok(self.spec.clone())
    }

    fn read_native_scanline(&mut self, y: u32, z: u32, data: &mut [u8]) -> IoResult<()> {
        self.fill([0, y, z], [self.spec.width, 1, 1], data)
    }

    fn read_native_tile(&mut self, x: u32, y: u32, z: u32, data: &mut [u8]) -> IoResult<()> {
        if !self.spec.is_tiled() {
            return Err(IoError::UnsupportedOperation("null image is not tiled".into()));
        }
        let (tw, th, td) = (self.spec.tile_width, self.spec.tile_height, self.spec.tile_depth_extent());
        self.fill([x, y, z], [tw, th, td], data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(path: &str) -> IoResult<Options> {
        Options::parse(Path::new(path))
    }

    #[test]
    fn test_defaults() {
        let o = opts("plain.null").unwrap();
        assert_eq!(o, Options::default());
        let spec = o.spec(0, 0);
        assert_eq!((spec.width, spec.height, spec.nchannels), (64, 64, 4));
        assert!(!spec.is_tiled());
    }

    #[test]
    fn test_parse_options() {
        let o = opts("x.null?RES=64x32&CHANNELS=3&TILE=16x8x2&DEPTH=4&TYPE=half&SUBIMAGES=2&MIP=1&PATTERN=ramp")
            .unwrap();
        assert_eq!((o.width, o.height, o.depth, o.channels), (64, 32, 4, 3));
        assert_eq!(o.tile, Some((16, 8, 2)));
        assert_eq!(o.format, BaseType::Half);
        assert_eq!(o.subimages, 2);
        assert!(o.ramp);
        assert_eq!(o.levels(), 7);
    }

    #[test]
    fn test_bad_options() {
        assert!(opts("x.null?RES=0x4").is_err());
        assert!(opts("x.null?TYPE=string").is_err());
        assert!(opts("x.null?RES=axb").is_err());
        assert!(opts("x.null?PATTERN=noise").is_err());
        assert!(opts("x.null?SUBIMAGES=0").is_err());
        assert!(opts("x.null?CHANNELS").is_err());
        assert!(opts("x.null?COLOR=red").is_ok());
    }

    #[test]
    fn test_mip_chain_sizes() {
        let o = opts("x.null?RES=8x2&MIP=1").unwrap();
        assert_eq!(o.levels(), 4);
        let sizes: Vec<_> = (0..4).map(|l| {
            let s = o.spec(0, l);
            (s.width, s.height)
        }).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
    }

    #[test]
    fn test_valid_file() {
        assert!(valid_file(Path::new("a.null")));
        assert!(valid_file(Path::new("dir/a.NULL?RES=4x4")));
        assert!(!valid_file(Path::new("a.ppm")));
        assert!(!valid_file(Path::new("a.ppm?x.null")));
    }

    #[test]
    fn test_constant_values_cycle() {
        let mut input = NullInput::new();
        input.open(Path::new("c.null?RES=2x1&CHANNELS=3&VALUE=0,1")).unwrap();
        let mut row = vec![0u8; 6];
        input.read_native_scanline(0, 0, &mut row).unwrap();
        assert_eq!(row, vec![0, 255, 0, 0, 255, 0]);
    }
}
