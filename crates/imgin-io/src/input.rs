//! The `ImageInput` reader.
//!
//! [`ImageInput`] owns at most one open codec session and a cursor
//! `(subimage, miplevel)` into it. Every operation that touches the codec
//! returns a [`IoResult`] (or `bool` for seeks) and also records the outcome:
//! [`ImageInput::last_error`] holds the message of the last failure, or
//! `None` after a success.
//!
//! # State machine
//!
//! ```text
//!            open / reopen (ok)             seek (ok)
//! Closed ───────────────────────> Opened(0,0) ──────> Opened(s,m)
//!   ^                                  │                   │
//!   └──────────── close / drop ────────┴───────────────────┘
//! ```
//!
//! Operations other than open on a closed reader fail with
//! [`IoError::NotOpen`].
//!
//! # Example
//!
//! ```rust,no_run
//! use imgin_io::ImageInput;
//! use imgin_core::BaseType;
//!
//! let mut input = ImageInput::open("render.tif")?;
//! let spec = input.spec().cloned().unwrap_or_default();
//! println!("{} via {}", spec, input.format_name());
//!
//! let pixels = input.read_image()?;
//! assert_eq!(pixels.len(), spec.image_values()?);
//!
//! let mut cancel = |done: f32| done > 0.5;
//! let halfway = input.read_image_typed(BaseType::UInt16, Some(&mut cancel));
//! assert!(halfway.is_err());
//! # Ok::<(), imgin_io::IoError>(())
//! ```

use crate::config::InputConfig;
use crate::plugin::{Feature, ImageInputPlugin};
use crate::progress::{Progress, ProgressCallback};
use crate::registry::PluginRegistry;
use crate::{IoError, IoResult};
use imgin_core::buffer::zeroed;
use imgin_core::convert::convert_native;
use imgin_core::{BaseType, ImageSpec, PixelBuffer};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug)]
struct Cursor {
    spec: ImageSpec,
    subimage: usize,
    miplevel: usize,
}

/// Format-agnostic image reader.
///
/// Not safe to share between threads without external serialization, but
/// distinct readers are fully independent.
#[derive(Debug)]
pub struct ImageInput {
    registry: Arc<PluginRegistry>,
    plugin: Option<Box<dyn ImageInputPlugin>>,
    cursor: Option<Cursor>,
    config: InputConfig,
    last_error: Option<String>,
}

impl ImageInput {
    /// Creates a closed reader with no plugin, using the global registry.
    pub fn new() -> Self {
        Self::with_registry(PluginRegistry::global())
    }

    /// Creates a closed reader with no plugin, selecting from `registry`.
    pub fn with_registry(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            plugin: None,
            cursor: None,
            config: InputConfig::default(),
            last_error: None,
        }
    }

    /// Opens `path` with the default configuration.
    ///
    /// On success the reader is positioned at subimage 0, MIP level 0.
    pub fn open(path: impl AsRef<Path>) -> IoResult<Self> {
        Self::open_with_config(path, &InputConfig::default())
    }

    /// Opens `path` with `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: &InputConfig) -> IoResult<Self> {
        Self::open_in(PluginRegistry::global(), path, config)
    }

    /// Opens `path`, selecting the plugin from `registry`.
    pub fn open_in(
        registry: Arc<PluginRegistry>,
        path: impl AsRef<Path>,
        config: &InputConfig,
    ) -> IoResult<Self> {
        let mut input = Self::with_registry(registry);
        input.reopen_with_config(path, config)?;
        Ok(input)
    }

    /// Selects a plugin for a format name or path without opening anything.
    ///
    /// Useful to query [`valid_file`](Self::valid_file),
    /// [`supports`](Self::supports) and [`format_name`](Self::format_name)
    /// before committing to an open.
    pub fn create(path_or_format: &str) -> IoResult<Self> {
        let registry = PluginRegistry::global();
        let plugin = registry.create(path_or_format)?;
        debug!(format = plugin.format_name(), "created image input");
        let mut input = Self::with_registry(registry);
        input.plugin = Some(plugin);
        Ok(input)
    }

    /// Closes the current session, if any, and opens `path` on this reader.
    ///
    /// Keeps the current configuration. On failure the reader is closed and
    /// [`last_error`](Self::last_error) describes the cause.
    pub fn reopen(&mut self, path: impl AsRef<Path>) -> IoResult<()> {
        let result = self.open_session(path.as_ref());
        self.record(result)
    }

    /// Like [`reopen`](Self::reopen), replacing the configuration first.
    pub fn reopen_with_config(&mut self, path: impl AsRef<Path>, config: &InputConfig) -> IoResult<()> {
        self.config = config.clone();
        self.reopen(path)
    }

    fn open_session(&mut self, path: &Path) -> IoResult<()> {
        self.close_session();

        let info = self.registry.select(path, self.config.format.as_deref())?;
        let mut plugin = (info.create)();
        let opened = plugin.open(path).and_then(|spec| {
            spec.validate()?;
            self.config.limits.check_spec(&spec)?;
            Ok(spec)
        });
        let spec = match opened {
            Ok(spec) => spec,
            Err(e) => {
                // releases anything the plugin acquired before failing
                if let Err(close_err) = plugin.close() {
                    warn!(format = plugin.format_name(), error = %close_err, "close after failed open");
                }
                self.plugin = Some(plugin);
                return Err(e);
            }
        };

        debug!(
            path = %path.display(),
            format = plugin.format_name(),
            spec = %spec,
            "opened image input"
        );
        self.plugin = Some(plugin);
        self.cursor = Some(Cursor {
            spec,
            subimage: 0,
            miplevel: 0,
        });
        Ok(())
    }

    /// Releases the codec session.
    ///
    /// Closing a closed reader succeeds and does nothing.
    pub fn close(&mut self) -> IoResult<()> {
        let result = match (self.cursor.take(), self.plugin.as_deref_mut()) {
            (Some(_), Some(plugin)) => {
                debug!(format = plugin.format_name(), "closing image input");
                plugin.close()
            }
            _ => Ok(()),
        };
        self.record(result)
    }

    fn close_session(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close previous image");
        }
    }

    /// Message of the most recent failure, `None` if the last call succeeded.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Name of the selected plugin, empty if none was selected.
    pub fn format_name(&self) -> &str {
        self.plugin.as_deref().map_or("", |p| p.format_name())
    }

    /// Whether the selected plugin considers `path` plausibly decodable.
    pub fn valid_file(&self, path: impl AsRef<Path>) -> bool {
        self.plugin
            .as_deref()
            .is_some_and(|p| p.valid_file(path.as_ref()))
    }

    /// Capability query by vocabulary name. Unknown names are unsupported.
    pub fn supports(&self, feature: &str) -> bool {
        match (Feature::from_name(feature), self.plugin.as_deref()) {
            (Some(f), Some(p)) => p.supports(f),
            _ => false,
        }
    }

    /// Spec of the current subimage/MIP level, `None` when closed.
    ///
    /// The borrow ends before the next seek or close; clone it to keep it.
    pub fn spec(&self) -> Option<&ImageSpec> {
        self.cursor.as_ref().map(|c| &c.spec)
    }

    /// Returns `true` while a session is open.
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    /// Current subimage index (0 when closed).
    pub fn current_subimage(&self) -> usize {
        self.cursor.as_ref().map_or(0, |c| c.subimage)
    }

    /// Current MIP level index (0 when closed).
    pub fn current_miplevel(&self) -> usize {
        self.cursor.as_ref().map_or(0, |c| c.miplevel)
    }

    /// Moves to MIP level 0 of `subimage`. Negative indices clamp to 0.
    ///
    /// On success copies the new spec into `out` (if given) and returns
    /// `true`. On failure returns `false`, keeps the cursor and records the
    /// error.
    pub fn seek_subimage(&mut self, subimage: i32, out: Option<&mut ImageSpec>) -> bool {
        self.seek_miplevel(subimage, 0, out)
    }

    /// Moves to `(subimage, miplevel)`. Negative indices clamp to 0.
    pub fn seek_miplevel(&mut self, subimage: i32, miplevel: i32, out: Option<&mut ImageSpec>) -> bool {
        let subimage = subimage.max(0) as usize;
        let miplevel = miplevel.max(0) as usize;
        let result = self.seek_to(subimage, miplevel);
        match self.record(result) {
            Ok(()) => {
                if let (Some(out), Some(cursor)) = (out, self.cursor.as_ref()) {
                    *out = cursor.spec.clone();
                }
                true
            }
            Err(_) => false,
        }
    }

    fn seek_to(&mut self, subimage: usize, miplevel: usize) -> IoResult<()> {
        let (Some(plugin), Some(cursor)) = (self.plugin.as_deref_mut(), self.cursor.as_mut()) else {
            return Err(IoError::NotOpen);
        };
        if cursor.subimage == subimage && cursor.miplevel == miplevel {
            return Ok(());
        }

        let spec = plugin.seek_subimage(subimage, miplevel)?;
        let checked = spec
            .validate()
            .map_err(IoError::from)
            .and_then(|_| self.config.limits.check_spec(&spec));
        if let Err(e) = checked {
            if let Err(back) = plugin.seek_subimage(cursor.subimage, cursor.miplevel) {
                warn!(error = %back, "could not return to previous subimage");
            }
            return Err(e);
        }

        debug!(subimage, miplevel, spec = %spec, "seeked");
        *cursor = Cursor {
            spec,
            subimage,
            miplevel,
        };
        Ok(())
    }

    /// Reads the whole current subimage as `f32`.
    ///
    /// Length is `width * height * depth * nchannels`.
    pub fn read_image(&mut self) -> IoResult<Vec<f32>> {
        let buf = self.read_image_typed(BaseType::Float, None)?;
        into_float(buf)
    }

    /// Reads the whole current subimage converted to `ty`.
    ///
    /// `progress` receives non-decreasing fractions in `[0, 1]`, starting at
    /// 0 and ending at 1. If it returns `true` the read stops with
    /// [`IoError::Aborted`] and the partial buffer is dropped.
    pub fn read_image_typed(
        &mut self,
        ty: BaseType,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> IoResult<PixelBuffer> {
        let result = self.read_image_impl(ty, progress);
        self.record(result)
    }

    fn read_image_impl(
        &mut self,
        ty: BaseType,
        progress: Option<&mut ProgressCallback<'_>>,
    ) -> IoResult<PixelBuffer> {
        PixelBuffer::check_type(ty)?;
        let (Some(plugin), Some(cursor)) = (self.plugin.as_deref_mut(), self.cursor.as_ref()) else {
            return Err(IoError::NotOpen);
        };
        let spec = &cursor.spec;
        self.config.limits.check_buffer(ty, spec.image_values()?)?;

        let mut out = PixelBuffer::for_image(spec, ty)?;
        let mut progress = Progress::new(progress);
        if spec.is_tiled() {
            read_tiles_into(plugin, spec, &mut out, &mut progress)?;
        } else {
            read_scanlines_into(plugin, spec, &mut out, &mut progress, self.config.chunk_scanlines)?;
        }
        Ok(out)
    }

    /// Reads scanline `y` of slice `z` as `f32`.
    ///
    /// Coordinates are absolute (they include the data window origin). The
    /// result holds `width * depth * nchannels` values; the row occupies the
    /// leading `width * nchannels`.
    pub fn read_scanline(&mut self, y: i32, z: i32) -> IoResult<Vec<f32>> {
        let buf = self.read_scanline_typed(y, z, BaseType::Float)?;
        into_float(buf)
    }

    /// Reads scanline `y` of slice `z` converted to `ty`.
    pub fn read_scanline_typed(&mut self, y: i32, z: i32, ty: BaseType) -> IoResult<PixelBuffer> {
        let result = self.read_scanline_impl(y, z, ty);
        self.record(result)
    }

    fn read_scanline_impl(&mut self, y: i32, z: i32, ty: BaseType) -> IoResult<PixelBuffer> {
        PixelBuffer::check_type(ty)?;
        let (Some(plugin), Some(cursor)) = (self.plugin.as_deref_mut(), self.cursor.as_ref()) else {
            return Err(IoError::NotOpen);
        };
        let spec = &cursor.spec;
        let ry = relative(y, spec.y, spec.height)
            .ok_or_else(|| IoError::OutOfBounds(format!("scanline y={y} outside {}..{}", spec.y, end(spec.y, spec.height))))?;
        let rz = relative(z, spec.z, spec.depth)
            .ok_or_else(|| IoError::OutOfBounds(format!("slice z={z} outside {}..{}", spec.z, end(spec.z, spec.depth))))?;

        self.config.limits.check_buffer(ty, spec.scanline_values()?)?;
        let mut out = PixelBuffer::for_scanline(spec, ty)?;

        trace!(y = ry, z = rz, "read scanline");
        if spec.is_tiled() {
            read_row_from_tiles(plugin, spec, ry, rz, &mut out)?;
        } else {
            let mut native = zeroed::<u8>(spec.row_bytes()?)?;
            plugin.read_native_scanline(ry, rz, &mut native)?;
            convert_native(&native, spec.format, &mut out, 0)?;
        }
        Ok(out)
    }

    /// Reads the tile with origin `(x, y, z)` as `f32`.
    ///
    /// Coordinates are absolute and must be tile-aligned. The result holds
    /// `tile_width * tile_height * tile_depth * nchannels` values; parts of
    /// edge tiles outside the data window are zero.
    pub fn read_tile(&mut self, x: i32, y: i32, z: i32) -> IoResult<Vec<f32>> {
        let buf = self.read_tile_typed(x, y, z, BaseType::Float)?;
        into_float(buf)
    }

    /// Reads the tile with origin `(x, y, z)` converted to `ty`.
    pub fn read_tile_typed(&mut self, x: i32, y: i32, z: i32, ty: BaseType) -> IoResult<PixelBuffer> {
        let result = self.read_tile_impl(x, y, z, ty);
        self.record(result)
    }

    fn read_tile_impl(&mut self, x: i32, y: i32, z: i32, ty: BaseType) -> IoResult<PixelBuffer> {
        PixelBuffer::check_type(ty)?;
        let (Some(plugin), Some(cursor)) = (self.plugin.as_deref_mut(), self.cursor.as_ref()) else {
            return Err(IoError::NotOpen);
        };
        let spec = &cursor.spec;
        if !spec.is_tiled() || !plugin.supports(Feature::Tiles) {
            return Err(IoError::UnsupportedOperation("image is not tiled".into()));
        }

        let rx = tile_coord("x", x, spec.x, spec.width, spec.tile_width)?;
        let ry = tile_coord("y", y, spec.y, spec.height, spec.tile_height)?;
        let rz = tile_coord("z", z, spec.z, spec.depth, spec.tile_depth_extent())?;

        self.config.limits.check_buffer(ty, spec.tile_values()?)?;
        let mut out = PixelBuffer::for_tile(spec, ty)?;
        let mut native = zeroed::<u8>(spec.tile_bytes()?)?;

        trace!(x = rx, y = ry, z = rz, "read tile");
        plugin.read_native_tile(rx, ry, rz, &mut native)?;
        convert_native(&native, spec.format, &mut out, 0)?;
        Ok(out)
    }

    fn record<T>(&mut self, result: IoResult<T>) -> IoResult<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                debug!(error = %e, "image input error");
                self.last_error = Some(e.to_string());
            }
        }
        result
    }
}

impl Default for ImageInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ImageInput {
    fn drop(&mut self) {
        if let (Some(_), Some(plugin)) = (self.cursor.take(), self.plugin.as_deref_mut()) {
            if let Err(e) = plugin.close() {
                warn!(format = plugin.format_name(), error = %e, "close on drop failed");
            }
        }
    }
}

fn into_float(buf: PixelBuffer) -> IoResult<Vec<f32>> {
    let ty = buf.base_type();
    buf.into_f32()
        .ok_or_else(|| IoError::DecodeError(format!("expected float buffer, got {ty}")))
}

/// Maps an absolute coordinate into `0..size` relative to `origin`.
fn relative(coord: i32, origin: i32, size: u32) -> Option<u32> {
    let rel = i64::from(coord) - i64::from(origin);
    if rel >= 0 && rel < i64::from(size) {
        u32::try_from(rel).ok()
    } else {
        None
    }
}

fn end(origin: i32, size: u32) -> i64 {
    i64::from(origin) + i64::from(size)
}

fn tile_coord(axis: &str, coord: i32, origin: i32, size: u32, tile: u32) -> IoResult<u32> {
    let rel = relative(coord, origin, size).ok_or_else(|| {
        IoError::OutOfBounds(format!("tile {axis}={coord} outside {origin}..{}", end(origin, size)))
    })?;
    if rel % tile != 0 {
        return Err(IoError::OutOfBounds(format!(
            "tile {axis}={coord} is not a multiple of tile size {tile} from origin {origin}"
        )));
    }
    Ok(rel)
}

fn read_scanlines_into(
    plugin: &mut dyn ImageInputPlugin,
    spec: &ImageSpec,
    out: &mut PixelBuffer,
    progress: &mut Progress<'_, '_>,
    chunk: u32,
) -> IoResult<()> {
    let total = u64::from(spec.height) * u64::from(spec.depth);
    let chunk = u64::from(chunk.max(1));
    let mut native = zeroed::<u8>(spec.row_bytes()?)?;
    let mut offset = 0;
    let mut done = 0u64;

    progress.report(0, total)?;
    for z in 0..spec.depth {
        for y in 0..spec.height {
            plugin.read_native_scanline(y, z, &mut native)?;
            offset += convert_native(&native, spec.format, out, offset)?;
            done += 1;
            if done % chunk == 0 {
                trace!(rows = done, total, "scanline chunk");
                progress.report(done, total)?;
            }
        }
    }
    progress.report(total, total)
}

/// Tile counts along x, y and z.
fn tile_grid(spec: &ImageSpec) -> (u32, u32, u32) {
    (
        spec.width.div_ceil(spec.tile_width),
        spec.height.div_ceil(spec.tile_height),
        spec.depth.div_ceil(spec.tile_depth_extent()),
    )
}

fn read_tiles_into(
    plugin: &mut dyn ImageInputPlugin,
    spec: &ImageSpec,
    out: &mut PixelBuffer,
    progress: &mut Progress<'_, '_>,
) -> IoResult<()> {
    let (tw, th, td) = (spec.tile_width, spec.tile_height, spec.tile_depth_extent());
    let (nx, ny, nz) = tile_grid(spec);
    let total = u64::from(nx) * u64::from(ny) * u64::from(nz);
    let px = spec.pixel_bytes();
    let nch = spec.nchannels as usize;
    let (w, h) = (spec.width as usize, spec.height as usize);
    let mut tile = zeroed::<u8>(spec.tile_bytes()?)?;
    let mut done = 0u64;

    progress.report(0, total)?;
    for tz in 0..nz {
        for ty in 0..ny {
            for tx in 0..nx {
                let (x0, y0, z0) = (tx * tw, ty * th, tz * td);
                plugin.read_native_tile(x0, y0, z0, &mut tile)?;

                // clip to the data window
                let cw = tw.min(spec.width - x0) as usize;
                let ch = th.min(spec.height - y0);
                let cd = td.min(spec.depth - z0);
                for zz in 0..cd {
                    for yy in 0..ch {
                        let src = (zz as usize * th as usize + yy as usize) * tw as usize * px;
                        let dst = (((z0 + zz) as usize * h + (y0 + yy) as usize) * w + x0 as usize) * nch;
                        convert_native(&tile[src..src + cw * px], spec.format, out, dst)?;
                    }
                }

                done += 1;
                trace!(tx, ty, tz, "tile");
                progress.report(done, total)?;
            }
        }
    }
    Ok(())
}

fn read_row_from_tiles(
    plugin: &mut dyn ImageInputPlugin,
    spec: &ImageSpec,
    y: u32,
    z: u32,
    out: &mut PixelBuffer,
) -> IoResult<()> {
    let (tw, th, td) = (spec.tile_width, spec.tile_height, spec.tile_depth_extent());
    let (nx, _, _) = tile_grid(spec);
    let px = spec.pixel_bytes();
    let nch = spec.nchannels as usize;
    let (y0, yy) = (y - y % th, y % th);
    let (z0, zz) = (z - z % td, z % td);
    let mut tile = zeroed::<u8>(spec.tile_bytes()?)?;

    for tx in 0..nx {
        let x0 = tx * tw;
        plugin.read_native_tile(x0, y0, z0, &mut tile)?;
        let cw = tw.min(spec.width - x0) as usize;
        let src = (zz as usize * th as usize + yy as usize) * tw as usize * px;
        convert_native(&tile[src..src + cw * px], spec.format, out, x0 as usize * nch)?;
    }
    Ok(())
}
