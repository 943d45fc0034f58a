//! TIFF input tests over files written with the `tiff` encoder.

#![cfg(feature = "tiff")]

use imgin_io::{BaseType, ImageInput, ImageSpec, IoError};
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};

fn rgb8(width: u32, height: u32) -> Vec<u8> {
    (0..width * height * 3).map(|i| (i % 251) as u8).collect()
}

fn gray16(width: u32, height: u32) -> Vec<u16> {
    (0..width * height).map(|i| (i * 1000) as u16).collect()
}

/// Page 0: RGB8, page 1: Gray16, page 2: Gray32Float.
fn write_pages(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("pages.tif");
    let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::RGB8>(256, 64, &rgb8(256, 64))
        .unwrap();
    encoder
        .write_image::<colortype::Gray16>(5, 3, &gray16(5, 3))
        .unwrap();
    encoder
        .write_image::<colortype::Gray32Float>(2, 2, &[0.0, 0.5, 1.5, -1.0])
        .unwrap();
    path
}

const TILED_W: u32 = 20;
const TILED_H: u32 = 24;
const TILE: u32 = 16;

fn tiled_value(x: u32, y: u32) -> u8 {
    ((x * 7 + y * 11) % 251) as u8
}

/// Little-endian, uncompressed 8-bit gray TIFF of 20x24 in 16x16 tiles.
///
/// Tiles are stored full size; the padding holds 0xEE so a reader that
/// leaks it is caught.
fn write_tiled(dir: &TempDir) -> PathBuf {
    let (across, down) = (TILED_W.div_ceil(TILE), TILED_H.div_ceil(TILE));
    let tiles = across * down;
    let tile_bytes = TILE * TILE;

    let entries: [(u16, u16, u32, u32); 10] = [
        (256, 3, 1, TILED_W), // ImageWidth
        (257, 3, 1, TILED_H), // ImageLength
        (258, 3, 1, 8),       // BitsPerSample
        (259, 3, 1, 1),       // Compression: none
        (262, 3, 1, 1),       // Photometric: BlackIsZero
        (277, 3, 1, 1),       // SamplesPerPixel
        (322, 3, 1, TILE),    // TileWidth
        (323, 3, 1, TILE),    // TileLength
        (324, 4, tiles, 0),   // TileOffsets, patched below
        (325, 4, tiles, 0),   // TileByteCounts, patched below
    ];
    let ifd_len = 2 + entries.len() as u32 * 12 + 4;
    let offsets_at = 8 + ifd_len;
    let counts_at = offsets_at + 4 * tiles;
    let data_at = counts_at + 4 * tiles;

    let mut out = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, count, value) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        let value = match tag {
            324 => offsets_at,
            325 => counts_at,
            _ => value,
        };
        if kind == 3 {
            out.extend_from_slice(&(value as u16).to_le_bytes());
            out.extend_from_slice(&[0, 0]);
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());

    for t in 0..tiles {
        out.extend_from_slice(&(data_at + t * tile_bytes).to_le_bytes());
    }
    for _ in 0..tiles {
        out.extend_from_slice(&tile_bytes.to_le_bytes());
    }
    for ty in 0..down {
        for tx in 0..across {
            for j in 0..TILE {
                for i in 0..TILE {
                    let (x, y) = (tx * TILE + i, ty * TILE + j);
                    out.push(if x < TILED_W && y < TILED_H { tiled_value(x, y) } else { 0xEE });
                }
            }
        }
    }
    assert_eq!(out.len() as u32, data_at + tiles * tile_bytes);

    let path = dir.path().join("tiled.tif");
    std::fs::write(&path, out).unwrap();
    path
}

fn open(path: &Path) -> ImageInput {
    ImageInput::open(path).expect("open tiff")
}

#[test]
fn first_page_spec() {
    let dir = TempDir::new().unwrap();
    let input = open(&write_pages(&dir));

    assert_eq!(input.format_name(), "tiff");
    assert!(input.supports("multiimage"));
    assert!(input.supports("random_access"));
    assert!(input.supports("tiles"));
    assert!(!input.supports("mipmap"));

    let spec = input.spec().unwrap();
    assert_eq!((spec.width, spec.height, spec.nchannels), (256, 64, 3));
    assert_eq!(spec.format, BaseType::UInt8);
    assert!(!spec.is_tiled());
    assert_eq!(spec.get_int("BitsPerSample"), Some(8));
}

#[test]
fn strips_read_as_scanlines() {
    let dir = TempDir::new().unwrap();
    let mut input = open(&write_pages(&dir));
    let expected = rgb8(256, 64);

    let image = input.read_image_typed(BaseType::UInt8, None).unwrap();
    assert_eq!(image.as_u8().unwrap(), &expected[..]);

    // out of order, across strip boundaries
    for y in [63, 0, 40, 11] {
        let row = input.read_scanline_typed(y, 0, BaseType::UInt8).unwrap();
        let start = y as usize * 256 * 3;
        assert_eq!(row.as_u8().unwrap(), &expected[start..start + 256 * 3]);
    }

    // stripped pages have no tiles
    assert!(matches!(input.read_tile(0, 0, 0), Err(IoError::UnsupportedOperation(_))));
}

#[test]
fn seek_between_pages() {
    let dir = TempDir::new().unwrap();
    let mut input = open(&write_pages(&dir));
    let mut spec = ImageSpec::default();

    assert!(input.seek_subimage(1, Some(&mut spec)));
    assert_eq!((spec.width, spec.height, spec.nchannels), (5, 3, 1));
    assert_eq!(spec.format, BaseType::UInt16);
    let gray = input.read_image_typed(BaseType::UInt16, None).unwrap();
    assert_eq!(gray.as_u16().unwrap(), &gray16(5, 3)[..]);

    assert!(input.seek_subimage(2, Some(&mut spec)));
    assert_eq!(spec.format, BaseType::Float);
    assert_eq!(input.read_image().unwrap(), vec![0.0, 0.5, 1.5, -1.0]);

    assert!(input.seek_subimage(0, Some(&mut spec)));
    assert_eq!(spec.width, 256);
    let row = input.read_scanline_typed(1, 0, BaseType::UInt8).unwrap();
    assert_eq!(row.as_u8().unwrap()[0], (256 * 3 % 251) as u8);
}

#[test]
fn seek_past_last_page_fails() {
    let dir = TempDir::new().unwrap();
    let mut input = open(&write_pages(&dir));

    assert!(input.seek_subimage(1, None));
    assert!(!input.seek_subimage(3, None));
    assert!(input.last_error().unwrap().contains("seek failed"));
    assert_eq!(input.current_subimage(), 1);
    assert_eq!(input.spec().map(|s| s.width), Some(5));

    // still readable at the old position
    assert_eq!(input.read_scanline(2, 0).unwrap().len(), 5);
    assert!(!input.seek_miplevel(1, 1, None));
}

#[test]
fn two_page_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("two.tiff");
    let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
    for _ in 0..2 {
        encoder
            .write_image::<colortype::RGB8>(8, 8, &rgb8(8, 8))
            .unwrap();
    }
    drop(encoder);

    let mut input = open(&path);
    assert!(input.seek_subimage(1, None));
    assert!(!input.seek_subimage(2, None));
    assert_eq!(input.current_subimage(), 1);
    assert_eq!(input.read_image().unwrap().len(), 8 * 8 * 3);
}

#[test]
fn garbage_with_tiff_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bogus.tif");
    std::fs::write(&path, b"II*\0not really a tiff").unwrap();

    let sniffer = ImageInput::create("tiff").unwrap();
    assert!(sniffer.valid_file(&path));
    assert!(ImageInput::open(&path).is_err());
}

#[test]
fn tiled_page_spec() {
    let dir = TempDir::new().unwrap();
    let input = open(&write_tiled(&dir));

    let spec = input.spec().unwrap();
    assert!(spec.is_tiled());
    assert_eq!((spec.width, spec.height, spec.nchannels), (TILED_W, TILED_H, 1));
    assert_eq!((spec.tile_width, spec.tile_height), (TILE, TILE));
    assert_eq!(spec.format, BaseType::UInt8);
}

#[test]
fn tiled_page_tiles_and_edge_padding() {
    let dir = TempDir::new().unwrap();
    let mut input = open(&write_tiled(&dir));

    // each tile of the 2x2 grid, including the corner one cropped both ways
    for (x0, y0) in [(0, 0), (16, 0), (0, 16), (16, 16)] {
        let tile = input.read_tile_typed(x0 as i32, y0 as i32, 0, BaseType::UInt8).unwrap();
        let tile = tile.as_u8().unwrap();
        assert_eq!(tile.len(), (TILE * TILE) as usize);
        for j in 0..TILE {
            for i in 0..TILE {
                let (x, y) = (x0 + i, y0 + j);
                let expected = if x < TILED_W && y < TILED_H { tiled_value(x, y) } else { 0 };
                assert_eq!(tile[(j * TILE + i) as usize], expected, "tile ({x0}, {y0}) at ({i}, {j})");
            }
        }
    }

    assert!(matches!(input.read_tile(8, 0, 0), Err(IoError::OutOfBounds(_))));
    assert!(matches!(input.read_tile(0, 32, 0), Err(IoError::OutOfBounds(_))));
}

#[test]
fn tiled_page_image_matches_scanlines() {
    let dir = TempDir::new().unwrap();
    let mut input = open(&write_tiled(&dir));

    let image = input.read_image_typed(BaseType::UInt8, None).unwrap();
    let image = image.as_u8().unwrap().to_vec();
    let expected: Vec<u8> = (0..TILED_H)
        .flat_map(|y| (0..TILED_W).map(move |x| tiled_value(x, y)))
        .collect();
    assert_eq!(image, expected);

    let w = TILED_W as usize;
    for y in [23, 0, 16, 15, 7] {
        let row = input.read_scanline_typed(y, 0, BaseType::UInt8).unwrap();
        let start = y as usize * w;
        assert_eq!(row.as_u8().unwrap(), &image[start..start + w], "row {y}");
    }
}
