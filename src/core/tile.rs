//! Tiles: materialized rectangular pixel blocks of one band.
//!
//! A [`Tile`] pairs a [`Rectangle`] (in raster coordinates) with a typed
//! sample buffer. Samples can be addressed by buffer index or by absolute
//! raster `(x, y)` coordinates, and read or written as `f64` or `i64`.
//! Writing a float into an integer tile truncates toward zero and saturates
//! at the type's range.

use crate::core::error::{OperatorError, OperatorResult};
use crate::core::rect::Rectangle;
use crate::core::types::PixelType;

/// Typed sample buffer, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    /// Signed 8-bit samples
    Int8(Vec<i8>),
    /// Unsigned 8-bit samples
    UInt8(Vec<u8>),
    /// Signed 16-bit samples
    Int16(Vec<i16>),
    /// Unsigned 16-bit samples
    UInt16(Vec<u16>),
    /// Signed 32-bit samples
    Int32(Vec<i32>),
    /// Unsigned 32-bit samples
    UInt32(Vec<u32>),
    /// 32-bit float samples
    Float32(Vec<f32>),
    /// 64-bit float samples
    Float64(Vec<f64>),
}

macro_rules! with_samples {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TileData::Int8($v) => $body,
            TileData::UInt8($v) => $body,
            TileData::Int16($v) => $body,
            TileData::UInt16($v) => $body,
            TileData::Int32($v) => $body,
            TileData::UInt32($v) => $body,
            TileData::Float32($v) => $body,
            TileData::Float64($v) => $body,
        }
    };
}

impl TileData {
    /// Zero-filled buffer of `len` samples.
    pub fn zeros(pixel_type: PixelType, len: usize) -> Self {
        match pixel_type {
            PixelType::Int8 => TileData::Int8(vec![0; len]),
            PixelType::UInt8 => TileData::UInt8(vec![0; len]),
            PixelType::Int16 => TileData::Int16(vec![0; len]),
            PixelType::UInt16 => TileData::UInt16(vec![0; len]),
            PixelType::Int32 => TileData::Int32(vec![0; len]),
            PixelType::UInt32 => TileData::UInt32(vec![0; len]),
            PixelType::Float32 => TileData::Float32(vec![0.0; len]),
            PixelType::Float64 => TileData::Float64(vec![0.0; len]),
        }
    }

    /// Buffer of the given type built from `f64` samples.
    pub fn from_f64(pixel_type: PixelType, samples: &[f64]) -> Self {
        let mut data = Self::zeros(pixel_type, samples.len());
        for (i, v) in samples.iter().enumerate() {
            data.set_f64(i, *v);
        }
        data
    }

    /// Sample type of this buffer.
    pub fn pixel_type(&self) -> PixelType {
        match self {
            TileData::Int8(_) => PixelType::Int8,
            TileData::UInt8(_) => PixelType::UInt8,
            TileData::Int16(_) => PixelType::Int16,
            TileData::UInt16(_) => PixelType::UInt16,
            TileData::Int32(_) => PixelType::Int32,
            TileData::UInt32(_) => PixelType::UInt32,
            TileData::Float32(_) => PixelType::Float32,
            TileData::Float64(_) => PixelType::Float64,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        with_samples!(self, v => v.len())
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index` as `f64`. Panics if out of range.
    pub fn get_f64(&self, index: usize) -> f64 {
        with_samples!(self, v => v[index] as f64)
    }

    /// Set the sample at `index`. Panics if out of range.
    pub fn set_f64(&mut self, index: usize, value: f64) {
        with_samples!(self, v => v[index] = value as _)
    }

    /// Sample at `index` as `i64`. Panics if out of range.
    pub fn get_i64(&self, index: usize) -> i64 {
        with_samples!(self, v => v[index] as i64)
    }

    /// Set the sample at `index`. Panics if out of range.
    pub fn set_i64(&mut self, index: usize, value: i64) {
        with_samples!(self, v => v[index] = value as _)
    }

    /// All samples as `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_samples!(self, v => v.iter().map(|s| *s as f64).collect())
    }

    /// Approximate heap size in bytes.
    pub fn memory_size(&self) -> usize {
        self.len() * self.pixel_type().size_bytes()
    }

    /// Copy a `width` x `height` block between two row-major buffers.
    ///
    /// Both buffers must share the same pixel type; otherwise samples go
    /// through `f64`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn copy_block(
        &mut self,
        dst_stride: usize,
        dst_offset: usize,
        src: &TileData,
        src_stride: usize,
        src_offset: usize,
        width: usize,
        height: usize,
    ) {
        macro_rules! rows {
            ($dst:ident, $src:ident) => {
                for row in 0..height {
                    let di = dst_offset + row * dst_stride;
                    let si = src_offset + row * src_stride;
                    $dst[di..di + width].copy_from_slice(&$src[si..si + width]);
                }
            };
        }
        match (self, src) {
            (TileData::Int8(d), TileData::Int8(s)) => rows!(d, s),
            (TileData::UInt8(d), TileData::UInt8(s)) => rows!(d, s),
            (TileData::Int16(d), TileData::Int16(s)) => rows!(d, s),
            (TileData::UInt16(d), TileData::UInt16(s)) => rows!(d, s),
            (TileData::Int32(d), TileData::Int32(s)) => rows!(d, s),
            (TileData::UInt32(d), TileData::UInt32(s)) => rows!(d, s),
            (TileData::Float32(d), TileData::Float32(s)) => rows!(d, s),
            (TileData::Float64(d), TileData::Float64(s)) => rows!(d, s),
            (dst, src) => {
                for row in 0..height {
                    for col in 0..width {
                        let value = src.get_f64(src_offset + row * src_stride + col);
                        dst.set_f64(dst_offset + row * dst_stride + col, value);
                    }
                }
            }
        }
    }
}

/// A rectangular block of samples of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    rect: Rectangle,
    data: TileData,
}

impl Tile {
    /// Allocate a zero-filled tile covering `rect`.
    pub fn new(rect: Rectangle, pixel_type: PixelType) -> Self {
        Self {
            rect,
            data: TileData::zeros(pixel_type, rect.area() as usize),
        }
    }

    /// Wrap an existing buffer. Its length must match the rectangle's area.
    pub fn from_data(rect: Rectangle, data: TileData) -> OperatorResult<Self> {
        if data.len() as u64 != rect.area() {
            return Err(OperatorError::BufferMismatch(format!(
                "{} samples supplied for tile {}",
                data.len(),
                rect
            )));
        }
        Ok(Self { rect, data })
    }

    /// Rectangle covered by this tile, in raster coordinates.
    pub fn rectangle(&self) -> Rectangle {
        self.rect
    }

    /// Leftmost column.
    pub fn min_x(&self) -> u32 {
        self.rect.x
    }

    /// Topmost row.
    pub fn min_y(&self) -> u32 {
        self.rect.y
    }

    /// Rightmost column (inclusive).
    pub fn max_x(&self) -> u32 {
        self.rect.right().saturating_sub(1)
    }

    /// Bottom row (inclusive).
    pub fn max_y(&self) -> u32 {
        self.rect.bottom().saturating_sub(1)
    }

    /// Tile width.
    pub fn width(&self) -> u32 {
        self.rect.width
    }

    /// Tile height.
    pub fn height(&self) -> u32 {
        self.rect.height
    }

    /// Sample type.
    pub fn pixel_type(&self) -> PixelType {
        self.data.pixel_type()
    }

    /// Underlying sample buffer.
    pub fn data(&self) -> &TileData {
        &self.data
    }

    /// Mutable sample buffer.
    pub fn data_mut(&mut self) -> &mut TileData {
        &mut self.data
    }

    /// Consume the tile, returning its buffer.
    pub fn into_data(self) -> TileData {
        self.data
    }

    /// Buffer index of the absolute pixel `(x, y)`, if inside the tile.
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if !self.rect.contains(x, y) {
            return None;
        }
        Some((y - self.rect.y) as usize * self.rect.width as usize + (x - self.rect.x) as usize)
    }

    fn expect_index(&self, x: u32, y: u32) -> usize {
        match self.index_of(x, y) {
            Some(index) => index,
            None => panic!("pixel ({}, {}) outside tile {}", x, y, self.rect),
        }
    }

    /// Sample at absolute `(x, y)`. Panics outside the tile.
    pub fn sample_f64(&self, x: u32, y: u32) -> f64 {
        self.data.get_f64(self.expect_index(x, y))
    }

    /// Set the sample at absolute `(x, y)`. Panics outside the tile.
    pub fn set_sample_f64(&mut self, x: u32, y: u32, value: f64) {
        let index = self.expect_index(x, y);
        self.data.set_f64(index, value);
    }

    /// Integer sample at absolute `(x, y)`. Panics outside the tile.
    pub fn sample_i64(&self, x: u32, y: u32) -> i64 {
        self.data.get_i64(self.expect_index(x, y))
    }

    /// Set an integer sample at absolute `(x, y)`. Panics outside the tile.
    pub fn set_sample_i64(&mut self, x: u32, y: u32, value: i64) {
        let index = self.expect_index(x, y);
        self.data.set_i64(index, value);
    }

    /// Sample at buffer `index`.
    pub fn get_f64(&self, index: usize) -> f64 {
        self.data.get_f64(index)
    }

    /// Set the sample at buffer `index`.
    pub fn set_f64(&mut self, index: usize, value: f64) {
        self.data.set_f64(index, value);
    }

    /// Fill every sample with `value`.
    pub fn fill_f64(&mut self, value: f64) {
        for i in 0..self.data.len() {
            self.data.set_f64(i, value);
        }
    }

    /// All samples as `f64`, row-major.
    pub fn samples_f64(&self) -> Vec<f64> {
        self.data.to_f64_vec()
    }

    /// Absolute pixel positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = (u32, u32)> {
        let rect = self.rect;
        (rect.y..rect.bottom()).flat_map(move |y| (rect.x..rect.right()).map(move |x| (x, y)))
    }

    /// Copy the overlapping region of `other` into this tile.
    ///
    /// Returns the rectangle that was copied (empty if disjoint).
    pub fn copy_from(&mut self, other: &Tile) -> Rectangle {
        let overlap = self.rect.intersection(&other.rect);
        if overlap.is_empty() {
            return overlap;
        }
        let dst_offset = (overlap.y - self.rect.y) as usize * self.rect.width as usize
            + (overlap.x - self.rect.x) as usize;
        let src_offset = (overlap.y - other.rect.y) as usize * other.rect.width as usize
            + (overlap.x - other.rect.x) as usize;
        self.data.copy_block(
            self.rect.width as usize,
            dst_offset,
            &other.data,
            other.rect.width as usize,
            src_offset,
            overlap.width as usize,
            overlap.height as usize,
        );
        overlap
    }

    /// Extract a sub-tile. `rect` must lie inside this tile.
    pub fn sub_tile(&self, rect: Rectangle) -> OperatorResult<Tile> {
        if !self.rect.contains_rect(&rect) {
            return Err(OperatorError::BufferMismatch(format!(
                "{} is not inside tile {}",
                rect, self.rect
            )));
        }
        let mut tile = Tile::new(rect, self.pixel_type());
        tile.copy_from(self);
        Ok(tile)
    }

    /// Approximate heap size in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Tile>() + self.data.memory_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_addressing() {
        let mut tile = Tile::new(Rectangle::new(10, 20, 4, 3), PixelType::Float32);
        tile.set_sample_f64(11, 21, 2.5);
        assert_eq!(tile.index_of(11, 21), Some(5));
        assert_eq!(tile.get_f64(5), 2.5);
        assert_eq!(tile.index_of(14, 20), None);
        assert_eq!(tile.max_x(), 13);
        assert_eq!(tile.max_y(), 22);
    }

    #[test]
    fn test_integer_tiles_truncate_and_saturate() {
        let mut tile = Tile::new(Rectangle::new(0, 0, 3, 1), PixelType::UInt8);
        tile.set_f64(0, 3.9);
        tile.set_f64(1, 300.0);
        tile.set_f64(2, -5.0);
        assert_eq!(tile.samples_f64(), vec![3.0, 255.0, 0.0]);
    }

    #[test]
    fn test_from_data_checks_length() {
        let rect = Rectangle::new(0, 0, 2, 2);
        assert!(Tile::from_data(rect, TileData::Int16(vec![1, 2, 3])).is_err());
        let tile = Tile::from_data(rect, TileData::Int16(vec![1, 2, 3, 4])).unwrap();
        assert_eq!(tile.sample_i64(1, 1), 4);
    }

    #[test]
    fn test_copy_from_overlap() {
        let mut src = Tile::new(Rectangle::new(0, 0, 4, 4), PixelType::Float64);
        for (i, (x, y)) in src.positions().collect::<Vec<_>>().into_iter().enumerate() {
            src.set_sample_f64(x, y, i as f64);
        }
        let sub = src.sub_tile(Rectangle::new(1, 1, 2, 2)).unwrap();
        assert_eq!(sub.samples_f64(), vec![5.0, 6.0, 9.0, 10.0]);

        let mut dst = Tile::new(Rectangle::new(3, 3, 2, 2), PixelType::Int32);
        let copied = dst.copy_from(&src);
        assert_eq!(copied, Rectangle::new(3, 3, 1, 1));
        assert_eq!(dst.sample_i64(3, 3), 15);
        assert_eq!(dst.sample_i64(4, 4), 0);
    }
}
