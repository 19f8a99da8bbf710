//! Axis-aligned rectangles in raster pixel coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rectangular region within a raster.
///
/// Rectangles are half-open: `x..x + width`, `y..y + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    /// X offset from the raster origin
    pub x: u32,
    /// Y offset from the raster origin
    pub y: u32,
    /// Width of the region
    pub width: u32,
    /// Height of the region
    pub height: u32,
}

impl Rectangle {
    /// Create a new rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole raster of the given size.
    pub fn of_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Get the right edge coordinate (exclusive).
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Get the bottom edge coordinate (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Calculate the area of this region in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the pixel `(x, y)` lies inside.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rectangle) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Intersection of two rectangles. Empty (zero-sized) if disjoint.
    pub fn intersection(&self, other: &Rectangle) -> Rectangle {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return Rectangle::new(x, y, 0, 0);
        }
        Rectangle::new(x, y, right - x, bottom - y)
    }

    /// Clamp this rectangle to the bounds of a `width` x `height` raster.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rectangle {
        self.intersection(&Rectangle::of_size(width, height))
    }

    /// Check if this region is entirely within the given bounds.
    pub fn is_within_bounds(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Shift the rectangle by a (possibly negative) offset, saturating at zero.
    pub fn translate(&self, dx: i64, dy: i64) -> Rectangle {
        let shift = |v: u32, d: i64| (v as i64 + d).clamp(0, u32::MAX as i64) as u32;
        Rectangle::new(shift(self.x, dx), shift(self.y, dy), self.width, self.height)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{} {}x{}]", self.x, self.y, self.width, self.height)
    }
}

/// Iterator over the tile grid of a raster, row by row.
///
/// Edge tiles are cropped to the raster bounds.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    next_x: u32,
    next_y: u32,
}

impl TileGrid {
    /// Create a grid over a `width` x `height` raster.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            next_x: 0,
            next_y: 0,
        }
    }

    /// Number of tiles horizontally.
    pub fn tiles_x(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    /// Number of tiles vertically.
    pub fn tiles_y(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles_x() as usize * self.tiles_y() as usize
    }
}

impl Iterator for TileGrid {
    type Item = Rectangle;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_y >= self.height || self.width == 0 {
            return None;
        }
        let rect = Rectangle::new(self.next_x, self.next_y, self.tile_width, self.tile_height)
            .clamp_to(self.width, self.height);

        self.next_x += self.tile_width;
        if self.next_x >= self.width {
            self.next_x = 0;
            self.next_y += self.tile_height;
        }
        Some(rect)
    }
}
