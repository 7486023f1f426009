use std::{collections::BTreeMap, mem::size_of, time::Instant};

use crate::{
    error::Result,
    index::{admit_range, bytes_to_mb, elapsed_ms, point_bytes, Scan, SpatialIndex},
    point::{validate_points, Bounds, DataPoint, QueryRange},
};

/// Bits per dimension for datasets of up to three dimensions.
pub const MAX_BITS_PER_DIM: u32 = 21;

// Rough per-entry bookkeeping cost of a B-tree map (node slack, edges, lengths).
const ORDERED_ENTRY_OVERHEAD: usize = 32;

/// Describes how per-dimension cell numbers are interleaved into one 64-bit code.
/// Bit `k` of dimension `d` lands at position `k * dims + d`.
#[derive(Clone, Debug, Default)]
struct MortonLayout {
    dims: usize,
    bits: u32,
    dim_masks: Vec<u64>,
}

impl MortonLayout {
    fn new(dims: usize) -> MortonLayout {
        let bits = u32::try_from(64 / dims.max(1))
            .unwrap_or(MAX_BITS_PER_DIM)
            .min(MAX_BITS_PER_DIM);
        let bits = if dims == 0 { 0 } else { bits };
        let dim_masks = (0..dims)
            .map(|d| {
                (0..bits as usize).fold(0u64, |mask, k| mask | 1u64 << (k * dims + d))
            })
            .collect();
        MortonLayout {
            dims,
            bits,
            dim_masks,
        }
    }

    fn total_bits(&self) -> usize {
        self.bits as usize * self.dims
    }

    fn max_cell(&self) -> u32 {
        if self.bits == 0 {
            0
        } else {
            u32::MAX >> (32 - self.bits)
        }
    }

    /// Scales `value` onto `[0, max_cell]`, rounding to the nearest cell.
    fn cell(&self, bounds: &Bounds, dim: usize, value: f64) -> u32 {
        let max_cell = f64::from(self.max_cell());
        let scaled = (bounds.normalize(dim, value) * max_cell).round();
        // NaN saturates to 0.
        scaled.clamp(0.0, max_cell) as u32
    }

    fn cells(&self, bounds: &Bounds, coords: &[f64]) -> Vec<u32> {
        coords
            .iter()
            .enumerate()
            .map(|(dim, &v)| self.cell(bounds, dim, v))
            .collect()
    }

    fn encode(&self, cells: &[u32]) -> u64 {
        match (self.dims, self.bits) {
            (2, MAX_BITS_PER_DIM) => spread_by_one(cells[0]) | spread_by_one(cells[1]) << 1,
            (3, MAX_BITS_PER_DIM) => {
                spread_by_two(cells[0]) | spread_by_two(cells[1]) << 1 | spread_by_two(cells[2]) << 2
            }
            _ => self.interleave(cells),
        }
    }

    fn interleave(&self, cells: &[u32]) -> u64 {
        let mut code = 0u64;
        for k in 0..self.bits as usize {
            for (d, &cell) in cells.iter().enumerate() {
                code |= u64::from((cell >> k) & 1) << (k * self.dims + d);
            }
        }
        code
    }

    fn decode_dim(&self, code: u64, dim: usize) -> u32 {
        let mut cell = 0u32;
        for k in 0..self.bits as usize {
            let bit = (code >> (k * self.dims + dim)) & 1;
            cell |= u32::try_from(bit).unwrap_or(0) << k;
        }
        cell
    }

    fn in_box(&self, code: u64, lo: &[u32], hi: &[u32]) -> bool {
        (0..self.dims).all(|d| {
            let cell = self.decode_dim(code, d);
            lo[d] <= cell && cell <= hi[d]
        })
    }

    /// Smallest code greater than `code` whose cell lies inside the box spanned by
    /// `zmin` and `zmax` (Tropf and Herzog's BIGMIN). `code` must be outside the
    /// box and between the corners. Returns `None` when no such code exists.
    fn bigmin(&self, code: u64, mut zmin: u64, mut zmax: u64) -> Option<u64> {
        let mut bigmin = None;
        for pos in (0..self.total_bits()).rev() {
            let bit = 1u64 << pos;
            let lower = self.dim_masks[pos % self.dims] & (bit - 1);
            match (code & bit != 0, zmin & bit != 0, zmax & bit != 0) {
                (false, false, true) => {
                    bigmin = Some((zmin & !lower) | bit);
                    zmax = (zmax & !bit) | lower;
                }
                (false, true, true) => return Some(zmin),
                (true, false, false) => return bigmin,
                (true, false, true) => zmin = (zmin & !lower) | bit,
                (false, false, false) | (true, true, true) => {}
                // zmin above zmax in this dimension: not a box.
                (_, true, false) => return None,
            }
        }
        bigmin
    }
}

fn spread_by_one(v: u32) -> u64 {
    let mut x = u64::from(v);
    x = (x | x << 16) & 0x0000_FFFF_0000_FFFF;
    x = (x | x << 8) & 0x00FF_00FF_00FF_00FF;
    x = (x | x << 4) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | x << 2) & 0x3333_3333_3333_3333;
    (x | x << 1) & 0x5555_5555_5555_5555
}

fn spread_by_two(v: u32) -> u64 {
    let mut x = u64::from(v) & 0x1F_FFFF;
    x = (x | x << 32) & 0x1F_0000_0000_FFFF;
    x = (x | x << 16) & 0x1F_0000_FF00_00FF;
    x = (x | x << 8) & 0x100F_00F0_0F00_F00F;
    x = (x | x << 4) & 0x10C3_0C30_C30C_30C3;
    (x | x << 2) & 0x1249_2492_4924_9249
}

/// Linearizes points along a Z-order (Morton) curve and keeps them in a B-tree.
///
/// Entries are keyed by `(code, insertion sequence)`, so points sharing a cell
/// are all kept. A query scans only the Morton window between the codes of its
/// corners and jumps over out-of-box runs with BIGMIN before the exact filter.
#[derive(Default)]
pub struct ZOrderIndex {
    entries: BTreeMap<(u64, u64), DataPoint>,
    layout: MortonLayout,
    bounds: Bounds,
    collisions: usize,
    build_time_ms: f64,
}

impl ZOrderIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits used per dimension by the current layout.
    #[must_use]
    pub fn bits_per_dimension(&self) -> u32 {
        self.layout.bits
    }

    /// Number of stored points whose Morton code equals an earlier point's.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Morton code of `coords` under the bounds of the last build.
    #[must_use]
    pub fn morton_code(&self, coords: &[f64]) -> Option<u64> {
        if self.entries.is_empty() || coords.len() != self.layout.dims {
            return None;
        }
        Some(self.layout.encode(&self.layout.cells(&self.bounds, coords)))
    }
}

impl SpatialIndex for ZOrderIndex {
    fn build(&mut self, data: &[DataPoint]) -> Result<()> {
        let start = Instant::now();
        let dims = validate_points(data)?;
        let bounds = Bounds::of(data);
        let layout = MortonLayout::new(dims);

        let mut entries = BTreeMap::new();
        for (seq, point) in (0u64..).zip(data) {
            let code = layout.encode(&layout.cells(&bounds, point.coords()));
            entries.insert((code, seq), point.clone());
        }
        let collisions = entries
            .keys()
            .zip(entries.keys().skip(1))
            .filter(|((a, _), (b, _))| a == b)
            .count();

        self.entries = entries;
        self.layout = layout;
        self.bounds = bounds;
        self.collisions = collisions;
        self.build_time_ms = elapsed_ms(start);

        if collisions > 0 {
            log::debug!("z-order: {collisions} points share a Morton code with another point");
        }
        log::debug!(
            "built z-order index: {} entries, {} bits per dimension, {:.3} ms",
            self.entries.len(),
            self.layout.bits,
            self.build_time_ms
        );
        Ok(())
    }

    fn scan(&self, range: &QueryRange) -> Result<Scan> {
        let mut scan = Scan::default();
        if !admit_range(self.layout.dims, self.entries.len(), range)? {
            return Ok(scan);
        }
        let lo = self.layout.cells(&self.bounds, range.min());
        let hi = self.layout.cells(&self.bounds, range.max());
        let zlo = self.layout.encode(&lo);
        let zhi = self.layout.encode(&hi);

        let mut cursor = zlo;
        'scan: loop {
            for (&(code, _), point) in self.entries.range((cursor, 0)..=(zhi, u64::MAX)) {
                scan.scanned += 1;
                if self.layout.in_box(code, &lo, &hi) {
                    if range.contains(point) {
                        scan.points.push(point.clone());
                    }
                } else if let Some(next) = self.layout.bigmin(code, zlo, zhi) {
                    if next > code && next <= zhi {
                        cursor = next;
                        continue 'scan;
                    }
                }
            }
            break;
        }
        Ok(scan)
    }

    fn size_mb(&self) -> f64 {
        let entry = size_of::<(u64, u64)>() + point_bytes(self.layout.dims) + ORDERED_ENTRY_OVERHEAD;
        bytes_to_mb(self.entries.len() * entry)
    }

    fn name(&self) -> &'static str {
        "Z-order"
    }

    fn build_time_ms(&self) -> f64 {
        self.build_time_ms
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.layout.dims
    }
}
