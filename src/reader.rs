//! Rebuild a body volume from a plane-local superpixel map and its two tables.

use crate::error::{Error, Result};
use crate::fmap::{ForwardMap, UnmappedPolicy};
use crate::hierarchy::PlaneTriple;
use crate::im::{LabelVol, WeightVol};
use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::debug;

/// Optional seeded region growing after decoding.
#[derive(Debug, Clone, Copy, Default)]
pub enum Refine<'a> {
    #[default]
    Off,
    /// Grow seeds over a flat field.
    Uniform,
    /// Grow seeds over a per-voxel weight field, lowest weights first.
    Weighted(&'a WeightVol),
}

/// Dense fine → mid map for every plane of the volume.
///
/// The lowest plane index in the table corresponds to plane 0 of the volume. A fine id
/// listed over both segment 0 and a real segment decodes to the real one.
fn plane_maps(fine_to_mid: &[PlaneTriple], n_planes: usize) -> Result<Vec<ForwardMap>> {
    let start_plane = fine_to_mid.iter().map(|t| t.plane).min().unwrap_or(0) as usize;

    let mut rows: Vec<Vec<(u32, u32)>> = vec![Vec::new(); n_planes];
    for t in fine_to_mid {
        let z = t.plane as usize - start_plane;
        if z >= n_planes {
            return Err(Error::ShapeMismatch(format!(
                "table plane {} is outside the {n_planes} planes starting at {start_plane}",
                t.plane
            )));
        }
        rows[z].push((t.fine, t.mid));
    }

    rows.iter().map(|r| ForwardMap::from_plane_rows(r)).collect()
}

/// Decode `fine` through both tables: per-plane fine → mid, then global mid → body.
pub fn decode(
    fine: &LabelVol,
    fine_to_mid: &[PlaneTriple],
    mid_to_body: &[(u32, u32)],
    policy: UnmappedPolicy,
) -> Result<LabelVol> {
    let maps = plane_maps(fine_to_mid, fine.d)?;
    let body_map = ForwardMap::from_pairs(mid_to_body)?;

    let mut mid = LabelVol::new(fine.d, fine.h, fine.w);
    let plane_len = fine.plane_len();
    if plane_len > 0 {
        mid.arr
            .par_chunks_mut(plane_len)
            .zip(fine.arr.par_chunks(plane_len))
            .zip(maps.par_iter())
            .try_for_each(|((out, src), map)| map.apply_slice(src, out, policy))?;
    }

    body_map.apply(&mid, policy)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Front {
    weight: f32,
    order: u64,
    idx: usize,
}

impl Eq for Front {}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.order.cmp(&other.order))
    }
}

/// Seeded region growing: every nonzero voxel of `seeds` is a seed, and unlabeled voxels
/// take the label of whichever front reaches them first, cheapest weight first
/// (6-connected, ties broken by insertion order).
pub fn refine(seeds: &LabelVol, weights: Option<&WeightVol>) -> Result<LabelVol> {
    if let Some(weights) = weights {
        seeds.check_same_shape(weights, "refine weights")?;
    }
    let weight_at = |i: usize| weights.map_or(1.0, |wv| wv.arr[i]);

    let (d, h, w) = seeds.shape();
    let mut out = seeds.clone();
    let mut heap: BinaryHeap<Reverse<Front>> = BinaryHeap::new();
    let mut order: u64 = 0;

    for (idx, &v) in seeds.arr.iter().enumerate() {
        if v != 0 {
            heap.push(Reverse(Front {
                weight: weight_at(idx),
                order,
                idx,
            }));
            order += 1;
        }
    }

    while let Some(Reverse(front)) = heap.pop() {
        let label = out.arr[front.idx];
        let x = front.idx % w;
        let y = (front.idx / w) % h;
        let z = front.idx / (w * h);

        let mut neighbors: [Option<usize>; 6] = [None; 6];
        if x > 0 {
            neighbors[0] = Some(front.idx - 1);
        }
        if x + 1 < w {
            neighbors[1] = Some(front.idx + 1);
        }
        if y > 0 {
            neighbors[2] = Some(front.idx - w);
        }
        if y + 1 < h {
            neighbors[3] = Some(front.idx + w);
        }
        if z > 0 {
            neighbors[4] = Some(front.idx - w * h);
        }
        if z + 1 < d {
            neighbors[5] = Some(front.idx + w * h);
        }

        for n in neighbors.into_iter().flatten() {
            if out.arr[n] != 0 {
                continue;
            }
            out.arr[n] = label;
            heap.push(Reverse(Front {
                weight: weight_at(n),
                order,
                idx: n,
            }));
            order += 1;
        }
    }

    Ok(out)
}

/// Undo the write-side corner sentinel.
///
/// When voxel (0, 0) of every plane is background and those are the only background
/// voxels in the volume, the sentinel fired on export; each corner then takes the value
/// of its right-hand neighbor. Returns whether the repair was applied.
pub fn repair_sentinel(vol: &mut LabelVol) -> bool {
    if vol.d == 0 || vol.h == 0 || vol.w < 2 {
        return false;
    }
    let plane_len = vol.plane_len();
    let corners_zero = (0..vol.d).all(|z| vol.arr[z * plane_len] == 0);
    if !corners_zero {
        return false;
    }
    let n_zeros = vol.arr.iter().filter(|&&v| v == 0).count();
    if n_zeros != vol.d {
        return false;
    }

    for z in 0..vol.d {
        vol.arr[z * plane_len] = vol.arr[z * plane_len + 1];
    }
    debug!(planes = vol.d, "repaired corner sentinel");
    true
}

/// Reconstruct the body volume: decode, optionally refine, then repair the sentinel.
pub fn reconstruct(
    fine: &LabelVol,
    fine_to_mid: &[PlaneTriple],
    mid_to_body: &[(u32, u32)],
    refine_with: Refine<'_>,
    policy: UnmappedPolicy,
) -> Result<LabelVol> {
    let decoded = decode(fine, fine_to_mid, mid_to_body, policy)?;

    let mut bodies = match refine_with {
        Refine::Off => decoded,
        Refine::Uniform => refine(&decoded, None)?,
        Refine::Weighted(weights) => refine(&decoded, Some(weights))?,
    };

    repair_sentinel(&mut bodies);
    Ok(bodies)
}

// Tests
// -----------------------------------------------------------------------------
