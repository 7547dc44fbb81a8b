//! Build the three level superpixel → segment → body hierarchy.
//!
//! Superpixels (fine ids) and segments (mid ids) are plane-local; bodies stay the
//! global 3D labels of the input segmentation. Two tables tie the levels together:
//! fine → mid per plane, and mid → body across the volume.

use crate::error::{Error, Result};
use crate::im::LabelVol;
use crate::relabel::{RelabelOpts, relabel_with_sentinel};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// One row of the fine → mid table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaneTriple {
    pub plane: u32,
    pub fine: u32,
    pub mid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildOpts {
    /// Per-plane components smaller than this are blacked out at both levels.
    pub min_size: usize,
    /// Relabel each plane by connected components. Needed when 3D-contiguous labels
    /// must also be contiguous within every plane.
    pub connected: bool,
}

impl BuildOpts {
    fn relabel_opts(&self, global_unique: bool) -> RelabelOpts {
        RelabelOpts {
            min_size: self.min_size,
            connected: self.connected,
            global_unique,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    /// Superpixel map, ids unique only within a plane.
    pub fine: LabelVol,
    /// Sorted by plane, then fine id.
    pub fine_to_mid: Vec<PlaneTriple>,
    /// Starts with (0, 0), then sorted by mid id.
    pub mid_to_body: Vec<(u32, u32)>,
}

/// Distinct (mid, body) pairs with mid 0 dropped and (0, 0) prepended.
fn mid_to_body_table(mid: &LabelVol, bodies: &LabelVol) -> Result<Vec<(u32, u32)>> {
    let mut table: BTreeMap<u32, u32> = BTreeMap::new();
    for (&m, &b) in mid.arr.iter().zip(&bodies.arr) {
        if m == 0 {
            continue;
        }
        let prev = *table.entry(m).or_insert(b);
        if prev != b {
            return Err(Error::AmbiguousMapping {
                id: m,
                first: prev,
                second: b,
            });
        }
    }

    let mut out = Vec::with_capacity(table.len() + 1);
    out.push((0, 0));
    out.extend(table);
    Ok(out)
}

/// Fine → mid rows of one plane, sorted by fine id.
///
/// Mid ids are masked to 0 wherever the fine id is 0, and only voxels with a nonzero
/// fine id or a zero mid id take part. A fine id seen over both mid 0 and a real mid
/// id (the corner sentinel, or a segment dropped by `min_size`) keeps the real one and
/// is logged. Two different nonzero mid ids for one fine id is an error.
fn plane_fine_to_mid(z: usize, fine: &[u32], mid: &[u32]) -> Result<Vec<PlaneTriple>> {
    let pairs: BTreeSet<(u32, u32)> = fine
        .iter()
        .zip(mid)
        .map(|(&f, &m)| (f, if f != 0 { m } else { 0 }))
        .filter(|&(f, m)| f != 0 || m == 0)
        .collect();

    let mut table: BTreeMap<u32, u32> = BTreeMap::new();
    let mut n_zero_conflicts = 0usize;
    for (f, m) in pairs {
        match table.get(&f).copied() {
            None => {
                table.insert(f, m);
            }
            Some(prev) if prev == 0 => {
                // Pairs are sorted, so (f, 0) always comes first.
                table.insert(f, m);
                n_zero_conflicts += 1;
            }
            Some(prev) => {
                return Err(Error::AmbiguousMapping {
                    id: f,
                    first: prev,
                    second: m,
                });
            }
        }
    }
    if n_zero_conflicts > 0 {
        warn!(
            plane = z,
            superpixels = n_zero_conflicts,
            "superpixels partly on background segments, kept their nonzero segment"
        );
    }

    let plane = u32::try_from(z).map_err(|_| Error::IdOverflow { plane: z })?;
    Ok(table
        .into_iter()
        .map(|(fine, mid)| PlaneTriple { plane, fine, mid })
        .collect())
}

fn n_distinct(vol: &LabelVol) -> usize {
    vol.arr.iter().collect::<BTreeSet<_>>().len()
}

/// Build the hierarchy from a superpixel volume and a body volume.
///
/// `fine_precomputed` skips relabeling `fine` when the caller already holds a
/// plane-local superpixel map (for example from an earlier export).
pub fn build(
    fine: &LabelVol,
    bodies: &LabelVol,
    opts: &BuildOpts,
    fine_precomputed: Option<LabelVol>,
) -> Result<Hierarchy> {
    fine.check_same_shape(bodies, "body volume")?;

    let fine_out = match fine_precomputed {
        Some(pre) => {
            fine.check_same_shape(&pre, "precomputed superpixel map")?;
            pre
        }
        None => relabel_with_sentinel(fine, &opts.relabel_opts(false))?,
    };
    let mid = relabel_with_sentinel(bodies, &opts.relabel_opts(true))?;

    let mid_to_body = mid_to_body_table(&mid, bodies)?;

    let plane_len = mid.plane_len();
    let per_plane: Vec<Vec<PlaneTriple>> = (0..fine_out.d)
        .into_par_iter()
        .map(|z| {
            let rows = plane_fine_to_mid(
                z,
                &fine_out.arr[z * plane_len..(z + 1) * plane_len],
                &mid.arr[z * plane_len..(z + 1) * plane_len],
            )?;
            debug!(plane = z, rows = rows.len(), "plane done");
            Ok(rows)
        })
        .collect::<Result<_>>()?;
    let fine_to_mid: Vec<PlaneTriple> = per_plane.into_iter().flatten().collect();

    info!(
        superpixels_before = n_distinct(fine),
        superpixels_after = n_distinct(&fine_out),
        segments = mid_to_body.len() - 1,
        "hierarchy built"
    );

    Ok(Hierarchy {
        fine: fine_out,
        fine_to_mid,
        mid_to_body,
    })
}

// Tests
// -----------------------------------------------------------------------------
