//! Per-plane relabeling of a label volume.
//!
//! Each plane is relabeled on its own (compacted or connected-component labeled,
//! optionally with small components removed), then every plane's ids are shifted by
//! an offset so they are unique either within the plane or across the whole volume.
//! 0 is background throughout and is never offset.

use crate::error::{Error, Result};
use crate::im::{LabelIm, LabelVol, label_im};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelabelOpts {
    /// Components (4-connected runs of one value) smaller than this become background.
    pub min_size: usize,
    /// Relabel by connected components instead of compacting the existing ids.
    /// Components are runs of one value, so touching regions with different labels
    /// never merge; merging them would put one id over two bodies.
    pub connected: bool,
    /// Offset each plane by the id count of all prior planes.
    pub global_unique: bool,
}

impl Default for RelabelOpts {
    fn default() -> Self {
        Self {
            min_size: 0,
            connected: false,
            global_unique: true,
        }
    }
}

/// Map the distinct nonzero values of `arr` onto 1..=n in order of first appearance.
/// Returns n.
fn compact_from_one(arr: &mut [u32]) -> usize {
    let mut fwd: HashMap<u32, u32> = HashMap::new();
    for v in arr.iter_mut() {
        if *v == 0 {
            continue;
        }
        let next = fwd.len() as u32 + 1;
        *v = *fwd.entry(*v).or_insert(next);
    }
    fwd.len()
}

fn remove_small_components(im: &mut LabelIm, min_size: usize) {
    let (_cc, infos) = label_im(im);
    for info in infos.iter().skip(1) {
        if info.size() < min_size {
            for &i in &info.pixel_iz {
                im.arr[i] = 0;
            }
        }
    }
}

/// Relabel one plane in place and return how many nonzero ids it now holds.
fn relabel_plane(plane: &mut [u32], w: usize, h: usize, opts: &RelabelOpts) -> usize {
    let mut im = LabelIm {
        w,
        h,
        s: w,
        arr: plane.to_vec(),
    };

    if opts.min_size > 0 {
        remove_small_components(&mut im, opts.min_size);
    }

    let n_ids = if opts.connected {
        let (cc, infos) = label_im(&im);
        im = cc;
        infos.len() - 1
    } else {
        compact_from_one(&mut im.arr)
    };

    plane.copy_from_slice(&im.arr);
    n_ids
}

/// Offset of every plane: exclusive prefix sum of the id counts, or all zeros.
pub fn plane_offsets(n_ids_per_plane: &[usize], global_unique: bool) -> Result<Vec<u32>> {
    if !global_unique {
        return Ok(vec![0; n_ids_per_plane.len()]);
    }

    let mut offsets = Vec::with_capacity(n_ids_per_plane.len());
    let mut total: u32 = 0;
    for (z, &n) in n_ids_per_plane.iter().enumerate() {
        offsets.push(total);
        total = u32::try_from(n)
            .ok()
            .and_then(|n| total.checked_add(n))
            .ok_or(Error::IdOverflow { plane: z })?;
    }
    Ok(offsets)
}

/// Relabel every plane of `vol` independently, then apply the per-plane offsets.
pub fn relabel(vol: &LabelVol, opts: &RelabelOpts) -> Result<LabelVol> {
    let mut out = vol.clone();
    let plane_len = out.plane_len();
    if plane_len == 0 {
        return Ok(out);
    }
    let (w, h) = (out.w, out.h);

    let n_ids: Vec<usize> = out
        .arr
        .par_chunks_mut(plane_len)
        .enumerate()
        .map(|(z, plane)| {
            let n = relabel_plane(plane, w, h, opts);
            debug!(plane = z, ids = n, "plane relabeled");
            n
        })
        .collect();

    // Offsets need every plane's count, so this is the barrier between the two passes.
    let offsets = plane_offsets(&n_ids, opts.global_unique)?;

    out.arr
        .par_chunks_mut(plane_len)
        .zip(offsets.par_iter())
        .filter(|(_, offset)| **offset != 0)
        .for_each(|(plane, &offset)| {
            for v in plane.iter_mut().filter(|v| **v != 0) {
                *v += offset;
            }
        });

    Ok(out)
}

/// `relabel`, then make sure background exists somewhere.
///
/// The slice-based proofreading tool needs a background pixel on every plane. When the
/// relabeled volume has no 0 at all, voxel (row 0, col 0) of every plane is forced to
/// background. This loses whatever label was there; it is a compatibility shim for that
/// tool, not a property of the label space. `reader::repair_sentinel` undoes it on import.
pub fn relabel_with_sentinel(vol: &LabelVol, opts: &RelabelOpts) -> Result<LabelVol> {
    let mut out = relabel(vol, opts)?;
    if out.plane_len() == 0 {
        return Ok(out);
    }
    if !out.arr.contains(&0) {
        let plane_len = out.plane_len();
        for z in 0..out.d {
            out.arr[z * plane_len] = 0;
        }
        if out.d > 0 {
            debug!(planes = out.d, "no background found, forced corner sentinel");
        }
    }
    Ok(out)
}

// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{plane_ids, vol_from_ascii};

    #[test]
    fn compacts_in_order_of_first_appearance() {
        let vol = vol_from_ascii(&[
            r#"
                770
                395
            "#,
        ]);
        let out = relabel(&vol, &RelabelOpts::default()).unwrap();
        assert_eq!(out.arr, vec![1, 1, 0, 2, 3, 4]);
    }

    #[test]
    fn global_offsets_are_exclusive_prefix_sums() {
        let vol = vol_from_ascii(&[
            r#"
                12
                30
            "#,
            r#"
                00
                00
            "#,
            r#"
                55
                60
            "#,
        ]);

        let out = relabel(&vol, &RelabelOpts::default()).unwrap();
        assert_eq!(out.arr, vec![1, 2, 3, 0, 0, 0, 0, 0, 4, 4, 5, 0]);

        let local = relabel(
            &vol,
            &RelabelOpts {
                global_unique: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(local.arr, vec![1, 2, 3, 0, 0, 0, 0, 0, 1, 1, 2, 0]);
    }

    #[test]
    fn plane_id_sets_are_disjoint_when_global() {
        let vol = vol_from_ascii(&[
            r#"
                1102
                3302
            "#,
            r#"
                1122
                4400
            "#,
            r#"
                9999
                0000
            "#,
        ]);
        let out = relabel(&vol, &RelabelOpts::default()).unwrap();
        let sets: Vec<_> = (0..out.d).map(|z| plane_ids(&out, z)).collect();
        for p in 0..sets.len() {
            for q in p + 1..sets.len() {
                assert!(sets[p].is_disjoint(&sets[q]), "planes {p} and {q} share ids");
            }
        }
    }

    #[test]
    fn connected_splits_disjoint_runs_of_one_value() {
        let vol = vol_from_ascii(&[
            r#"
                1101
                0001
                2200
            "#,
        ]);
        let opts = RelabelOpts {
            connected: true,
            ..Default::default()
        };
        let out = relabel(&vol, &opts).unwrap();
        assert_eq!(out.arr, vec![1, 1, 0, 2, 0, 0, 0, 2, 3, 3, 0, 0]);
    }

    #[test]
    fn min_size_drops_small_components_to_background() {
        let vol = vol_from_ascii(&[
            r#"
                1101
                1000
                0022
            "#,
        ]);
        let opts = RelabelOpts {
            min_size: 2,
            ..Default::default()
        };
        let out = relabel(&vol, &opts).unwrap();
        // The lone 1 at (3,0) is its own 1-voxel component.
        assert_eq!(out.arr, vec![1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 2, 2]);
    }

    #[test]
    fn background_is_preserved_for_every_setting() {
        let vol = vol_from_ascii(&[
            r#"
                1203
                4500
            "#,
            r#"
                0660
                7708
            "#,
        ]);
        for connected in [false, true] {
            for global_unique in [false, true] {
                let opts = RelabelOpts {
                    min_size: 0,
                    connected,
                    global_unique,
                };
                let out = relabel(&vol, &opts).unwrap();
                for (a, b) in vol.arr.iter().zip(&out.arr) {
                    assert_eq!(*a == 0, *b == 0, "{opts:?}");
                }
            }
        }
    }

    #[test]
    fn relabel_is_idempotent() {
        let vol = vol_from_ascii(&[
            r#"
                9913
                9033
                0012
            "#,
            r#"
                4444
                0000
                5060
            "#,
        ]);
        for connected in [false, true] {
            for min_size in [0, 2] {
                let opts = RelabelOpts {
                    min_size,
                    connected,
                    global_unique: true,
                };
                let once = relabel(&vol, &opts).unwrap();
                let twice = relabel(&once, &opts).unwrap();
                assert_eq!(once, twice, "{opts:?}");
            }
        }
    }

    #[test]
    fn degenerate_volumes_do_not_panic() {
        let empty = LabelVol::new(0, 0, 0);
        assert_eq!(relabel(&empty, &RelabelOpts::default()).unwrap(), empty);

        let single = LabelVol::from_raw(1, 1, 1, vec![42]).unwrap();
        assert_eq!(relabel(&single, &RelabelOpts::default()).unwrap().arr, vec![1]);

        let blank = LabelVol::new(2, 3, 3);
        assert_eq!(relabel(&blank, &RelabelOpts::default()).unwrap(), blank);
    }

    #[test]
    fn sentinel_forced_only_when_volume_has_no_background() {
        let full = vol_from_ascii(&["12\n34", "55\n55"]);
        let out = relabel_with_sentinel(&full, &RelabelOpts::default()).unwrap();
        assert_eq!(out.arr, vec![0, 2, 3, 4, 0, 5, 5, 5]);

        // One zero anywhere in the volume is enough.
        let sparse = vol_from_ascii(&["12\n34", "55\n50"]);
        let out = relabel_with_sentinel(&sparse, &RelabelOpts::default()).unwrap();
        assert_eq!(out.arr, vec![1, 2, 3, 4, 5, 5, 5, 0]);
    }

    #[test]
    fn zero_area_planes_get_no_sentinel() {
        let flat = LabelVol::new(2, 0, 3);
        assert_eq!(relabel_with_sentinel(&flat, &RelabelOpts::default()).unwrap(), flat);
    }

    #[test]
    fn offsets_overflow_is_an_error() {
        let err = plane_offsets(&[u32::MAX as usize, 1, 1], true).unwrap_err();
        assert!(matches!(err, Error::IdOverflow { plane: 1 }));
        assert_eq!(plane_offsets(&[3, 0, 2], true).unwrap(), vec![0, 3, 3]);
        assert_eq!(plane_offsets(&[3, 0, 2], false).unwrap(), vec![0, 0, 0]);
    }
}
