use crate::im::{LabelIm, LabelVol};
use std::collections::{BTreeSet, HashSet};

/// One digit per pixel, one line per row. Blank lines and indentation are ignored.
pub fn im_from_ascii(grid: &str) -> LabelIm {
    let rows: Vec<&str> = grid
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let h = rows.len();
    assert!(h > 0, "grid must have at least one non-empty row");
    let w = rows[0].len();
    assert!(w > 0, "grid rows must be non-empty");
    for r in &rows {
        assert_eq!(r.len(), w, "all rows must have equal length");
    }

    let mut im = LabelIm::new(w, h);
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            let v = ch
                .to_digit(10)
                .unwrap_or_else(|| panic!("invalid label char '{ch}', expected digit"));
            im.arr[y * im.s + x] = v;
        }
    }
    im
}

/// One ascii grid per plane.
pub fn vol_from_ascii(planes: &[&str]) -> LabelVol {
    let ims: Vec<LabelIm> = planes.iter().map(|p| im_from_ascii(p)).collect();
    LabelVol::from_planes(&ims).unwrap()
}

pub fn vol_to_ascii(vol: &LabelVol) -> String {
    let mut out = String::new();
    for z in 0..vol.d {
        for y in 0..vol.h {
            for x in 0..vol.w {
                let v = vol.arr[vol.idx(z, y, x)];
                let ch = match v {
                    0..=9 => (b'0' + (v as u8)) as char,
                    10..=35 => (b'A' + ((v as u8) - 10)) as char,
                    _ => '*',
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Nonzero ids on plane `z`.
pub fn plane_ids(vol: &LabelVol, z: usize) -> HashSet<u32> {
    vol.plane_slice(z).iter().copied().filter(|&v| v != 0).collect()
}

/// (id, id) for every distinct id in `vol`.
pub fn identity_pairs(vol: &LabelVol) -> Vec<(u32, u32)> {
    let ids: BTreeSet<u32> = vol.arr.iter().copied().collect();
    ids.into_iter().map(|v| (v, v)).collect()
}
