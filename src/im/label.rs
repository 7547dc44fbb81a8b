use super::core::LabelIm;

/// Collect the 4-connected run of pixels equal to `value` that contains `start`.
///
/// `seen` is shared between calls and holds the id of the last component that claimed
/// each pixel, so it never needs clearing. Returned indices are sorted.
fn flood_run(im: &LabelIm, seen: &mut [u32], id: u32, start: usize, value: u32) -> Vec<usize> {
    let (w, h) = (im.w, im.h);
    assert!(start < w * h, "start index out of bounds");
    assert_eq!(seen.len(), w * h, "seen buffer size mismatch");

    let mut run: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = vec![start];
    seen[start] = id;

    while let Some(i) = stack.pop() {
        run.push(i);
        let (x, y) = (i % w, i / w);

        let mut push = |j: usize| {
            if seen[j] != id && im.arr[j] == value {
                seen[j] = id;
                stack.push(j);
            }
        };
        if x > 0 {
            push(i - 1);
        }
        if x + 1 < w {
            push(i + 1);
        }
        if y > 0 {
            push(i - w);
        }
        if y + 1 < h {
            push(i + w);
        }
    }

    run.sort_unstable();
    run
}

/// One 4-connected component of a label plane.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    /// Input label the component carries.
    pub value: u32,
    /// Row-major pixel indices, sorted.
    pub pixel_iz: Vec<usize>,
}

impl LabelInfo {
    pub fn size(&self) -> usize {
        self.pixel_iz.len()
    }
}

/// Label the 4-connected components of equal nonzero value in a label plane.
///
/// Touching regions with different values stay separate components, unlike a binary
/// foreground labeling that would join them. Ids are handed out in row-major order of
/// each component's first pixel, starting at 1; the returned table is indexed by id
/// with `[0]` reserved for background.
pub fn label_im(im: &LabelIm) -> (LabelIm, Vec<LabelInfo>) {
    assert_eq!(im.s, im.w, "label planes are single channel");
    let mut out = LabelIm::new(im.w, im.h);
    let mut seen: Vec<u32> = vec![0; im.arr.len()];
    let mut infos: Vec<LabelInfo> = vec![LabelInfo::default()];

    for start in 0..im.arr.len() {
        let value = im.arr[start];
        if value == 0 || seen[start] != 0 {
            continue;
        }

        // A plane has fewer components than pixels, and planes stay well under u32::MAX.
        let id = infos.len() as u32;
        let pixel_iz = flood_run(im, &mut seen, id, start, value);
        for &i in &pixel_iz {
            out.arr[i] = id;
        }
        infos.push(LabelInfo { value, pixel_iz });
    }

    (out, infos)
}

// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::im_from_ascii;

    #[test]
    fn flood_run_stops_at_other_values() {
        let im = im_from_ascii(
            r#"
                7700
                7730
                0007
            "#,
        );
        let mut seen = vec![0u32; 12];

        let run = flood_run(&im, &mut seen, 1, 0, 7);
        assert_eq!(run, vec![0, 1, 4, 5]);
        assert_eq!(seen[11], 0, "diagonal 7 is not connected");
        assert_eq!(seen[6], 0, "the 3 is a different value");
    }

    #[test]
    fn components_are_numbered_in_scan_order() {
        let im = im_from_ascii(
            r#"
                0099
                0770
                0770
            "#,
        );

        let (cc, infos) = label_im(&im);

        // [0] is reserved.
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[1].value, 9);
        assert_eq!(infos[1].size(), 2);
        assert_eq!(infos[2].value, 7);
        assert_eq!(infos[2].pixel_iz, vec![5, 6, 9, 10]);
        assert_eq!(cc.arr, vec![0, 0, 1, 1, 0, 2, 2, 0, 0, 2, 2, 0]);
    }

    #[test]
    fn touching_values_stay_separate_and_diagonals_split() {
        let im = im_from_ascii(
            r#"
                1120
                1100
                0012
            "#,
        );

        let (cc, infos) = label_im(&im);

        // 1-block, the 2 at (2,0), the diagonal 1 at (2,2), the 2 at (3,2).
        assert_eq!(infos.len(), 5);
        assert_eq!(cc.arr, vec![1, 1, 2, 0, 1, 1, 0, 0, 0, 0, 3, 4]);
        assert_eq!(infos[1].pixel_iz, vec![0, 1, 4, 5]);
        assert_eq!(infos[3].value, 1);
    }

    #[test]
    fn empty_image_has_only_background() {
        let (cc, infos) = label_im(&LabelIm::new(0, 0));
        assert!(cc.arr.is_empty());
        assert_eq!(infos.len(), 1);
    }
}
