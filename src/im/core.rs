use crate::error::{Error, Result};

/// A single plane, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Im<T, const N_CH: usize> {
    pub w: usize,
    pub h: usize,
    pub s: usize, // stride in elements (w * N_CH)
    pub arr: Vec<T>,
}

// Constructor
// -----------------------------------------------------------------------------
impl<T: Copy + Default, const N_CH: usize> Im<T, N_CH> {
    pub fn new(w: usize, h: usize) -> Self {
        let s = w * N_CH;
        let arr = vec![T::default(); s * h];
        Self { w, h, s, arr }
    }

    pub fn from_raw(w: usize, h: usize, arr: Vec<T>) -> Result<Self> {
        let s = w * N_CH;
        if arr.len() != s * h {
            return Err(Error::ShapeMismatch(format!(
                "{} elements for a {w}x{h}x{N_CH} image",
                arr.len()
            )));
        }
        Ok(Self { w, h, s, arr })
    }
}

/// A stack of single channel planes, axis order (plane, row, col).
#[derive(Debug, Clone, PartialEq)]
pub struct Vol<T> {
    pub d: usize,
    pub h: usize,
    pub w: usize,
    pub arr: Vec<T>,
}

impl<T: Copy + Default> Vol<T> {
    pub fn new(d: usize, h: usize, w: usize) -> Self {
        Self {
            d,
            h,
            w,
            arr: vec![T::default(); d * h * w],
        }
    }

    pub fn from_raw(d: usize, h: usize, w: usize, arr: Vec<T>) -> Result<Self> {
        if arr.len() != d * h * w {
            return Err(Error::ShapeMismatch(format!(
                "{} elements for a {d}x{h}x{w} volume",
                arr.len()
            )));
        }
        Ok(Self { d, h, w, arr })
    }

    /// Stack planes in order. All planes must share one size.
    pub fn from_planes(planes: &[Im<T, 1>]) -> Result<Self> {
        let Some(first) = planes.first() else {
            return Ok(Self::new(0, 0, 0));
        };
        let (w, h) = (first.w, first.h);

        let mut arr = Vec::with_capacity(planes.len() * w * h);
        for (z, plane) in planes.iter().enumerate() {
            if plane.w != w || plane.h != h {
                return Err(Error::ShapeMismatch(format!(
                    "plane {z} is {}x{}, plane 0 is {w}x{h}",
                    plane.w, plane.h
                )));
            }
            for y in 0..h {
                let row = y * plane.s;
                arr.extend_from_slice(&plane.arr[row..row + w]);
            }
        }
        Ok(Self {
            d: planes.len(),
            h,
            w,
            arr,
        })
    }

    /// Copy plane `z` out as an image.
    pub fn plane(&self, z: usize) -> Im<T, 1> {
        Im {
            w: self.w,
            h: self.h,
            s: self.w,
            arr: self.plane_slice(z).to_vec(),
        }
    }
}

impl<T> Vol<T> {
    #[inline(always)]
    pub fn plane_len(&self) -> usize {
        self.h * self.w
    }

    #[inline(always)]
    pub fn idx(&self, z: usize, y: usize, x: usize) -> usize {
        (z * self.h + y) * self.w + x
    }

    pub fn plane_slice(&self, z: usize) -> &[T] {
        let n = self.plane_len();
        &self.arr[z * n..(z + 1) * n]
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.d, self.h, self.w)
    }

    pub fn check_same_shape<U>(&self, other: &Vol<U>, what: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch(format!(
                "{what} is {:?}, expected {:?}",
                other.shape(),
                self.shape()
            )));
        }
        Ok(())
    }
}

pub type LabelIm = Im<u32, 1>;
pub type LabelVol = Vol<u32>;
pub type WeightVol = Vol<f32>;
pub type Lum8Im = Im<u8, 1>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_new_label_im() {
        let im = LabelIm::new(3, 2);
        assert_eq!(im.w, 3);
        assert_eq!(im.h, 2);
        assert_eq!(im.s, 3);
        assert_eq!(im.arr.len(), 3 * 2);
        assert!(im.arr.iter().all(|&v| v == 0));
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        assert!(matches!(
            LabelVol::from_raw(2, 2, 2, vec![0; 7]),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(LabelIm::from_raw(2, 3, vec![0; 6]).is_ok());
    }

    #[test]
    fn planes_round_trip_through_vol() {
        let a = LabelIm::from_raw(2, 2, vec![1, 2, 3, 4]).unwrap();
        let b = LabelIm::from_raw(2, 2, vec![5, 6, 7, 8]).unwrap();
        let vol = LabelVol::from_planes(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(vol.shape(), (2, 2, 2));
        assert_eq!(vol.arr, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(vol.plane(1), b);
        assert_eq!(vol.arr[vol.idx(1, 1, 0)], 7);
    }

    #[test]
    fn from_planes_rejects_mixed_sizes() {
        let a = LabelIm::new(2, 2);
        let b = LabelIm::new(3, 2);
        assert!(matches!(
            LabelVol::from_planes(&[a, b]),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
