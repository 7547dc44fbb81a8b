//! Dense forward maps: apply a many-to-one id correspondence in one gather pass.

use crate::error::{Error, Result};
use crate::im::LabelVol;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

/// What to do with a nonzero label that has no entry in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedPolicy {
    /// Decode to background (0). Existing export readers rely on this.
    #[default]
    Lenient,
    /// Fail with `Error::UnmappedId`.
    Strict,
}

/// Tables whose largest source id exceeds this many slots per pair (plus a fixed
/// allowance) are stored sparsely, so a single huge id can't force a huge allocation.
const DENSE_SLOTS_PER_PAIR: usize = 4;
const DENSE_ALLOWANCE: usize = 1 << 16;

#[derive(Debug, Clone)]
enum Lookup {
    Dense { arr: Vec<u32>, mapped: Vec<bool> },
    Sparse(HashMap<u32, u32>),
}

/// Lookup indexed by source id. Index 0 decodes to 0 unless the table says
/// otherwise, under either policy.
#[derive(Debug, Clone)]
pub struct ForwardMap {
    lookup: Lookup,
    len: usize,
}

impl ForwardMap {
    /// Scatter `pairs` of (source, target) into a lookup sized max(source) + 1.
    /// Repeats of an identical pair are fine; one source with two targets is not.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a (u32, u32)>,
        I::IntoIter: Clone,
    {
        Self::scatter(pairs.into_iter(), false)
    }

    /// Like `from_pairs`, but a source listed with both target 0 and a nonzero target
    /// keeps the nonzero one. Only two different nonzero targets are ambiguous.
    ///
    /// Per-plane superpixel tables carry such rows when a superpixel overlaps the
    /// corner sentinel or a segment dropped by size filtering.
    pub fn from_plane_rows<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a (u32, u32)>,
        I::IntoIter: Clone,
    {
        Self::scatter(pairs.into_iter(), true)
    }

    fn scatter<'a, I>(pairs: I, background_yields: bool) -> Result<Self>
    where
        I: Iterator<Item = &'a (u32, u32)> + Clone,
    {
        let (n_pairs, len) = pairs
            .clone()
            .fold((0usize, 0usize), |(n, len), &(src, _)| (n + 1, len.max(src as usize + 1)));

        let resolve = |src: u32, prev: u32, tgt: u32| -> Result<u32> {
            match (prev, tgt) {
                _ if prev == tgt => Ok(prev),
                (0, _) if background_yields => Ok(tgt),
                (_, 0) if background_yields => Ok(prev),
                _ => Err(Error::AmbiguousMapping {
                    id: src,
                    first: prev,
                    second: tgt,
                }),
            }
        };

        let lookup = if len <= n_pairs * DENSE_SLOTS_PER_PAIR + DENSE_ALLOWANCE {
            let mut arr = vec![0u32; len];
            let mut mapped = vec![false; len];
            for &(src, tgt) in pairs {
                let i = src as usize;
                arr[i] = if mapped[i] { resolve(src, arr[i], tgt)? } else { tgt };
                mapped[i] = true;
            }
            Lookup::Dense { arr, mapped }
        } else {
            let mut table: HashMap<u32, u32> = HashMap::with_capacity(n_pairs);
            for &(src, tgt) in pairs {
                let v = match table.get(&src) {
                    Some(&prev) => resolve(src, prev, tgt)?,
                    None => tgt,
                };
                table.insert(src, v);
            }
            Lookup::Sparse(table)
        };
        Ok(Self { lookup, len })
    }

    /// Largest source id + 1.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn get(&self, src: u32) -> Option<u32> {
        let found = match &self.lookup {
            Lookup::Dense { arr, mapped } => {
                let i = src as usize;
                (i < mapped.len() && mapped[i]).then(|| arr[i])
            }
            Lookup::Sparse(table) => table.get(&src).copied(),
        };
        match found {
            None if src == 0 => Some(0),
            found => found,
        }
    }

    #[inline(always)]
    fn lookup(&self, src: u32, policy: UnmappedPolicy) -> Result<u32> {
        match (self.get(src), policy) {
            (Some(tgt), _) => Ok(tgt),
            (None, UnmappedPolicy::Lenient) => Ok(0),
            (None, UnmappedPolicy::Strict) => Err(Error::UnmappedId { id: src }),
        }
    }

    /// Gather: `out[i] = map[labels[i]]`.
    pub fn apply_slice(&self, labels: &[u32], out: &mut [u32], policy: UnmappedPolicy) -> Result<()> {
        if labels.len() != out.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} labels into {} outputs",
                labels.len(),
                out.len()
            )));
        }
        out.par_iter_mut()
            .zip(labels.par_iter())
            .try_for_each(|(o, &src)| {
                *o = self.lookup(src, policy)?;
                Ok(())
            })
    }

    pub fn apply(&self, labels: &LabelVol, policy: UnmappedPolicy) -> Result<LabelVol> {
        let mut out = LabelVol::new(labels.d, labels.h, labels.w);
        self.apply_slice(&labels.arr, &mut out.arr, policy)?;
        Ok(out)
    }
}

/// Decode `labels` through the (source, target) table. Ids missing from the table
/// follow `policy`: background under `Lenient`, an error under `Strict`.
pub fn apply_map(labels: &LabelVol, pairs: &[(u32, u32)], policy: UnmappedPolicy) -> Result<LabelVol> {
    ForwardMap::from_pairs(pairs)?.apply(labels, policy)
}

/// Distinct (a, b) voxel pairs of two equally shaped volumes, sorted.
///
/// With `a` a superpixel map and `b` a segmentation this is the superpixel-to-body
/// table that `apply_map` turns back into `b`. Callers must make sure no `a` id lands in
/// two `b` ids; `ForwardMap::from_pairs` rejects such a table.
pub fn compute_pair_map(a: &LabelVol, b: &LabelVol) -> Result<Vec<(u32, u32)>> {
    a.check_same_shape(b, "pair map target")?;
    let pairs: BTreeSet<(u32, u32)> = a.arr.iter().copied().zip(b.arr.iter().copied()).collect();
    Ok(pairs.into_iter().collect())
}

// Tests
// -----------------------------------------------------------------------------
