//! Export directories for the slice-based proofreading tool.
//!
//! Layout:
//! ```text
//! <dir>/superpixel_to_segment_map.txt
//! <dir>/segment_to_body_map.txt
//! <dir>/superpixel_maps/sp_map.NNNNN.png    16-bit, plane-local superpixels
//! <dir>/grayscale_maps/img.NNNNN.png        8-bit, optional
//! <dir>/annotations-body.json               optional
//! ```
//! Tiling, bounding boxes and stack compilation are done afterwards by the tool's own
//! programs and are not run from here.

use crate::annot::{
    BodyAnnotations, GLIA_COMMENT, body_annotations, non_traversing, orphans,
    parse_annotations_json,
};
use crate::error::Result;
use crate::fmap::UnmappedPolicy;
use crate::hierarchy::{BuildOpts, Hierarchy, build};
use crate::im::io::{BitDepth, load_stack, save_gray_stack, save_stack};
use crate::im::{LabelVol, Vol};
use crate::reader::{Refine, reconstruct};
use crate::table::{read_fine_to_mid, read_mid_to_body, write_fine_to_mid, write_mid_to_body};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

pub const SP_TO_SEGMENT_FILE: &str = "superpixel_to_segment_map.txt";
pub const SEGMENT_TO_BODY_FILE: &str = "segment_to_body_map.txt";
pub const SP_MAP_DIR: &str = "superpixel_maps";
pub const SP_MAP_PREFIX: &str = "sp_map";
pub const GRAY_DIR: &str = "grayscale_maps";
pub const GRAY_PREFIX: &str = "img";
pub const ANNOT_FILE: &str = "annotations-body.json";

/// Where the body annotations of an export come from.
#[derive(Debug, Clone, Copy)]
pub enum BodyAnnot<'a> {
    Record(&'a BodyAnnotations),
    /// Tag the orphans and non-traversing bodies of this segmentation.
    FromBodies(&'a LabelVol),
}

pub fn write_export(
    dir: &Path,
    hier: &Hierarchy,
    gray: Option<&Vol<u8>>,
    annot: Option<BodyAnnot<'_>>,
) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    write_fine_to_mid(
        BufWriter::new(File::create(dir.join(SP_TO_SEGMENT_FILE))?),
        &hier.fine_to_mid,
    )?;
    write_mid_to_body(
        BufWriter::new(File::create(dir.join(SEGMENT_TO_BODY_FILE))?),
        &hier.mid_to_body,
    )?;

    save_stack(&hier.fine, &dir.join(SP_MAP_DIR), SP_MAP_PREFIX, BitDepth::Sixteen)?;

    if let Some(gray) = gray {
        save_gray_stack(gray, &dir.join(GRAY_DIR), GRAY_PREFIX)?;
    }

    if let Some(annot) = annot {
        let computed;
        let record = match annot {
            BodyAnnot::Record(record) => record,
            BodyAnnot::FromBodies(bodies) => {
                computed = body_annotations(&orphans(bodies), Some(non_traversing(bodies).as_slice()));
                &computed
            }
        };
        std::fs::write(dir.join(ANNOT_FILE), record.to_json()?)?;
    }

    info!(
        dir = %dir.display(),
        planes = hier.fine.d,
        segments = hier.mid_to_body.len() - 1,
        "export written"
    );
    Ok(())
}

/// Build the hierarchy and write it in one go, annotating orphans and
/// non-traversing bodies. Returns the plane-local superpixel map so it can be passed
/// back as `fine_precomputed` next time.
pub fn export_shortcut(
    sps: &LabelVol,
    bodies: &LabelVol,
    gray: Option<&Vol<u8>>,
    dir: &Path,
    sps_out: Option<LabelVol>,
) -> Result<LabelVol> {
    let hier = build(sps, bodies, &BuildOpts::default(), sps_out)?;
    write_export(dir, &hier, gray, Some(BodyAnnot::FromBodies(bodies)))?;
    Ok(hier.fine)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOpts<'a> {
    pub refine: Refine<'a>,
    pub policy: UnmappedPolicy,
    /// Also return the bodies commented "glia" in `annotations-body.json`.
    pub get_glia: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub bodies: LabelVol,
    pub glia: Option<Vec<u32>>,
}

/// Read an export directory back into a body volume. Both tables are parsed in full
/// before anything is decoded.
pub fn read_export(dir: &Path, opts: &ImportOpts<'_>) -> Result<Import> {
    let fine = load_stack(&dir.join(SP_MAP_DIR))?;
    let fine_to_mid = read_fine_to_mid(BufReader::new(File::open(dir.join(SP_TO_SEGMENT_FILE))?))?;
    let mid_to_body = read_mid_to_body(BufReader::new(File::open(dir.join(SEGMENT_TO_BODY_FILE))?))?;

    let bodies = reconstruct(&fine, &fine_to_mid, &mid_to_body, opts.refine, opts.policy)?;

    let glia = if opts.get_glia {
        let text = std::fs::read_to_string(dir.join(ANNOT_FILE))?;
        Some(parse_annotations_json(&text)?.bodies_with_comment(GLIA_COMMENT))
    } else {
        None
    };

    info!(dir = %dir.display(), planes = bodies.d, "export read");
    Ok(Import { bodies, glia })
}

// Tests
// -----------------------------------------------------------------------------
