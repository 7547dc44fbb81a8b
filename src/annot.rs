//! Body annotation records (`annotations-body.json`) and the body sets they carry.

use crate::im::LabelVol;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const ORPHAN_COMMENT: &str = "orphan";
pub const NON_TRAVERSING_COMMENT: &str = "does not traverse";
pub const GLIA_COMMENT: &str = "glia";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyAnnotation {
    #[serde(rename = "body ID")]
    pub body_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMetadata {
    pub description: String,
    #[serde(rename = "file version")]
    pub file_version: u32,
}

impl Default for AnnotationMetadata {
    fn default() -> Self {
        Self {
            description: "body annotations".to_string(),
            file_version: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BodyAnnotations {
    pub data: Vec<BodyAnnotation>,
    #[serde(default)]
    pub metadata: AnnotationMetadata,
}

impl BodyAnnotations {
    /// Ids of every body whose comment is exactly `comment`, in record order.
    pub fn bodies_with_comment(&self, comment: &str) -> Vec<u32> {
        self.data
            .iter()
            .filter(|a| a.comment.as_deref() == Some(comment))
            .map(|a| a.body_id)
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub fn parse_annotations_json(json_text: &str) -> Result<BodyAnnotations, serde_json::Error> {
    serde_json::from_str(json_text)
}

fn not_sure(body_id: u32, comment: &str) -> BodyAnnotation {
    BodyAnnotation {
        body_id,
        status: Some("not sure".to_string()),
        comment: Some(comment.to_string()),
    }
}

/// Record tagging `orphans` and, optionally, `non_traversing` bodies as "not sure".
pub fn body_annotations(orphans: &[u32], non_traversing: Option<&[u32]>) -> BodyAnnotations {
    let mut data: Vec<BodyAnnotation> = orphans
        .iter()
        .map(|&b| not_sure(b, ORPHAN_COMMENT))
        .collect();
    if let Some(non_traversing) = non_traversing {
        data.extend(
            non_traversing
                .iter()
                .map(|&b| not_sure(b, NON_TRAVERSING_COMMENT)),
        );
    }
    BodyAnnotations {
        data,
        metadata: AnnotationMetadata::default(),
    }
}

fn on_boundary(vol: &LabelVol, z: usize, y: usize, x: usize) -> bool {
    z == 0 || y == 0 || x == 0 || z + 1 == vol.d || y + 1 == vol.h || x + 1 == vol.w
}

/// Nonzero bodies that never touch a face of the volume, sorted.
pub fn orphans(vol: &LabelVol) -> Vec<u32> {
    let mut all: BTreeSet<u32> = BTreeSet::new();
    let mut surface: BTreeSet<u32> = BTreeSet::new();
    for z in 0..vol.d {
        for y in 0..vol.h {
            for x in 0..vol.w {
                let v = vol.arr[vol.idx(z, y, x)];
                if v == 0 {
                    continue;
                }
                all.insert(v);
                if on_boundary(vol, z, y, x) {
                    surface.insert(v);
                }
            }
        }
    }
    all.difference(&surface).copied().collect()
}

/// Bodies that enter the volume but never leave it elsewhere, sorted.
///
/// Only boundary voxels are considered. Nonzero boundary voxels are grouped into
/// 6-connected surface patches regardless of body id; a body whose boundary voxels all
/// fall in a single patch does not traverse the volume.
pub fn non_traversing(vol: &LabelVol) -> Vec<u32> {
    let (d, h, w) = vol.shape();
    let n = vol.arr.len();
    let is_surface = |i: usize| {
        let x = i % w;
        let y = (i / w) % h;
        let z = i / (w * h);
        vol.arr[i] != 0 && on_boundary(vol, z, y, x)
    };

    let mut patch: Vec<usize> = vec![0; n];
    let mut n_patches = 0usize;
    let mut stack: Vec<usize> = Vec::new();
    for start in 0..n {
        if patch[start] != 0 || !is_surface(start) {
            continue;
        }
        n_patches += 1;
        patch[start] = n_patches;
        stack.push(start);

        while let Some(i) = stack.pop() {
            let x = i % w;
            let y = (i / w) % h;
            let z = i / (w * h);
            let mut visit = |j: usize| {
                if patch[j] == 0 && is_surface(j) {
                    patch[j] = n_patches;
                    stack.push(j);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < w {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - w);
            }
            if y + 1 < h {
                visit(i + w);
            }
            if z > 0 {
                visit(i - w * h);
            }
            if z + 1 < d {
                visit(i + w * h);
            }
        }
    }

    let mut patches_by_body: BTreeMap<u32, BTreeSet<usize>> = BTreeMap::new();
    for (i, &p) in patch.iter().enumerate() {
        if p != 0 {
            patches_by_body.entry(vol.arr[i]).or_default().insert(p);
        }
    }
    patches_by_body
        .into_iter()
        .filter(|(_, patches)| patches.len() == 1)
        .map(|(body, _)| body)
        .collect()
}

// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::vol_from_ascii;

    const ANNOT_JSON: &str = r#"
        {
            "data": [
                { "body ID": 12, "status": "not sure", "comment": "glia" },
                { "body ID": 40, "status": "finalized" },
                { "body ID": 7, "comment": "glia" },
                { "body ID": 9, "comment": "orphan" }
            ],
            "metadata": { "description": "body annotations", "file version": 2 }
        }
    "#;

    #[test]
    fn parses_records_and_filters_by_comment() {
        let annots = parse_annotations_json(ANNOT_JSON).unwrap();
        assert_eq!(annots.data.len(), 4);
        assert_eq!(annots.data[1].comment, None);
        assert_eq!(annots.bodies_with_comment(GLIA_COMMENT), vec![12, 7]);
        assert_eq!(annots.bodies_with_comment(ORPHAN_COMMENT), vec![9]);
        assert!(annots.bodies_with_comment("nope").is_empty());
    }

    #[test]
    fn built_record_uses_the_export_field_names() {
        let annots = body_annotations(&[3], Some(&[5, 6][..]));
        let json = annots.to_json().unwrap();
        assert!(json.contains("\"body ID\": 3"));
        assert!(json.contains("\"file version\": 2"));
        assert!(json.contains("\"does not traverse\""));

        let back = parse_annotations_json(&json).unwrap();
        assert_eq!(back, annots);
        assert_eq!(back.bodies_with_comment(NON_TRAVERSING_COMMENT), vec![5, 6]);
        assert_eq!(back.data[0].status.as_deref(), Some("not sure"));
    }

    #[test]
    fn metadata_is_optional_on_read() {
        let annots = parse_annotations_json(r#"{ "data": [] }"#).unwrap();
        assert_eq!(annots.metadata, AnnotationMetadata::default());
    }

    #[test]
    fn orphans_are_bodies_off_the_boundary() {
        let vol = vol_from_ascii(&[
            "11111\n11111\n11111\n11111",
            "11111\n12231\n13331\n11111",
            "11111\n11111\n11111\n11111",
        ]);
        assert_eq!(orphans(&vol), vec![2, 3]);
    }

    #[test]
    fn non_traversing_bodies_touch_one_surface_patch() {
        // Body 1 crosses the volume, so its boundary voxels fall in two patches.
        // Body 2 touches the surface once, in the patch it shares with body 1.
        let vol = vol_from_ascii(&[
            "1002\n0000\n0001",
            "1002\n1111\n0001",
            "1000\n0000\n0001",
        ]);
        assert_eq!(non_traversing(&vol), vec![2]);
    }
}
