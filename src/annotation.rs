//! Raw annotation parsing, box normalization and the one-line label format.

use crate::error::{DatasetError, DatasetResult};
use crate::models::{Annotation, NormalizedBox};
use crate::vocabulary::CategoryVocabulary;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Decimal places written for every label coordinate.
pub const LABEL_PRECISION: usize = 6;

/// Annotation record as found next to each source image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawAnnotation {
    pub material_type: String,
    /// `[x_min, y_min, x_max, y_max]` in absolute pixels.
    pub bounding_box: [f64; 4],
    pub weight_pounds: f64,
}

/// Result of normalizing one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub annotation: Annotation,
    /// `false` when the declared category fell back to the default class.
    pub known_category: bool,
}

/// Read and parse the JSON annotation at `path`.
pub fn read_annotation(path: &Path) -> DatasetResult<RawAnnotation> {
    let raw = fs::read(path).map_err(|e| DatasetError::io(path, e))?;
    serde_json::from_slice(&raw).map_err(|e| DatasetError::AnnotationParse {
        path: path.to_path_buf(),
        msg: e.to_string(),
    })
}

fn round_to_precision(v: f64) -> f64 {
    let scale = 10f64.powi(LABEL_PRECISION as i32);
    (v * scale).round() / scale
}

/// Convert an absolute-pixel box on a `width`×`height` image into the
/// canonical normalized annotation. `source` is only used for error context.
pub fn normalize(
    record: &RawAnnotation,
    (width, height): (u32, u32),
    vocab: &CategoryVocabulary,
    source: &Path,
) -> DatasetResult<Normalized> {
    let invalid = |msg: String| DatasetError::Validation {
        path: source.to_path_buf(),
        msg,
    };

    if width == 0 || height == 0 {
        return Err(invalid(format!("image dimensions {width}x{height} are empty")));
    }
    let b = record.bounding_box;
    if b.iter().any(|v| !v.is_finite()) {
        return Err(invalid(format!("bounding_box contains non-finite values ({b:?})")));
    }
    let [x_min, y_min, x_max, y_max] = b;
    if x_min >= x_max || y_min >= y_max {
        return Err(invalid(format!("bounding_box min>=max ({b:?})")));
    }
    if x_min < 0.0 || y_min < 0.0 || x_max > width as f64 || y_max > height as f64 {
        return Err(invalid(format!(
            "bounding_box {b:?} extends past the {width}x{height} image"
        )));
    }
    if !record.weight_pounds.is_finite() || record.weight_pounds < 0.0 {
        return Err(invalid(format!(
            "weight_pounds must be a non-negative number, got {}",
            record.weight_pounds
        )));
    }

    let w = width as f64;
    let h = height as f64;
    let bbox = NormalizedBox {
        x_center: round_to_precision((x_min + x_max) / (2.0 * w)),
        y_center: round_to_precision((y_min + y_max) / (2.0 * h)),
        width: round_to_precision((x_max - x_min) / w),
        height: round_to_precision((y_max - y_min) / h),
    };
    if !bbox.is_within_unit() {
        return Err(invalid(format!(
            "normalized box {:?} leaves [0,1] on a {width}x{height} image",
            bbox.components()
        )));
    }

    let (class_id, known_category) = vocab.resolve(&record.material_type);
    let category = if known_category {
        vocab.name(class_id).unwrap_or(&record.material_type).to_string()
    } else {
        record.material_type.trim().to_string()
    };

    Ok(Normalized {
        annotation: Annotation {
            category,
            class_id,
            bbox,
            weight_estimate: record.weight_pounds,
        },
        known_category,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelParseError {
    #[error("expected 5 tokens, found {0}")]
    TokenCount(usize),
    #[error("class id '{0}' is not a non-negative integer")]
    ClassId(String),
    #[error("coordinate '{0}' is not a number")]
    Coordinate(String),
}

/// `<class_id> <x_center> <y_center> <width> <height>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_id: usize,
    pub bbox: NormalizedBox,
}

impl LabelLine {
    pub fn from_annotation(annotation: &Annotation) -> Self {
        Self {
            class_id: annotation.class_id,
            bbox: annotation.bbox,
        }
    }

    pub fn parse(line: &str) -> Result<Self, LabelParseError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(LabelParseError::TokenCount(tokens.len()));
        }
        let class_id = tokens[0]
            .parse::<usize>()
            .map_err(|_| LabelParseError::ClassId(tokens[0].to_string()))?;
        let mut coords = [0.0f64; 4];
        for (slot, token) in coords.iter_mut().zip(&tokens[1..]) {
            *slot = token
                .parse::<f64>()
                .map_err(|_| LabelParseError::Coordinate(token.to_string()))?;
        }
        let [x_center, y_center, width, height] = coords;
        Ok(Self {
            class_id,
            bbox: NormalizedBox {
                x_center,
                y_center,
                width,
                height,
            },
        })
    }
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = LABEL_PRECISION;
        write!(
            f,
            "{} {:.p$} {:.p$} {:.p$} {:.p$}",
            self.class_id, self.bbox.x_center, self.bbox.y_center, self.bbox.width, self.bbox.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(material: &str, bbox: [f64; 4]) -> RawAnnotation {
        RawAnnotation {
            material_type: material.to_string(),
            bounding_box: bbox,
            weight_pounds: 12.5,
        }
    }

    fn src() -> PathBuf {
        PathBuf::from("steel/a.json")
    }

    #[test]
    fn normalizes_pixel_box() {
        let vocab = CategoryVocabulary::default();
        let n = normalize(&record("aluminum", [80.0, 60.0, 480.0, 360.0]), (640, 480), &vocab, &src())
            .unwrap();
        assert!(n.known_category);
        let a = n.annotation;
        assert_eq!(a.class_id, 1);
        assert_eq!(a.category, "aluminum");
        assert_eq!(a.bbox.x_center, 0.4375);
        assert_eq!(a.bbox.y_center, 0.4375);
        assert_eq!(a.bbox.width, 0.625);
        assert_eq!(a.bbox.height, 0.625);
        assert_eq!(a.weight_estimate, 12.5);
    }

    #[test]
    fn round_trip_within_one_pixel() {
        let vocab = CategoryVocabulary::default();
        let cases = [
            ([13.0, 7.0, 211.0, 199.0], (640, 480)),
            ([0.0, 0.0, 1023.0, 767.0], (1024, 768)),
            ([333.0, 101.0, 334.0, 977.0], (3001, 2001)),
        ];
        for (bbox, dims) in cases {
            let n = normalize(&record("steel", bbox), dims, &vocab, &src()).unwrap();
            let back = n.annotation.bbox.to_pixels(dims.0, dims.1);
            for (orig, recovered) in bbox.iter().zip(back) {
                assert!((orig - recovered).abs() <= 1.0, "{bbox:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn box_outside_image_is_rejected() {
        let vocab = CategoryVocabulary::default();
        let err = normalize(&record("steel", [500.0, 10.0, 1400.0, 100.0]), (640, 480), &vocab, &src())
            .unwrap_err();
        assert!(matches!(err, DatasetError::Validation { .. }));
    }

    #[test]
    fn box_past_the_edge_is_rejected_even_if_centre_fits() {
        let vocab = CategoryVocabulary::default();
        let cases = [
            [-50.0, 10.0, 200.0, 100.0],
            [10.0, -1.0, 200.0, 100.0],
            [400.0, 10.0, 660.0, 100.0],
            [10.0, 300.0, 200.0, 481.0],
        ];
        for bbox in cases {
            let err = normalize(&record("steel", bbox), (640, 480), &vocab, &src()).unwrap_err();
            assert!(matches!(err, DatasetError::Validation { .. }), "{bbox:?}");
        }
        // Touching the edge is fine.
        assert!(normalize(&record("steel", [0.0, 0.0, 640.0, 480.0]), (640, 480), &vocab, &src()).is_ok());
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let vocab = CategoryVocabulary::default();
        let err = normalize(&record("steel", [100.0, 10.0, 100.0, 100.0]), (640, 480), &vocab, &src())
            .unwrap_err();
        assert!(matches!(err, DatasetError::Validation { .. }));
    }

    #[test]
    fn unknown_material_maps_to_default_and_is_flagged() {
        let vocab = CategoryVocabulary::default();
        let n = normalize(&record("titanium", [10.0, 10.0, 20.0, 20.0]), (100, 100), &vocab, &src())
            .unwrap();
        assert!(!n.known_category);
        assert_eq!(n.annotation.class_id, vocab.default_class);
        assert_eq!(n.annotation.category, "titanium");
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, r#"{"material_type": "steel", "weight_pounds": 3.0}"#).unwrap();
        assert!(matches!(
            read_annotation(&path),
            Err(DatasetError::AnnotationParse { .. })
        ));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(
            &path,
            r#"{"material_type": "copper", "bounding_box": [1, 2, 3, 4], "weight_pounds": 3.5, "confidence": 0.9}"#,
        )
        .unwrap();
        let raw = read_annotation(&path).unwrap();
        assert_eq!(raw.bounding_box, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn label_line_parses() {
        let line = LabelLine::parse("1 0.512300 0.481200 0.305000 0.402500").unwrap();
        assert_eq!(line.class_id, 1);
        assert!(line.bbox.is_within_unit());
        assert_eq!(line.to_string(), "1 0.512300 0.481200 0.305000 0.402500");
    }

    #[test]
    fn label_line_rejects_bad_shapes() {
        assert_eq!(
            LabelLine::parse("1 0.5 0.5 0.5"),
            Err(LabelParseError::TokenCount(4))
        );
        assert!(matches!(
            LabelLine::parse("-1 0.5 0.5 0.5 0.5"),
            Err(LabelParseError::ClassId(_))
        ));
        assert!(matches!(
            LabelLine::parse("0 0.5 abc 0.5 0.5"),
            Err(LabelParseError::Coordinate(_))
        ));
    }
}
