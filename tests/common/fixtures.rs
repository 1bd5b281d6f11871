use image::{ImageBuffer, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

pub const IMAGE_WIDTH: u32 = 400;
pub const IMAGE_HEIGHT: u32 = 300;

/// Box well inside a 400x300 image.
pub const TEST_BOX: [f64; 4] = [100.0, 60.0, 300.0, 240.0];

/// How a synthesized image should score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Look {
    /// Saturated per-pixel noise: bright enough, high contrast, sharp.
    Sharp,
    /// Uniform mid grey: no contrast, no edges, no colour.
    Flat,
}

/// Deterministic image for `seed`.
pub fn synth_image(look: Look, seed: u64) -> RgbImage {
    match look {
        Look::Sharp => {
            let mut rng = StdRng::seed_from_u64(seed);
            ImageBuffer::from_fn(IMAGE_WIDTH, IMAGE_HEIGHT, |_, _| {
                Rgb([rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>()])
            })
        }
        Look::Flat => ImageBuffer::from_fn(IMAGE_WIDTH, IMAGE_HEIGHT, |_, _| Rgb([128u8, 128u8, 128u8])),
    }
}

/// Annotation JSON in the source-tree format.
pub fn annotation_json(material: &str, bbox: [f64; 4], weight: f64) -> String {
    serde_json::json!({
        "material_type": material,
        "bounding_box": bbox,
        "weight_pounds": weight,
    })
    .to_string()
}

/// Write `<root>/<category>/<stem>.png` and, if `material` is given,
/// `<stem>.json` next to it. Returns the image path.
pub fn write_sample(root: &Path, category: &str, stem: &str, look: Look, material: Option<&str>) -> PathBuf {
    let dir = root.join(category);
    fs::create_dir_all(&dir).expect("Failed to create category directory");
    let image_path = dir.join(format!("{stem}.png"));
    let seed = stem.bytes().fold(category.len() as u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    synth_image(look, seed)
        .save_with_format(&image_path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    if let Some(material) = material {
        fs::write(image_path.with_extension("json"), annotation_json(material, TEST_BOX, 2.5))
            .expect("Failed to write annotation");
    }
    image_path
}

/// Populate `root` with `count` sharp, annotated samples per category. The
/// directory name doubles as the material type.
pub fn build_source(root: &Path, categories: &[(&str, usize)]) {
    for (category, count) in categories {
        for i in 0..*count {
            write_sample(root, category, &format!("{category}_{i:03}"), Look::Sharp, Some(category));
        }
    }
}

/// Source tree with 10 samples each of steel, aluminum and copper.
pub fn create_test_source() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    build_source(dir.path(), &[("steel", 10), ("aluminum", 10), ("copper", 10)]);
    dir
}

/// Snapshot of every file under `root` as (relative path, bytes), sorted.
pub fn snapshot_tree(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).expect("Failed to read directory") {
            let path = entry.expect("Failed to read entry").path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).expect("Path outside root").to_path_buf();
                let bytes = fs::read(&path).expect("Failed to read file");
                out.push((rel, bytes));
            }
        }
    }
    out.sort();
    out
}
