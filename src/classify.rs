//! Square classifier.
//! A square is blurred and edge-filtered like the templates. Nearly blank squares are rejected
//! on edge density alone; everything else is scored against every template with zero-mean
//! normalized cross correlation (ZNCC) and the best score must reach the match threshold.

use crate::config::RecognitionParams;
use crate::piece::Piece;
use crate::templates::{TemplateLibrary, edge_map};
use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;

/// Fraction of nonzero pixels in an edge map.
pub fn edge_density(edges: &GrayImage) -> f32 {
    let total = edges.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let nonzero = edges.as_raw().iter().filter(|&&v| v != 0).count();
    nonzero as f32 / total as f32
}

/// ZNCC of two equally sized images, in [-1, 1].
///
/// Returns `None` when the sizes differ. An image with zero variance correlates with nothing
/// and scores 0.
pub fn zncc(a: &GrayImage, b: &GrayImage) -> Option<f32> {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return None;
    }
    let n = a.as_raw().len() as f64;
    let mean_a = a.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n;

    let mut dot = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (&va, &vb) in a.as_raw().iter().zip(b.as_raw()) {
        let da = va as f64 - mean_a;
        let db = vb as f64 - mean_b;
        dot += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 1e-12 || var_b <= 1e-12 {
        return Some(0.0);
    }
    let score = (dot / (var_a * var_b).sqrt()) as f32;
    score.is_finite().then_some(score.clamp(-1.0, 1.0))
}

/// Picks the highest score; ties keep the earliest candidate. Below `threshold` means empty.
pub(crate) fn select_best(
    scores: impl IntoIterator<Item = (Piece, f32)>,
    threshold: f32,
) -> Option<Piece> {
    let mut best: Option<(Piece, f32)> = None;
    for (piece, score) in scores {
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((piece, score));
        }
    }
    best.filter(|&(_, score)| score >= threshold)
        .map(|(piece, _)| piece)
}

/// Edge map of a raw square: grayscale, light blur, Canny.
pub fn square_edges(square: &RgbImage, params: &RecognitionParams) -> GrayImage {
    let gray = image::imageops::grayscale(square);
    let blurred = gaussian_blur_f32(&gray, params.blur_sigma);
    edge_map(&blurred, params)
}

/// Classifies one square as empty (`None`) or a piece.
pub fn classify(
    square: &RgbImage,
    templates: &TemplateLibrary,
    params: &RecognitionParams,
) -> Option<Piece> {
    let edges = square_edges(square, params);
    if edge_density(&edges) < params.min_edge_density {
        return None;
    }
    let scores = templates
        .iter()
        .filter_map(|t| zncc(&edges, &t.edges).map(|score| (t.piece, score)));
    select_best(scores, params.match_threshold)
}
