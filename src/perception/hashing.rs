//! Deterministic identifiers for elements and frames.
//!
//! Element ids must survive small layout jitter between frames, so geometry is
//! quantized to a coarse grid before it reaches the digest.

use sha2::{Digest, Sha256};

use crate::perception::types::{BBox, UIElement, WindowInfo};

/// Grid cell size in pixels used to quantize bounding boxes.
pub const BBOX_CELL_SIZE: f64 = 32.0;

/// Elements folded into a frame signature.
pub const FRAME_SIGNATURE_CAP: usize = 250;

const ELEMENT_ID_LEN: usize = 16;
const FINGERPRINT_LEN: usize = 12;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn short_digest(raw: &str, len: usize) -> String {
    let mut digest = sha256_hex(raw.as_bytes());
    digest.truncate(len);
    digest
}

pub fn window_fingerprint(window: &WindowInfo) -> String {
    let raw = format!(
        "{}:{}:{}",
        window.exe_name.as_deref().unwrap_or(""),
        window.handle.map(|h| h.to_string()).unwrap_or_default(),
        window.title.as_deref().unwrap_or(""),
    );
    short_digest(&raw, FINGERPRINT_LEN)
}

fn normalize(text: Option<&str>) -> String {
    text.map(|t| t.trim().to_lowercase()).unwrap_or_default()
}

fn bucket(value: i32) -> i64 {
    (value as f64 / BBOX_CELL_SIZE).round() as i64
}

/// `left:top:width:height` in grid cells, or `none` without geometry.
pub fn bucket_bbox(bbox: Option<&BBox>) -> String {
    match bbox {
        Some(b) => format!(
            "{}:{}:{}:{}",
            bucket(b.left),
            bucket(b.top),
            bucket(b.width()),
            bucket(b.height())
        ),
        None => "none".to_string(),
    }
}

/// Stable id for one element within one window instance.
///
/// Automation ids are exact-stable inside a window, so when present they are
/// the only element-level input. Otherwise the id is derived from normalized
/// role and name, the bucketed box and the parent chain.
pub fn stable_element_id(
    window: &WindowInfo,
    role: Option<&str>,
    name: Option<&str>,
    automation_id: Option<&str>,
    bbox: Option<&BBox>,
    parent_chain: &str,
) -> String {
    let fingerprint = window.fingerprint();
    let raw = match automation_id.filter(|a| !a.is_empty()) {
        Some(auto) => format!("{fingerprint}:auto:{auto}"),
        None => format!(
            "{fingerprint}:heur:{}:{}:{}:{}",
            normalize(name),
            normalize(role),
            bucket_bbox(bbox),
            if parent_chain.is_empty() { "root" } else { parent_chain },
        ),
    };
    short_digest(&raw, ELEMENT_ID_LEN)
}

fn element_signature(element: &UIElement) -> String {
    let mut states: Vec<&str> = element.states.iter().map(|s| s.as_str()).collect();
    states.sort_unstable();
    states.dedup();
    let raw = format!(
        "{}|{}|{}|{}|{}|{}",
        normalize(element.role.as_deref()),
        normalize(element.name.as_deref()),
        element.automation_id.as_deref().unwrap_or(""),
        bucket_bbox(element.bbox.as_ref()),
        element.parent_ids.join(">"),
        states.join(","),
    );
    sha256_hex(raw.as_bytes())
}

/// Descending salience, ties broken by ascending id.
pub fn salience_order(a: &UIElement, b: &UIElement) -> std::cmp::Ordering {
    b.salience
        .total_cmp(&a.salience)
        .then_with(|| a.element_id.cmp(&b.element_id))
}

/// Composite hash of the most salient elements; independent of input order.
pub fn frame_signature(elements: &[UIElement], window: &WindowInfo) -> String {
    let mut ranked: Vec<&UIElement> = elements.iter().collect();
    ranked.sort_by(|a, b| salience_order(a, b));
    ranked.truncate(FRAME_SIGNATURE_CAP);

    let mut joined = window.fingerprint();
    for element in ranked {
        joined.push('|');
        joined.push_str(&element_signature(element));
    }
    sha256_hex(joined.as_bytes())
}
