// Element geometry → physical click point.
use crate::perception::types::{UIElement, WindowInfo};

/// Centre of the element's box, clamped into the window when one is known.
/// `None` when the element has no usable geometry.
pub fn element_point(element: &UIElement, window: Option<&WindowInfo>) -> Option<(i32, i32)> {
    let bbox = element.bbox?;
    if bbox.width() <= 0 && bbox.height() <= 0 {
        return None;
    }
    let (mut x, mut y) = bbox.center();
    if let Some(w) = window.and_then(|w| w.bbox) {
        if w.width() > 0 && w.height() > 0 {
            x = x.clamp(w.left, w.right - 1);
            y = y.clamp(w.top, w.bottom - 1);
        }
    }
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::{BBox, TargetSource};

    fn element(bbox: Option<BBox>) -> UIElement {
        UIElement {
            element_id: "e".into(),
            source: TargetSource::Ocr,
            role: Some("text".into()),
            name: Some("Next".into()),
            value: None,
            automation_id: None,
            class_name: None,
            bbox,
            states: vec![],
            parent_ids: vec![],
            near_text: None,
            salience: 0.2,
            backend_ref: None,
        }
    }

    #[test]
    fn centre_of_box() {
        assert_eq!(element_point(&element(Some(BBox::new(10, 20, 30, 40))), None), Some((20, 30)));
    }

    #[test]
    fn degenerate_or_missing_box_has_no_point() {
        assert_eq!(element_point(&element(None), None), None);
        assert_eq!(element_point(&element(Some(BBox::new(5, 5, 5, 5))), None), None);
    }

    #[test]
    fn clamped_into_window() {
        let window = WindowInfo {
            bbox: Some(BBox::new(0, 0, 100, 100)),
            ..Default::default()
        };
        assert_eq!(element_point(&element(Some(BBox::new(90, 90, 150, 150))), Some(&window)), Some((99, 99)));
    }
}
