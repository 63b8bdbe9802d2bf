//! Debug video annotation

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::domain::model::{ClassId, Detection, Frame};

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([230, 25, 75]),
    Rgb([60, 180, 75]),
    Rgb([255, 225, 25]),
    Rgb([0, 130, 200]),
    Rgb([245, 130, 48]),
    Rgb([145, 30, 180]),
];

fn class_color(class_id: ClassId) -> Rgb<u8> {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// Copy of `frame` with a box drawn around every detection that carries one
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut image: RgbImage = frame.image.clone();
    let (width, height) = image.dimensions();

    for detection in detections {
        let Some(bbox) = detection.bbox else {
            continue;
        };
        let x = bbox.x1.clamp(0.0, width as f32) as i32;
        let y = bbox.y1.clamp(0.0, height as f32) as i32;
        let w = (bbox.width() as u32).max(1);
        let h = (bbox.height() as u32).max(1);
        let color = class_color(detection.class_id);

        // Two nested outlines for a 2px border
        draw_hollow_rect_mut(&mut image, Rect::at(x, y).of_size(w, h), color);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(&mut image, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
        }
    }

    Frame::new(frame.index, image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BoundingBox;

    #[test]
    fn test_box_outline_is_drawn() {
        let frame = Frame::new(0, RgbImage::new(32, 32));
        let detection = Detection::new(0, 0.9).with_bbox(BoundingBox {
            x1: 4.0,
            y1: 4.0,
            x2: 20.0,
            y2: 20.0,
        });

        let annotated = annotate(&frame, &[detection]);
        assert_eq!(*annotated.image.get_pixel(4, 4), class_color(0));
        assert_eq!(*annotated.image.get_pixel(12, 12), Rgb([0, 0, 0]));
        // The source frame is untouched
        assert_eq!(*frame.image.get_pixel(4, 4), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_detection_without_box_is_ignored() {
        let frame = Frame::new(3, RgbImage::new(8, 8));
        let annotated = annotate(&frame, &[Detection::new(1, 0.5)]);
        assert_eq!(annotated.image, frame.image);
        assert_eq!(annotated.index, 3);
    }
}
