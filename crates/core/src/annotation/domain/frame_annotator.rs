use std::sync::Arc;

use crate::annotation::domain::annotated_frame::AnnotatedFrame;
use crate::annotation::domain::marker_style::MarkerStyle;
use crate::annotation::infrastructure::bitmap_context::BitmapContext;
use crate::annotation::infrastructure::stamp_image::StampImage;
use crate::shared::constants::{OUTLINE_COLOR_BGRA, OUTLINE_LINE_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::orientation::Orientation;
use crate::shared::rect::PixelRect;

/// Draws one marker per face directly into a frame's pixel memory.
///
/// Holds only read-only configuration; each call owns the frame it draws on.
#[derive(Clone, Debug)]
pub struct FrameAnnotator {
    style: MarkerStyle,
    stamp: Option<Arc<StampImage>>,
    orientation: Orientation,
}

impl FrameAnnotator {
    pub fn new(style: MarkerStyle, stamp: Option<Arc<StampImage>>) -> Self {
        Self {
            style,
            stamp,
            orientation: Orientation::default(),
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn style(&self) -> MarkerStyle {
        self.style
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_style(&mut self, style: MarkerStyle) {
        self.style = style;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Draws a marker for every rect and hands the frame on for display.
    ///
    /// Returns `None`, with nothing drawn, when the frame's pixel memory
    /// cannot be reached. The frame lock is released before returning on
    /// every path.
    pub fn annotate(&self, mut frame: Frame, rects: &[PixelRect]) -> Option<AnnotatedFrame> {
        let index = frame.index();
        let drawn = {
            let mut lock = frame.lock();
            let width = lock.width();
            let height = lock.height();
            let bytes_per_row = lock.bytes_per_row();

            let Some(base) = lock.base_address_of_plane(0) else {
                log::debug!("frame {index}: no base address, dropping annotation");
                return None;
            };
            let mut ctx = match BitmapContext::new(base, width, height, bytes_per_row) {
                Ok(ctx) => ctx,
                Err(e) => {
                    log::debug!("frame {index}: {e}, dropping annotation");
                    return None;
                }
            };

            let mut drawn = 0;
            for rect in rects {
                if self.draw_marker(&mut ctx, rect) {
                    drawn += 1;
                }
            }
            drawn
        };

        log::trace!(
            "frame {index}: drew {drawn}/{} {} markers",
            rects.len(),
            self.style
        );
        Some(AnnotatedFrame::new(frame, self.orientation, drawn))
    }

    /// Returns whether a marker was drawn for `rect`.
    fn draw_marker(&self, ctx: &mut BitmapContext<'_>, rect: &PixelRect) -> bool {
        match self.style {
            MarkerStyle::Outline => {
                ctx.stroke_rect(rect, OUTLINE_LINE_WIDTH, OUTLINE_COLOR_BGRA);
                true
            }
            MarkerStyle::Stamp | MarkerStyle::Mosaic => match &self.stamp {
                Some(stamp) => {
                    ctx.draw_image(stamp, rect);
                    true
                }
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::coordinate_mapper;
    use crate::shared::rect::NormalizedRect;
    use rstest::rstest;

    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const GRAY: [u8; 4] = [80, 80, 80, 255];

    fn make_frame(width: u32, height: u32) -> Frame {
        Frame::filled(width, height, GRAY, 0).unwrap()
    }

    fn stamp(rgba: [u8; 4]) -> Arc<StampImage> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba(rgba));
        Arc::new(StampImage::from_rgba(&img).unwrap())
    }

    /// Converts a bottom-left surface row to a top-down frame row.
    fn row(frame: &Frame, y_up: u32) -> u32 {
        frame.height() - 1 - y_up
    }

    #[test]
    fn test_outline_scenario_640x480() {
        let frame = make_frame(640, 480);
        let rects = coordinate_mapper::map_all(&[NormalizedRect::new(0.1, 0.1, 0.2, 0.2)], 640, 480);
        assert_eq!(rects[0], PixelRect::new(64.0, 48.0, 128.0, 96.0));

        let annotator = FrameAnnotator::new(MarkerStyle::Outline, None);
        let out = annotator.annotate(frame, &rects).unwrap();
        let f = out.frame();

        assert_eq!(out.markers_drawn(), 1);
        // 4px band centred on each edge: x in [62, 66) and [190, 194).
        assert_eq!(f.pixel(62, row(f, 96)), Some(GREEN));
        assert_eq!(f.pixel(65, row(f, 96)), Some(GREEN));
        assert_eq!(f.pixel(66, row(f, 96)), Some(GRAY));
        assert_eq!(f.pixel(61, row(f, 96)), Some(GRAY));
        assert_eq!(f.pixel(193, row(f, 96)), Some(GREEN));
        assert_eq!(f.pixel(194, row(f, 96)), Some(GRAY));
        // y in [46, 50) and [142, 146).
        assert_eq!(f.pixel(128, row(f, 46)), Some(GREEN));
        assert_eq!(f.pixel(128, row(f, 45)), Some(GRAY));
        assert_eq!(f.pixel(128, row(f, 145)), Some(GREEN));
        assert_eq!(f.pixel(128, row(f, 146)), Some(GRAY));
        // Interior untouched.
        assert_eq!(f.pixel(128, row(f, 96)), Some(GRAY));
    }

    #[test]
    fn test_no_rects_leaves_frame_unchanged() {
        let frame = make_frame(64, 48);
        let original = frame.data().unwrap().to_vec();
        let annotator = FrameAnnotator::new(MarkerStyle::Outline, None);

        let out = annotator.annotate(frame, &[]).unwrap();

        assert_eq!(out.markers_drawn(), 0);
        assert_eq!(out.frame().data().unwrap(), &original[..]);
    }

    #[rstest]
    #[case(MarkerStyle::Stamp)]
    #[case(MarkerStyle::Mosaic)]
    fn test_missing_stamp_is_noop(#[case] style: MarkerStyle) {
        let frame = make_frame(64, 48);
        let original = frame.data().unwrap().to_vec();
        let annotator = FrameAnnotator::new(style, None);

        let out = annotator
            .annotate(frame, &[PixelRect::new(10.0, 10.0, 20.0, 20.0)])
            .unwrap();

        assert_eq!(out.markers_drawn(), 0);
        assert_eq!(out.frame().data().unwrap(), &original[..]);
    }

    #[rstest]
    #[case(MarkerStyle::Stamp)]
    #[case(MarkerStyle::Mosaic)]
    fn test_stamp_fills_rect(#[case] style: MarkerStyle) {
        let frame = make_frame(64, 48);
        let annotator = FrameAnnotator::new(style, Some(stamp([255, 0, 0, 255])));

        let out = annotator
            .annotate(frame, &[PixelRect::new(10.0, 10.0, 20.0, 20.0)])
            .unwrap();
        let f = out.frame();

        assert_eq!(out.markers_drawn(), 1);
        assert_eq!(f.pixel(20, row(f, 20)), Some([0, 0, 255, 255]));
        assert_eq!(f.pixel(9, row(f, 20)), Some(GRAY));
        assert_eq!(f.pixel(30, row(f, 20)), Some(GRAY));
    }

    #[rstest]
    #[case(MarkerStyle::Outline, Some([255, 255, 255, 255]), 3)]
    #[case(MarkerStyle::Stamp, Some([255, 255, 255, 255]), 3)]
    #[case(MarkerStyle::Stamp, None, 0)]
    fn test_markers_drawn_matches_rect_count(
        #[case] style: MarkerStyle,
        #[case] stamp_color: Option<[u8; 4]>,
        #[case] expected: usize,
    ) {
        let annotator = FrameAnnotator::new(style, stamp_color.map(stamp));
        let rects = vec![
            PixelRect::new(0.0, 0.0, 10.0, 10.0),
            PixelRect::new(0.0, 0.0, 10.0, 10.0),
            PixelRect::new(500.0, 500.0, 10.0, 10.0),
        ];
        let out = annotator.annotate(make_frame(50, 50), &rects).unwrap();
        assert_eq!(out.markers_drawn(), expected);
    }

    #[rstest]
    #[case(MarkerStyle::Outline)]
    #[case(MarkerStyle::Stamp)]
    fn test_annotate_is_deterministic(#[case] style: MarkerStyle) {
        let mut img = image::RgbaImage::new(3, 3);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = image::Rgba([(x * 80) as u8, (y * 80) as u8, 40, 200]);
        }
        let annotator = FrameAnnotator::new(style, StampImage::from_rgba(&img).map(Arc::new));
        let rects = vec![
            PixelRect::new(3.3, 7.7, 21.1, 17.9),
            PixelRect::new(-5.0, 30.0, 20.0, 40.0),
        ];
        let frame = make_frame(48, 48);

        let a = annotator.annotate(frame.clone(), &rects).unwrap();
        let b = annotator.annotate(frame, &rects).unwrap();

        assert_eq!(a.frame().data(), b.frame().data());
    }

    #[test]
    fn test_partially_off_canvas_rect_only_touches_canvas() {
        let frame = make_frame(20, 20);
        let annotator = FrameAnnotator::new(MarkerStyle::Stamp, Some(stamp([0, 0, 0, 255])));

        let out = annotator
            .annotate(frame, &[PixelRect::new(15.0, -5.0, 10.0, 10.0)])
            .unwrap();
        let f = out.frame();

        let mut changed = 0;
        for y in 0..20 {
            for x in 0..20 {
                if f.pixel(x, y) != Some(GRAY) {
                    changed += 1;
                    // Only columns 15.. and the bottom 5 surface rows.
                    assert!(x >= 15 && y >= 15, "unexpected pixel at ({x}, {y})");
                }
            }
        }
        assert_eq!(changed, 25);
    }

    #[test]
    fn test_missing_base_address_returns_none() {
        let frame = Frame::without_storage(64, 48, 256, 3).unwrap();
        let annotator = FrameAnnotator::new(MarkerStyle::Outline, None);
        assert!(annotator
            .annotate(frame, &[PixelRect::new(1.0, 1.0, 5.0, 5.0)])
            .is_none());
    }

    #[test]
    fn test_output_carries_orientation_and_index() {
        let frame = Frame::filled(8, 8, GRAY, 17).unwrap();
        let annotator =
            FrameAnnotator::new(MarkerStyle::Outline, None).with_orientation(Orientation::Right);
        let out = annotator.annotate(frame, &[]).unwrap();
        assert_eq!(out.orientation(), Orientation::Right);
        assert_eq!(out.index(), 17);
    }

    #[test]
    fn test_set_style_switches_marker() {
        let mut annotator = FrameAnnotator::new(MarkerStyle::Outline, None);
        annotator.set_style(MarkerStyle::Stamp);
        let out = annotator
            .annotate(make_frame(16, 16), &[PixelRect::new(2.0, 2.0, 8.0, 8.0)])
            .unwrap();
        assert_eq!(annotator.style(), MarkerStyle::Stamp);
        assert_eq!(out.markers_drawn(), 0);
    }
}
