use mu_watcher::capture::{crop, Frame, FrameSource, NullFrameSource, Rect};
use mu_watcher::registry::WindowHandle;

#[test]
fn rect_area() {
    assert!(Rect::new(0, 0, 10, 10).has_area());
    assert!(!Rect::new(0, 0, 0, 10).has_area());
    assert!(!Rect::new(5, 5, -3, 10).has_area());
}

#[test]
fn rect_intersection() {
    let a = Rect::new(0, 0, 10, 10);
    let b = Rect::new(5, 5, 10, 10);
    assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 5, 5)));

    let apart = Rect::new(100, 100, 10, 10);
    assert_eq!(a.intersect(&apart), None);

    // Touching edges do not overlap
    let edge = Rect::new(10, 0, 5, 5);
    assert_eq!(a.intersect(&edge), None);
}

#[test]
fn crop_clamps_to_frame_bounds() {
    let frame = Frame::from_pixel(10, 10, image::Rgba([1, 2, 3, 255]));

    let inside = crop(&frame, Rect::new(2, 2, 4, 4));
    assert_eq!(inside.dimensions(), (4, 4));

    // Overhanging region is clamped
    let clamped = crop(&frame, Rect::new(8, 8, 10, 10));
    assert_eq!(clamped.dimensions(), (2, 2));

    // Fully outside yields the degenerate frame
    let outside = crop(&frame, Rect::new(50, 50, 5, 5));
    assert_eq!(outside.dimensions(), (1, 1));
}

#[test]
fn null_source_resolves_nothing() {
    let source = NullFrameSource;
    assert!(source.resolve_rect(WindowHandle(1)).is_none());

    // Degenerate rectangles capture as 1x1 without error
    let frame = source.capture(Rect::new(0, 0, -5, 10)).unwrap();
    assert_eq!(frame.dimensions(), (1, 1));
}
