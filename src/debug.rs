use crate::math::Point2d;
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

#[allow(unused)]
pub fn debug_path(name: &str, points: impl IntoIterator<Item = Point2d>) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        let points = points.into_iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
        frame.borrow_mut().push(json!({
            "type": "path",
            "name": name,
            "points": points,
        }))
    })
}

#[allow(unused)]
pub fn debug_vehicle(name: &str, centre: Point2d, heading: f64, speed: f64) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "vehicle",
            "name": name,
            "centre": [centre.x, centre.y],
            "heading": heading,
            "speed": speed,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}

#[cfg(all(test, feature = "debug"))]
mod test {
    use super::*;

    #[test]
    fn frames_are_drained() {
        debug_vehicle("ego", Point2d::new(1.0, 2.0), 0.0, 25.0);
        debug_path("trajectory", vec![Point2d::new(0.0, 0.0), Point2d::new(1.0, 0.0)]);
        let frame = take_debug_frame();
        assert_eq!(frame.as_array().map(|a| a.len()), Some(2));
        assert_eq!(frame[0]["centre"], json!([1.0, 2.0]));
        assert_eq!(frame[1]["points"][1], json!([1.0, 0.0]));
        assert_eq!(take_debug_frame(), json!([]));
    }
}
