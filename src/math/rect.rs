use super::{heading_vector, rot90, Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// An oriented rectangle, used as the bounding region of a vehicle.
#[derive(Clone, Copy, Debug)]
pub struct Rect2d {
    /// The centre of the rectangle.
    pub centre: Point2d,
    /// Unit vector along the rectangle's length.
    pub axis: Vector2d,
    /// Half the length, along `axis`.
    pub half_len: f64,
    /// Half the width, perpendicular to `axis`.
    pub half_wid: f64,
}

impl Rect2d {
    /// Creates a rectangle centred on `centre` and rotated by `heading` radians.
    pub fn new(centre: Point2d, heading: f64, length: f64, width: f64) -> Self {
        Self {
            centre,
            axis: heading_vector(heading),
            half_len: 0.5 * length,
            half_wid: 0.5 * width,
        }
    }

    /// The four corners of the rectangle.
    pub fn corners(&self) -> [Point2d; 4] {
        let long = self.half_len * self.axis;
        let lat = self.half_wid * rot90(self.axis);
        [
            self.centre + long + lat,
            self.centre + long - lat,
            self.centre - long - lat,
            self.centre - long + lat,
        ]
    }

    /// Returns true if the interiors of the two rectangles overlap.
    /// Rectangles which only touch along an edge do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        let axes = [
            self.axis,
            rot90(self.axis),
            other.axis,
            rot90(other.axis),
        ];
        axes.iter()
            .all(|axis| self.extent_on(*axis).overlaps(&other.extent_on(*axis)))
    }

    /// Projects the rectangle onto an axis.
    fn extent_on(&self, axis: Vector2d) -> Interval<f64> {
        let radius = self.half_len * self.axis.dot(axis).abs()
            + self.half_wid * rot90(self.axis).dot(axis).abs();
        Interval::disc(self.centre.to_vec().dot(axis), radius)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn aligned_rects() {
        let a = Rect2d::new(Point2d::new(0.0, 0.0), 0.0, 5.0, 2.0);
        let b = Rect2d::new(Point2d::new(4.0, 0.0), 0.0, 5.0, 2.0);
        let c = Rect2d::new(Point2d::new(5.0, 0.0), 0.0, 5.0, 2.0);
        let d = Rect2d::new(Point2d::new(0.0, 4.0), 0.0, 5.0, 2.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&d));
        assert_eq!(a.corners()[0], Point2d::new(2.5, 1.0));
        assert_eq!(a.corners()[2], Point2d::new(-2.5, -1.0));
    }

    #[test]
    fn rotated_rects() {
        let a = Rect2d::new(Point2d::new(0.0, 0.0), 0.0, 5.0, 2.0);
        let b = Rect2d::new(Point2d::new(0.0, 3.0), FRAC_PI_2, 5.0, 2.0);
        let c = Rect2d::new(Point2d::new(3.6, 3.0), FRAC_PI_2, 5.0, 2.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
