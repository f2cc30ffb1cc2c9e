use crate::math::Point2d;
use crate::util::Interval;
use crate::{VehicleId, VehicleSet};

/// A lane represents a single straight lane of highway traffic.
///
/// Lanes run along the positive x-axis and are stacked along the y-axis,
/// so lane `i` is centred on `y = i * width`. Lane `0` is the leftmost lane.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane index.
    index: usize,
    /// The width of the lane in m.
    width: f64,
    /// The vehicles in the lane, ordered back to front.
    vehicles: Vec<VehicleId>,
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(index: usize, width: f64) -> Self {
        Self {
            index,
            width,
            vehicles: vec![],
        }
    }

    /// Gets the lane index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Gets the width of the lane in m.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The lateral position of the centre line.
    pub fn centre(&self) -> f64 {
        self.index as f64 * self.width
    }

    /// The lateral extents of the lane.
    pub fn lateral_extent(&self) -> Interval<f64> {
        Interval::disc(self.centre(), 0.5 * self.width)
    }

    /// Converts a world position into the lane's (longitudinal, lateral) coordinates.
    pub fn local_coordinates(&self, point: Point2d) -> (f64, f64) {
        (point.x, point.y - self.centre())
    }

    /// Converts lane coordinates into a world position.
    pub fn position(&self, long: f64, lat: f64) -> Point2d {
        Point2d::new(long, self.centre() + lat)
    }

    /// The heading of the lane at the given longitudinal position, in radians.
    pub fn heading_at(&self, _long: f64) -> f64 {
        0.0
    }

    /// Whether the point lies within the lane's lateral extents.
    pub fn contains(&self, point: Point2d) -> bool {
        self.lateral_extent().contains(point.y)
    }

    /// The vehicles in the lane, ordered back to front.
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// Inserts the vehicle with the given ID into the lane.
    pub(crate) fn insert_vehicle(&mut self, vehicles: &VehicleSet, id: VehicleId) {
        let veh_pos = vehicles[id].position().x;
        let idx = self
            .vehicles
            .iter()
            .map(|id| vehicles[*id].position().x)
            .position(|pos| pos > veh_pos)
            .unwrap_or(self.vehicles.len());
        self.vehicles.insert(idx, id);
    }

    /// Removes every vehicle from the lane.
    pub(crate) fn clear_vehicles(&mut self) {
        self.vehicles.clear();
    }
}
