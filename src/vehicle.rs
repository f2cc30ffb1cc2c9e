use self::dynamics::{integrate, KinematicState};
use crate::lane::Lane;
use crate::math::{heading_vector, Point2d, Rect2d, Vector2d};
use crate::{Road, VehicleId};
use std::cell::Cell;

pub use acceleration::IdmParams;
pub use driver::{Driver, IdmDriver, MdpDriver, Plannable};
pub use trajectory::{Trajectory, TrajectorySample};

mod acceleration;
mod driver;
mod dynamics;
mod trajectory;

/// The colour of an ordinary vehicle.
pub const DEFAULT_COLOR: [u8; 3] = [100, 200, 255];

/// The colour of the ego vehicle.
pub const EGO_COLOR: [u8; 3] = [50, 200, 0];

/// A simulated vehicle.
#[derive(Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// Half the vehicle's width in m.
    half_wid: f64,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// The maximum speed of the vehicle in m/s.
    max_speed: f64,
    /// Position, heading and speed.
    state: KinematicState,
    /// The index of the lane the vehicle's centre is in.
    lane: usize,
    /// Whether the vehicle has collided with another.
    crashed: bool,
    /// The display colour.
    color: [u8; 3],
    /// Decides the vehicle's command each control cycle.
    driver: Box<dyn Driver>,
    /// The command computed by the last call to `act`.
    command: Cell<Command>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
pub struct VehicleAttributes {
    /// The vehicle width in m.
    pub width: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// The maximum speed of the vehicle in m/s.
    pub max_speed: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            width: 2.0,
            length: 5.0,
            max_speed: 40.0,
        }
    }
}

/// The low level inputs held constant over one time step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Command {
    /// The longitudinal acceleration in m/s<sup>2</sup>.
    pub acceleration: f64,
    /// The front wheel angle in radians.
    pub steering: f64,
}

impl Vehicle {
    /// Creates a new vehicle centred on `lane` at longitudinal position `long`.
    pub(crate) fn new(
        id: VehicleId,
        attributes: &VehicleAttributes,
        mut driver: Box<dyn Driver>,
        lane: &Lane,
        long: f64,
        speed: f64,
    ) -> Self {
        let speed = speed.clamp(0.0, attributes.max_speed);
        driver.attach(lane.index(), speed);
        Self {
            id,
            half_wid: 0.5 * attributes.width,
            half_len: 0.5 * attributes.length,
            max_speed: attributes.max_speed,
            state: KinematicState {
                position: lane.position(long, 0.0),
                heading: lane.heading_at(long),
                speed,
            },
            lane: lane.index(),
            crashed: false,
            color: DEFAULT_COLOR,
            driver,
            command: Cell::new(Command::default()),
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// The maximum speed of the vehicle in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.state.position
    }

    /// The vehicle's heading in radians, zero along the road.
    pub fn heading(&self) -> f64 {
        self.state.heading
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        heading_vector(self.state.heading)
    }

    /// The vehicle's speed in m/s.
    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    /// The vehicle's velocity vector in m/s.
    pub fn velocity(&self) -> Vector2d {
        self.state.speed * self.direction()
    }

    /// The longitudinal position of the rear of the vehicle in m.
    pub fn pos_rear(&self) -> f64 {
        self.state.position.x - self.half_len
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn pos_front(&self) -> f64 {
        self.state.position.x + self.half_len
    }

    /// The index of the lane the vehicle is in.
    pub fn lane_index(&self) -> usize {
        self.lane
    }

    /// Whether the vehicle has been involved in a collision.
    pub fn crashed(&self) -> bool {
        self.crashed
    }

    /// The display colour.
    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    /// Sets the display colour.
    pub fn set_color(&mut self, color: [u8; 3]) {
        self.color = color;
    }

    /// The vehicle's bounding region.
    pub fn bounds(&self) -> Rect2d {
        Rect2d::new(
            self.state.position,
            self.state.heading,
            self.length(),
            self.width(),
        )
    }

    /// The command that will be applied over the next time step.
    pub fn command(&self) -> Command {
        self.command.get()
    }

    /// The vehicle's driver.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// The planning interface of the vehicle, if its driver accepts discrete actions.
    pub fn plannable(&self) -> Option<&dyn Plannable> {
        self.driver.plannable()
    }

    /// Mutable access to the planning interface of the vehicle.
    pub fn plannable_mut(&mut self) -> Option<&mut dyn Plannable> {
        self.driver.plannable_mut()
    }

    pub(crate) fn state(&self) -> &KinematicState {
        &self.state
    }

    /// Computes the command for the next time step from the current state of the road.
    /// A crashed vehicle ignores its driver: it straightens its wheels and brakes to a stop.
    pub(crate) fn act(&self, road: &Road) {
        let command = if self.crashed {
            Command {
                acceleration: -self.state.speed,
                steering: 0.0,
            }
        } else {
            self.driver.command(self, road)
        };
        self.command.set(command);
    }

    /// Integrates the vehicle's state over `dt` seconds using the stored command,
    /// then updates the lane the vehicle is in.
    ///
    /// A non-finite result leaves the previous state in place and marks the vehicle crashed.
    pub(crate) fn integrate(&mut self, dt: f64, lanes: &[Lane]) {
        let next = integrate(
            &self.state,
            self.command.get(),
            self.length(),
            self.max_speed,
            dt,
        );
        if !next.is_finite() {
            log::warn!(
                "Vehicle {:?} produced a non-finite state from {:?}; freezing it",
                self.id,
                self.command.get()
            );
            self.crash();
            self.command.set(Command::default());
            return;
        }
        self.state = next;
        self.lane = lane_index_at(lanes, self.state.position.y);
    }

    /// Marks the vehicle as crashed. This is never undone.
    pub(crate) fn crash(&mut self) {
        self.crashed = true;
    }

    /// Forces the vehicle's speed, used when resolving collisions.
    pub(crate) fn set_speed(&mut self, speed: f64) {
        self.state.speed = speed.clamp(0.0, self.max_speed);
    }
}

impl Clone for Vehicle {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            half_wid: self.half_wid,
            half_len: self.half_len,
            max_speed: self.max_speed,
            state: self.state,
            lane: self.lane,
            crashed: self.crashed,
            color: self.color,
            driver: self.driver.boxed_clone(),
            command: self.command.clone(),
        }
    }
}

/// The index of the lane whose centre line is closest to the lateral position `y`.
pub(crate) fn lane_index_at(lanes: &[Lane], y: f64) -> usize {
    lanes
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let (_, lat_a) = a.local_coordinates(Point2d::new(0.0, y));
            let (_, lat_b) = b.local_coordinates(Point2d::new(0.0, y));
            lat_a.abs().total_cmp(&lat_b.abs())
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
