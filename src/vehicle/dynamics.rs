use super::acceleration::{MAX_ACC, MAX_DECEL};
use super::Command;
use crate::lane::Lane;
use crate::math::{heading_vector, wrap_to_pi, Point2d};
use std::f64::consts::FRAC_PI_4;

/// The maximum steering angle in radians.
pub const MAX_STEERING: f64 = FRAC_PI_4;

/// Time constant of the speed tracker in s.
const TAU_A: f64 = 0.6;

/// Time constant of the heading tracker in s.
const TAU_DS: f64 = 0.2;

/// Gain of the lateral position tracker.
const KP_LATERAL: f64 = 1.0 / 3.0 / TAU_DS;

/// Speeds below this are treated as this value when computing steering, in m/s.
const MIN_STEERING_SPEED: f64 = 1.0;

/// The continuous physical state of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicState {
    pub position: Point2d,
    pub heading: f64,
    pub speed: f64,
}

impl KinematicState {
    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.heading.is_finite()
            && self.speed.is_finite()
    }
}

/// Integrates a kinematic bicycle model over `dt` seconds,
/// holding the commanded acceleration and steering angle constant.
///
/// # Parameters
/// * `state` - The state at the start of the time step
/// * `command` - The command held over the time step
/// * `wheel_base` - The distance between the axles in m
/// * `max_speed` - The speed is clamped to `[0, max_speed]`
/// * `dt` - The time step in seconds
pub fn integrate(
    state: &KinematicState,
    command: Command,
    wheel_base: f64,
    max_speed: f64,
    dt: f64,
) -> KinematicState {
    let acc = command.acceleration.clamp(MAX_DECEL, MAX_ACC);
    let steering = command.steering.clamp(-MAX_STEERING, MAX_STEERING);

    let speed = (state.speed + dt * acc).clamp(0.0, max_speed);
    let avg_speed = 0.5 * (state.speed + speed);
    let heading_rate = avg_speed / wheel_base * steering.tan();
    let mid_heading = state.heading + 0.5 * dt * heading_rate;

    KinematicState {
        position: state.position + avg_speed * dt * heading_vector(mid_heading),
        heading: wrap_to_pi(state.heading + dt * heading_rate),
        speed,
    }
}

/// Computes the acceleration needed to track a target speed.
pub fn speed_control(speed: f64, target_speed: f64) -> f64 {
    (target_speed - speed) / TAU_A
}

/// Computes the steering angle needed to converge onto the centre line of a lane,
/// with a cascade of lateral position, heading and steering controllers.
pub fn steering_control(state: &KinematicState, lane: &Lane, wheel_base: f64) -> f64 {
    let (long, lat) = lane.local_coordinates(state.position);
    let speed = f64::max(state.speed, MIN_STEERING_SPEED);

    let lat_speed_command = -KP_LATERAL * lat;
    let heading_command = (lat_speed_command / speed).clamp(-1.0, 1.0).asin();
    let heading_ref = lane.heading_at(long) + heading_command.clamp(-FRAC_PI_4, FRAC_PI_4);
    let heading_rate = wrap_to_pi(heading_ref - state.heading) / TAU_DS;

    let steering = (wheel_base / speed * heading_rate).atan();
    steering.clamp(-MAX_STEERING, MAX_STEERING)
}
