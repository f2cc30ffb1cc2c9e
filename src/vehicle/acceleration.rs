#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The maximum deceleration of all vehicles in m/s<sup>2</sup>.
pub(crate) const MAX_DECEL: f64 = -8.0; // m/s^2

/// The maximum acceleration of all vehicles in m/s<sup>2</sup>.
pub(crate) const MAX_ACC: f64 = 6.0; // m/s^2

/// The parameters of the intelligent driver model.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdmParams {
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The comfortable deceleration, a positive number in m/s<sup>2</sup>.
    pub comf_deceleration: f64,
    /// The jam distance to keep to the vehicle ahead in m.
    pub min_gap: f64,
    /// The desired gap between this and the vehicle ahead in s.
    pub time_headway: f64,
    /// The free road acceleration exponent.
    pub exponent: f64,
    /// The speed the driver wants to travel at in m/s.
    pub desired_speed: f64,
}

impl Default for IdmParams {
    fn default() -> Self {
        Self {
            max_acceleration: 3.0,
            comf_deceleration: 5.0,
            min_gap: 5.0,
            time_headway: 1.5,
            exponent: 4.0,
            desired_speed: 25.0,
        }
    }
}

/// The car following model of a default vehicle.
#[derive(Clone, Debug)]
pub struct AccelerationModel {
    params: IdmParams,
}

impl AccelerationModel {
    /// Creates a new acceleration model.
    pub fn new(params: &IdmParams) -> Self {
        AccelerationModel { params: *params }
    }

    /// The model's parameters.
    pub fn params(&self) -> &IdmParams {
        &self.params
    }

    /// Computes the acceleration of a vehicle, clamped to the physical limits.
    ///
    /// # Arguments
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `leader` - The net distance to the vehicle ahead (m) and its velocity (m/s), if there is one.
    pub fn acceleration(&self, my_vel: f64, leader: Option<(f64, f64)>) -> f64 {
        let mut acc = self.free_road(my_vel);
        if let Some((net_dist, their_vel)) = leader {
            acc -= self.interaction(net_dist, my_vel, their_vel);
        }
        acc.clamp(MAX_DECEL, self.params.max_acceleration.min(MAX_ACC))
    }

    /// The acceleration towards the desired speed on an empty road.
    fn free_road(&self, my_vel: f64) -> f64 {
        let p = &self.params;
        if p.desired_speed <= 0.0 {
            return if my_vel > 0.0 { -p.comf_deceleration } else { 0.0 };
        }
        p.max_acceleration * (1.0 - (my_vel / p.desired_speed).powf(p.exponent))
    }

    /// The braking term of the intelligent driver model.
    ///
    /// # Arguments
    /// * `net_dist` - The distance between this vehicle and the vehicle ahead in metres.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The vehicle ahead's velocity (m/s).
    fn interaction(&self, net_dist: f64, my_vel: f64, their_vel: f64) -> f64 {
        let p = &self.params;
        if net_dist <= 0.0 {
            // Already touching: brake as hard as possible
            return p.max_acceleration - MAX_DECEL;
        }
        let appr = my_vel - their_vel;
        let factor = 1. / (2. * (p.max_acceleration * p.comf_deceleration).sqrt());
        let dynamic = f64::max(my_vel * p.time_headway + my_vel * appr * factor, 0.0);
        let term = (p.min_gap + dynamic) / net_dist;
        p.max_acceleration * term * term
    }
}
