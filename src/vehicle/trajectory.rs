use super::Vehicle;
use crate::math::Point2d;
use crate::mdp::Action;
use crate::{Error, Result, Road};

/// A predicted state of a planned vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectorySample {
    /// Time since the start of the prediction in s.
    pub time: f64,
    /// The centre of the vehicle.
    pub position: Point2d,
    /// The heading in radians.
    pub heading: f64,
    /// The speed in m/s.
    pub speed: f64,
    /// The lane the vehicle is in.
    pub lane: usize,
}

/// The predicted motion of a planned vehicle, in chronological order.
pub type Trajectory = Vec<TrajectorySample>;

/// The number of whole time steps of length `dt` in `duration`, at least one.
pub(crate) fn steps_in(duration: f64, dt: f64) -> usize {
    usize::max((duration / dt).round() as usize, 1)
}

impl Vehicle {
    /// Predicts the motion of the vehicle if it executes each action in turn,
    /// holding each for `action_duration` seconds.
    ///
    /// The prediction runs on a private copy of the vehicle: neither the vehicle
    /// nor the road are modified.
    ///
    /// # Parameters
    /// * `actions` - The actions to execute
    /// * `action_duration` - How long each action is held, in s
    /// * `trajectory_timestep` - The interval between samples, in s
    /// * `dt` - The integration time step, in s
    /// * `road` - The road the vehicle is driving on
    pub fn predict_trajectory(
        &self,
        actions: &[Action],
        action_duration: f64,
        trajectory_timestep: f64,
        dt: f64,
        road: &Road,
    ) -> Result<Trajectory> {
        if !(dt > 0.0 && action_duration > 0.0 && trajectory_timestep > 0.0) {
            return Err(Error::Config(format!(
                "prediction time steps must be positive (dt {}, action {}, sample {})",
                dt, action_duration, trajectory_timestep
            )));
        }

        let mut vehicle = self.clone();
        let lane_count = road.lanes().len();
        let steps_per_action = steps_in(action_duration, dt);
        let steps_per_sample = steps_in(trajectory_timestep, dt);

        let mut samples = Vec::with_capacity(actions.len() * steps_per_action / steps_per_sample);
        let mut frame = 0;
        for action in actions {
            vehicle
                .plannable_mut()
                .ok_or(Error::NotPlannable(self.id))?
                .act(*action, lane_count);
            for _ in 0..steps_per_action {
                frame += 1;
                vehicle.act(road);
                vehicle.integrate(dt, road.lanes());
                if frame % steps_per_sample == 0 {
                    samples.push(TrajectorySample {
                        time: frame as f64 * dt,
                        position: vehicle.position(),
                        heading: vehicle.heading(),
                        speed: vehicle.speed(),
                        lane: vehicle.lane_index(),
                    });
                }
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{IdmDriver, MdpDriver, VehicleAttributes};

    #[test]
    fn prediction_leaves_road_untouched() {
        let mut road = Road::new(3, 4.0).unwrap();
        let ego = road
            .add_vehicle(&VehicleAttributes::default(), Box::new(MdpDriver::default()), 1, 0.0, 25.0)
            .unwrap();
        let before = road.vehicle(ego).unwrap().clone();

        let actions = [Action::LaneRight, Action::Accelerate, Action::Maintain];
        let trajectory = road
            .vehicle(ego)
            .unwrap()
            .predict_trajectory(&actions, 1.0, 0.5, 0.1, &road)
            .unwrap();

        assert_eq!(trajectory.len(), 6);
        assert!(trajectory.windows(2).all(|w| w[1].time > w[0].time));
        assert!(trajectory.windows(2).all(|w| w[1].position.x > w[0].position.x));
        assert_eq!(trajectory.last().unwrap().lane, 2);

        let after = road.vehicle(ego).unwrap();
        assert_eq!(after.position(), before.position());
        assert_eq!(after.plannable().unwrap().target_lane(), 1);
        assert_eq!(after.plannable().unwrap().speed_index(), 1);
    }

    #[test]
    fn unplannable_vehicles_cannot_be_predicted() {
        let mut road = Road::new(1, 4.0).unwrap();
        let id = road
            .add_vehicle(&VehicleAttributes::default(), Box::new(IdmDriver::default()), 0, 0.0, 20.0)
            .unwrap();
        let vehicle = road.vehicle(id).unwrap();
        assert!(vehicle
            .predict_trajectory(&[Action::Maintain], 1.0, 0.5, 0.1, &road)
            .is_err());
        assert!(vehicle.predict_trajectory(&[], 1.0, 0.5, 0.0, &road).is_err());
    }
}
