use super::acceleration::{AccelerationModel, IdmParams};
use super::dynamics::{speed_control, steering_control};
use super::{Command, Vehicle};
use crate::mdp::Action;
use crate::Road;
use smallvec::SmallVec;
use std::fmt::Debug;

/// The speed levels a planned vehicle chooses between, in m/s.
const DEFAULT_SPEED_LEVELS: [f64; 3] = [20.0, 25.0, 30.0];

/// Decides the continuous command of a vehicle each control cycle.
///
/// All drivers observe the same, unmodified snapshot of the road:
/// commands are computed for every vehicle before any vehicle moves.
pub trait Driver: Debug {
    /// Computes the command to apply over the next time step.
    fn command(&self, vehicle: &Vehicle, road: &Road) -> Command;

    /// Called once when the vehicle is placed on the road.
    fn attach(&mut self, _lane: usize, _speed: f64) {}

    /// Clones the driver into a new box.
    fn boxed_clone(&self) -> Box<dyn Driver>;

    /// The planning interface of the driver, if it accepts discrete actions.
    fn plannable(&self) -> Option<&dyn Plannable> {
        None
    }

    /// Mutable access to the planning interface of the driver.
    fn plannable_mut(&mut self) -> Option<&mut dyn Plannable> {
        None
    }
}

/// A driver whose behaviour is chosen by an external planner through discrete actions.
pub trait Plannable {
    /// Applies a high level action. Actions that would leave the
    /// road or the speed levels leave the targets unchanged.
    fn act(&mut self, action: Action, lane_count: usize);

    /// The lane the vehicle is converging onto.
    fn target_lane(&self) -> usize;

    /// The index of the current target speed into [`speed_levels`](Self::speed_levels).
    fn speed_index(&self) -> usize;

    /// The discrete speeds the vehicle can be asked to drive at, in ascending order.
    fn speed_levels(&self) -> &[f64];

    /// The current target speed in m/s.
    fn target_speed(&self) -> f64 {
        self.speed_levels()[self.speed_index()]
    }
}

/// A default vehicle following the intelligent driver model and keeping its lane.
#[derive(Clone, Debug)]
pub struct IdmDriver {
    acc: AccelerationModel,
}

impl IdmDriver {
    /// Creates a new car following driver.
    pub fn new(params: &IdmParams) -> Self {
        Self {
            acc: AccelerationModel::new(params),
        }
    }

    /// The driver's model parameters.
    pub fn params(&self) -> &IdmParams {
        self.acc.params()
    }
}

impl Default for IdmDriver {
    fn default() -> Self {
        Self::new(&IdmParams::default())
    }
}

impl Driver for IdmDriver {
    fn command(&self, vehicle: &Vehicle, road: &Road) -> Command {
        let leader = road
            .leader(vehicle)
            .map(|leader| (leader.pos_rear() - vehicle.pos_front(), leader.speed()));
        Command {
            acceleration: self.acc.acceleration(vehicle.speed(), leader),
            steering: steering_control(
                vehicle.state(),
                road.lane(vehicle.lane_index()),
                vehicle.length(),
            ),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Driver> {
        Box::new(self.clone())
    }
}

/// A vehicle driven by discrete actions, tracking a target lane and speed level.
///
/// The speed tracker never accelerates harder than car following would allow
/// behind the leader in the current or target lane, so the vehicle can slow
/// below its lowest speed level.
#[derive(Clone, Debug)]
pub struct MdpDriver {
    speed_levels: SmallVec<[f64; 4]>,
    speed_index: usize,
    target_lane: usize,
    /// Car following parameters; the desired speed is replaced by the target speed.
    idm: IdmParams,
}

impl MdpDriver {
    /// Creates a planned driver with the given speed levels, which must be non-empty.
    /// The levels are sorted into ascending order.
    pub fn new(speed_levels: &[f64]) -> crate::Result<Self> {
        if speed_levels.is_empty() || speed_levels.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(crate::Error::Config(format!(
                "speed levels must be non-empty, finite and non-negative: {:?}",
                speed_levels
            )));
        }
        let mut speed_levels = SmallVec::from_slice(speed_levels);
        speed_levels.sort_by(f64::total_cmp);
        Ok(Self {
            speed_levels,
            speed_index: 0,
            target_lane: 0,
            idm: IdmParams::default(),
        })
    }

    /// Replaces the car following parameters used to keep a safe gap.
    pub fn with_idm(mut self, params: &IdmParams) -> Self {
        self.idm = *params;
        self
    }

    /// The index of the speed level closest to `speed`.
    fn closest_level(&self, speed: f64) -> usize {
        self.speed_levels
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - speed).abs().total_cmp(&(*b - speed).abs()))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}

impl Default for MdpDriver {
    fn default() -> Self {
        Self {
            speed_levels: SmallVec::from_slice(&DEFAULT_SPEED_LEVELS),
            speed_index: 0,
            target_lane: 0,
            idm: IdmParams::default(),
        }
    }
}

impl Driver for MdpDriver {
    fn command(&self, vehicle: &Vehicle, road: &Road) -> Command {
        let lane = road.lane(self.target_lane.min(road.lanes().len() - 1));
        let mut acceleration = speed_control(vehicle.speed(), self.target_speed());

        let following = AccelerationModel::new(&IdmParams {
            desired_speed: self.target_speed(),
            ..self.idm
        });
        let leaders = [
            road.leader_in(vehicle, vehicle.lane_index()),
            road.leader_in(vehicle, lane.index()),
        ];
        for leader in leaders.into_iter().flatten() {
            let gap = leader.pos_rear() - vehicle.pos_front();
            let limit = following.acceleration(vehicle.speed(), Some((gap, leader.speed())));
            acceleration = f64::min(acceleration, limit);
        }

        Command {
            acceleration,
            steering: steering_control(vehicle.state(), lane, vehicle.length()),
        }
    }

    fn attach(&mut self, lane: usize, speed: f64) {
        self.target_lane = lane;
        self.speed_index = self.closest_level(speed);
    }

    fn boxed_clone(&self) -> Box<dyn Driver> {
        Box::new(self.clone())
    }

    fn plannable(&self) -> Option<&dyn Plannable> {
        Some(self)
    }

    fn plannable_mut(&mut self) -> Option<&mut dyn Plannable> {
        Some(self)
    }
}

impl Plannable for MdpDriver {
    fn act(&mut self, action: Action, lane_count: usize) {
        match action {
            Action::Maintain => {}
            Action::Accelerate => {
                self.speed_index = usize::min(self.speed_index + 1, self.speed_levels.len() - 1)
            }
            Action::Decelerate => self.speed_index = self.speed_index.saturating_sub(1),
            Action::LaneLeft => self.target_lane = self.target_lane.saturating_sub(1),
            Action::LaneRight => {
                self.target_lane = usize::min(self.target_lane + 1, lane_count.saturating_sub(1))
            }
        }
    }

    fn target_lane(&self) -> usize {
        self.target_lane
    }

    fn speed_index(&self) -> usize {
        self.speed_index
    }

    fn speed_levels(&self) -> &[f64] {
        &self.speed_levels
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn actions_stay_in_bounds() {
        let mut driver = MdpDriver::default();
        driver.attach(0, 24.0);
        assert_eq!(driver.speed_index(), 1);
        driver.act(Action::LaneLeft, 3);
        assert_eq!(driver.target_lane(), 0);
        driver.act(Action::LaneRight, 3);
        driver.act(Action::LaneRight, 3);
        driver.act(Action::LaneRight, 3);
        assert_eq!(driver.target_lane(), 2);
        driver.act(Action::Accelerate, 3);
        driver.act(Action::Accelerate, 3);
        assert_eq!(driver.target_speed(), 30.0);
        driver.act(Action::Decelerate, 3);
        driver.act(Action::Decelerate, 3);
        driver.act(Action::Decelerate, 3);
        assert_eq!(driver.target_speed(), 20.0);
    }

    #[test]
    fn brakes_below_lowest_level_behind_slow_leader() {
        let mut road = Road::new(1, 4.0).unwrap();
        let attribs = crate::VehicleAttributes::default();
        let ego = road
            .add_vehicle(&attribs, Box::new(MdpDriver::default()), 0, 0.0, 20.0)
            .unwrap();
        let leader = IdmDriver::new(&IdmParams {
            desired_speed: 5.0,
            ..Default::default()
        });
        road.add_vehicle(&attribs, Box::new(leader), 0, 25.0, 5.0)
            .unwrap();
        road.act();
        // Already at the lowest level, so only the gap makes it brake
        assert!(road.vehicle(ego).unwrap().command().acceleration < -1.0);
    }

    #[test]
    fn tracks_target_speed_on_free_road() {
        let mut road = Road::new(1, 4.0).unwrap();
        let ego = road
            .add_vehicle(
                &crate::VehicleAttributes::default(),
                Box::new(MdpDriver::default()),
                0,
                0.0,
                24.0,
            )
            .unwrap();
        road.act();
        let expected = speed_control(24.0, 25.0);
        assert_eq!(road.vehicle(ego).unwrap().command().acceleration, expected);
    }

    #[test]
    fn capability_is_exposed_by_planned_drivers_only() {
        assert!(MdpDriver::default().plannable().is_some());
        assert!(IdmDriver::default().plannable().is_none());
        assert!(MdpDriver::new(&[]).is_err());
        assert_eq!(
            MdpDriver::new(&[30.0, 10.0]).map(|d| d.speed_levels().to_vec()).ok(),
            Some(vec![10.0, 30.0])
        );
    }
}
