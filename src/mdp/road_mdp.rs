use super::{Action, FiniteMdp};
use crate::util::Interval;
use crate::{Error, Result, Road, VehicleId};
use itertools::iproduct;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The configuration of the road abstraction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MdpConfig {
    /// The width of a time-to-collision bucket, and the duration of one MDP step, in s.
    pub time_quantization: f64,
    /// Conflicts further away than this are ignored, in s.
    pub horizon: f64,
    /// How long each planned action is held, in s.
    pub max_action_duration: f64,
    /// Distance kept between bumpers on top of the vehicles' half lengths, in m.
    pub safety_margin: f64,
    /// Reward for entering a conflict.
    pub collision_reward: f64,
    /// Reward for driving at the highest speed level, scaled linearly down to zero at the lowest.
    pub high_speed_reward: f64,
    /// Reward for driving in the rightmost lane, scaled linearly down to zero in the leftmost.
    pub right_lane_reward: f64,
    /// Reward for each lane change.
    pub lane_change_reward: f64,
    /// The discount factor.
    pub discount: f64,
    /// The simplified MDP only considers vehicles closer than this, in m.
    pub simplify_distance: f64,
    /// The simplified MDP considers at most this many of the closest vehicles.
    pub simplify_neighbours: usize,
}

impl Default for MdpConfig {
    fn default() -> Self {
        Self {
            time_quantization: 1.0,
            horizon: 10.0,
            max_action_duration: 1.0,
            safety_margin: 1.0,
            collision_reward: -1.0,
            high_speed_reward: 0.4,
            right_lane_reward: 0.1,
            lane_change_reward: 0.0,
            discount: 0.9,
            simplify_distance: 150.0,
            simplify_neighbours: 6,
        }
    }
}

impl MdpConfig {
    /// Checks that the configuration can be used.
    pub fn validate(&self) -> Result<()> {
        let valid = self.time_quantization > 0.0
            && self.horizon >= self.time_quantization
            && self.max_action_duration > 0.0
            && self.safety_margin >= 0.0
            && (0.0..1.0).contains(&self.discount)
            && self.simplify_distance > 0.0;
        if !valid {
            return Err(Error::Config(format!("invalid MDP configuration: {:?}", self)));
        }
        Ok(())
    }

    /// The number of time steps in the horizon.
    pub fn steps(&self) -> usize {
        usize::max((self.horizon / self.time_quantization).round() as usize, 1)
    }
}

/// A discretized time-to-collision.
///
/// Buckets are ordered from the most imminent conflict to no conflict at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TtcBucket {
    /// A conflict starts within time step `k`, i.e. `k * quantization <= ttc < (k + 1) * quantization`.
    Within(usize),
    /// No conflict within the horizon.
    Clear,
}

/// The discrete state of the scene around the ego vehicle at abstraction time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SceneState {
    /// The lane the ego vehicle is driving towards.
    pub lane: usize,
    /// The ego vehicle's target speed level.
    pub speed_index: usize,
    lane_count: usize,
    /// Indexed by `speed_index * lane_count + lane`.
    ttc: Vec<TtcBucket>,
}

impl SceneState {
    /// The time-to-collision bucket of a lane, if the ego vehicle drove in it at the given speed level.
    pub fn ttc(&self, speed_index: usize, lane: usize) -> TtcBucket {
        self.ttc[speed_index * self.lane_count + lane]
    }
}

/// Another vehicle, relative to the ego vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Neighbour {
    lane: usize,
    /// Longitudinal offset of the neighbour's centre from the ego vehicle's centre, in m.
    offset: f64,
    speed: f64,
    half_len: f64,
}

/// A finite abstraction of the road around a planned vehicle.
///
/// Each state is a (speed level, lane, time step) triple. Every other vehicle is
/// assumed to keep its lane and speed, and for each speed level the ego vehicle could
/// drive at, the time windows during which it would overlap that vehicle are marked
/// as conflicts in a grid. Actions move deterministically between speed levels and lanes
/// while time advances one step; the last time step loops onto itself.
#[derive(Clone, Debug)]
pub struct RoadMdp {
    config: MdpConfig,
    lane_count: usize,
    speeds: SmallVec<[f64; 4]>,
    ego_half_len: f64,
    neighbours: Vec<Neighbour>,
    state: SceneState,
    /// Conflict costs, indexed by `(speed * lane_count + lane) * steps + step`.
    grid: Vec<f64>,
}

impl RoadMdp {
    /// Abstracts the current state of the road around the planned vehicle `ego`.
    pub fn new(road: &Road, ego: VehicleId, config: &MdpConfig) -> Result<Self> {
        config.validate()?;
        let vehicle = road.vehicle(ego).ok_or(Error::UnknownVehicle(ego))?;
        let planned = vehicle.plannable().ok_or(Error::NotPlannable(ego))?;
        let lane_count = road.lanes().len();

        let neighbours = road
            .iter_vehicles()
            .filter(|other| other.id() != ego)
            .map(|other| Neighbour {
                lane: other.lane_index(),
                offset: other.position().x - vehicle.position().x,
                speed: other.speed(),
                half_len: 0.5 * other.length(),
            })
            .collect();

        Ok(Self::build(
            config.clone(),
            lane_count,
            SmallVec::from_slice(planned.speed_levels()),
            0.5 * vehicle.length(),
            usize::min(planned.target_lane(), lane_count - 1),
            planned.speed_index(),
            neighbours,
        ))
    }

    /// A cheaper variant that only considers the closest vehicles.
    pub fn simplified(&self) -> Self {
        let mut neighbours = self
            .neighbours
            .iter()
            .filter(|n| n.offset.abs() <= self.config.simplify_distance)
            .copied()
            .collect::<Vec<_>>();
        neighbours.sort_by(|a, b| a.offset.abs().total_cmp(&b.offset.abs()).then(cmp_neighbours(a, b)));
        neighbours.truncate(self.config.simplify_neighbours);
        Self::build(
            self.config.clone(),
            self.lane_count,
            self.speeds.clone(),
            self.ego_half_len,
            self.state.lane,
            self.state.speed_index,
            neighbours,
        )
    }

    fn build(
        config: MdpConfig,
        lane_count: usize,
        speeds: SmallVec<[f64; 4]>,
        ego_half_len: f64,
        lane: usize,
        speed_index: usize,
        mut neighbours: Vec<Neighbour>,
    ) -> Self {
        neighbours.sort_by(cmp_neighbours);
        let speed_index = usize::min(speed_index, speeds.len().saturating_sub(1));
        let steps = config.steps();
        let mut mdp = Self {
            state: SceneState {
                lane,
                speed_index,
                lane_count,
                ttc: vec![TtcBucket::Clear; speeds.len() * lane_count],
            },
            grid: vec![0.0; speeds.len() * lane_count * steps],
            config,
            lane_count,
            speeds,
            ego_half_len,
            neighbours,
        };
        mdp.mark_conflicts();
        mdp
    }

    /// Fills in the conflict grid and the time-to-collision buckets.
    fn mark_conflicts(&mut self) {
        let steps = self.steps();
        let q = self.config.time_quantization;
        for (speed_idx, neighbour) in iproduct!(0..self.speeds.len(), 0..self.neighbours.len()) {
            let neighbour = self.neighbours[neighbour];
            if neighbour.lane >= self.lane_count {
                continue;
            }
            let window = match self.conflict_window(self.speeds[speed_idx], &neighbour) {
                Some(window) => window,
                None => continue,
            };
            let first = (window.min / q).floor() as usize;
            if first >= steps {
                continue;
            }
            let last = usize::min((window.max / q).floor() as usize, steps - 1);

            let bucket = &mut self.state.ttc[speed_idx * self.lane_count + neighbour.lane];
            *bucket = TtcBucket::min(*bucket, TtcBucket::Within(first));
            for step in first..=last {
                let idx = self.grid_index(speed_idx, neighbour.lane, step);
                self.grid[idx] = 1.0;
            }
        }
    }

    /// The interval of time during which the ego vehicle, driving at `speed`,
    /// would be closer to the neighbour than the safety margin.
    fn conflict_window(&self, speed: f64, neighbour: &Neighbour) -> Option<Interval<f64>> {
        let margin = self.ego_half_len + neighbour.half_len + self.config.safety_margin;
        let future = Interval::new(0.0, f64::INFINITY);
        let closing = speed - neighbour.speed;
        if closing == 0.0 {
            return (neighbour.offset.abs() < margin).then_some(future);
        }
        let t1 = (neighbour.offset - margin) / closing;
        let t2 = (neighbour.offset + margin) / closing;
        Interval::new(f64::min(t1, t2), f64::max(t1, t2)).intersect(&future)
    }

    /// The discrete state of the scene.
    pub fn state(&self) -> &SceneState {
        &self.state
    }

    /// The conflict grid, indexed like the MDP states.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// The number of vehicles the abstraction accounts for.
    pub fn neighbour_count(&self) -> usize {
        self.neighbours.len()
    }

    /// The configuration used to build the abstraction.
    pub fn config(&self) -> &MdpConfig {
        &self.config
    }

    /// The number of lanes.
    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// The number of speed levels.
    pub fn speed_count(&self) -> usize {
        self.speeds.len()
    }

    /// The number of time steps.
    pub fn steps(&self) -> usize {
        self.config.steps()
    }

    /// The number of MDP states.
    pub fn num_states(&self) -> usize {
        self.grid.len()
    }

    /// The conflict cost of a state.
    pub fn conflict(&self, speed: usize, lane: usize, step: usize) -> f64 {
        self.grid[self.grid_index(speed, lane, step)]
    }

    /// The index of the MDP state for a (speed level, lane, time step) triple.
    pub fn state_index(&self, speed: usize, lane: usize, step: usize) -> usize {
        self.grid_index(speed, lane, step)
    }

    /// The (speed level, lane, time step) triple of an MDP state.
    pub fn decode(&self, state: usize) -> (usize, usize, usize) {
        let steps = self.steps();
        let step = state % steps;
        let lane = (state / steps) % self.lane_count;
        let speed = state / (steps * self.lane_count);
        (speed, lane, step)
    }

    /// The MDP state the ego vehicle is in now.
    pub fn initial_state(&self) -> usize {
        self.state_index(self.state.speed_index, self.state.lane, 0)
    }

    /// The successor of a state under an action, or `None` if the action
    /// would leave the road or the range of speed levels.
    pub fn transition(
        &self,
        speed: usize,
        lane: usize,
        step: usize,
        action: Action,
    ) -> Option<(usize, usize, usize)> {
        let (speed, lane) = match action {
            Action::Maintain => (speed, lane),
            Action::Accelerate => (Some(speed + 1).filter(|s| *s < self.speeds.len())?, lane),
            Action::Decelerate => (speed.checked_sub(1)?, lane),
            Action::LaneLeft => (speed, lane.checked_sub(1)?),
            Action::LaneRight => (speed, Some(lane + 1).filter(|l| *l < self.lane_count)?),
        };
        Some((speed, lane, usize::min(step + 1, self.steps() - 1)))
    }

    /// The reward for arriving in a state through an action.
    pub fn reward(&self, speed: usize, lane: usize, step: usize, action: Action) -> f64 {
        let c = &self.config;
        let lane_change = match action {
            Action::LaneLeft | Action::LaneRight => c.lane_change_reward,
            _ => 0.0,
        };
        c.collision_reward * self.conflict(speed, lane, step)
            + c.high_speed_reward * fraction(speed, self.speeds.len())
            + c.right_lane_reward * fraction(lane, self.lane_count)
            + lane_change
    }

    /// Builds the tabular MDP. States in conflict are terminal.
    pub fn to_finite(&self) -> Result<FiniteMdp> {
        let mut mdp = FiniteMdp::new(self.num_states(), Action::ALL.len(), self.config.discount)?;
        let ranges = iproduct!(0..self.speeds.len(), 0..self.lane_count, 0..self.steps());
        for (speed, lane, step) in ranges {
            let state = self.state_index(speed, lane, step);
            if self.conflict(speed, lane, step) > 0.0 {
                mdp.set_terminal(state)?;
            }
            for action in Action::ALL {
                if let Some((s, l, t)) = self.transition(speed, lane, step, action) {
                    let next = self.state_index(s, l, t);
                    mdp.set_deterministic(state, action.index(), next, self.reward(s, l, t, action))?;
                }
            }
        }
        Ok(mdp)
    }

    fn grid_index(&self, speed: usize, lane: usize, step: usize) -> usize {
        (speed * self.lane_count + lane) * self.steps() + step
    }
}

/// A total order on neighbours, making the abstraction independent of vehicle order.
fn cmp_neighbours(a: &Neighbour, b: &Neighbour) -> std::cmp::Ordering {
    a.lane
        .cmp(&b.lane)
        .then(a.offset.total_cmp(&b.offset))
        .then(a.speed.total_cmp(&b.speed))
        .then(a.half_len.total_cmp(&b.half_len))
}

/// Maps `idx` in `0..count` linearly onto `[0, 1]`.
fn fraction(idx: usize, count: usize) -> f64 {
    if count > 1 {
        idx as f64 / (count - 1) as f64
    } else {
        0.0
    }
}
