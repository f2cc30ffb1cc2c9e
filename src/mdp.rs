//! Planning for the ego vehicle over a finite abstraction of the road.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use agent::{TtcAgent, ValueSurface};
pub use finite::{FiniteMdp, Transition};
pub use road_mdp::{MdpConfig, RoadMdp, SceneState, TtcBucket};
pub use value_iteration::{PlannerConfig, ValueFunction, ValueIteration};

mod agent;
mod finite;
mod road_mdp;
mod value_iteration;

/// A discrete, high level action of a planned vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    /// Keep the current lane and target speed.
    Maintain,
    /// Move to the next higher speed level.
    Accelerate,
    /// Move to the next lower speed level.
    Decelerate,
    /// Change into the lane to the left.
    LaneLeft,
    /// Change into the lane to the right.
    LaneRight,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 5] = [
        Action::Maintain,
        Action::Accelerate,
        Action::Decelerate,
        Action::LaneLeft,
        Action::LaneRight,
    ];

    /// The index of the action in [`Action::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The action with the given index in [`Action::ALL`].
    pub fn from_index(index: usize) -> Option<Action> {
        Self::ALL.get(index).copied()
    }
}
