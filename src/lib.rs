pub use cgmath;
pub use error::{Error, Result};
pub use lane::Lane;
pub use mdp::{
    Action, FiniteMdp, MdpConfig, PlannerConfig, RoadMdp, SceneState, TtcAgent, TtcBucket,
    ValueFunction, ValueIteration, ValueSurface,
};
pub use road::Road;
pub use simulation::{Outcome, RunState, Signal, Simulation, SimulationConfig};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{
    Command, Driver, IdmDriver, IdmParams, MdpDriver, Plannable, Trajectory, TrajectorySample,
    Vehicle, VehicleAttributes,
};

mod debug;
mod error;
mod lane;
pub mod math;
pub mod mdp;
mod road;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
