use crate::VehicleId;
use thiserror::Error;

/// Errors raised while configuring a road, an MDP or a simulation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{what} index {index} is out of range (count {count})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },

    #[error("transition probabilities for state {state}, action {action} sum to {total}")]
    BadDistribution {
        state: usize,
        action: usize,
        total: f64,
    },

    #[error("no vehicle with id {0:?}")]
    UnknownVehicle(VehicleId),

    #[error("vehicle {0:?} does not expose a planning interface")]
    NotPlannable(VehicleId),
}

pub type Result<T> = std::result::Result<T, Error>;
