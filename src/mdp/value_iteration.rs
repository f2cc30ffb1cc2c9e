use super::{Action, FiniteMdp};
use crate::{Error, Result};
use arrayvec::ArrayVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The configuration of the planner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlannerConfig {
    /// Value iteration stops once no value changes by more than this.
    pub tolerance: f64,
    /// The maximum number of Bellman sweeps. Reaching it is reported as non-convergence.
    pub max_iterations: usize,
    /// The number of actions in a plan.
    pub horizon: usize,
    /// Breaks ties between actions of equal value: the action listed first wins.
    /// Actions missing from the list rank after the listed ones, in declaration order.
    pub action_preference: Vec<Action>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
            horizon: 10,
            action_preference: Action::ALL.to_vec(),
        }
    }
}

impl PlannerConfig {
    /// Checks that the configuration can be used.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) || self.max_iterations == 0 || self.horizon == 0 {
            return Err(Error::Config(format!(
                "planner needs a positive tolerance, iteration cap and horizon: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Every action, in order of preference.
    pub fn preference_order(&self) -> ArrayVec<Action, 5> {
        let mut order = ArrayVec::new();
        for action in self.action_preference.iter().chain(Action::ALL.iter()) {
            if !order.contains(action) {
                order.push(*action);
            }
        }
        order
    }
}

/// The result of solving an MDP.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueFunction {
    /// The expected discounted return of each state.
    pub values: Vec<f64>,
    /// The number of Bellman sweeps performed.
    pub iterations: usize,
    /// The largest change in value during the final sweep.
    pub residual: f64,
    /// Whether the residual fell below the tolerance within the iteration cap.
    pub converged: bool,
}

impl ValueFunction {
    /// The value of a state.
    pub fn value(&self, state: usize) -> f64 {
        self.values[state]
    }

    /// The defined action with the highest Q-value in `state`.
    /// Ties go to the action appearing first in `order`.
    pub fn greedy_action(&self, mdp: &FiniteMdp, state: usize, order: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &action in order {
            if let Some(q) = mdp.q_value(&self.values, state, action) {
                if best.map_or(true, |(_, best_q)| q > best_q) {
                    best = Some((action, q));
                }
            }
        }
        best.map(|(action, _)| action)
    }
}

/// Solves finite MDPs with synchronous Bellman backups.
#[derive(Clone, Debug)]
pub struct ValueIteration {
    tolerance: f64,
    max_iterations: usize,
}

impl ValueIteration {
    /// Creates a solver.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Computes the optimal value function of the MDP.
    ///
    /// If the values have not converged when the iteration cap is reached,
    /// a warning is logged and the latest estimate is returned.
    pub fn solve(&self, mdp: &FiniteMdp) -> ValueFunction {
        let mut values = vec![0.0; mdp.num_states()];
        let mut next = vec![0.0; mdp.num_states()];
        let mut residual = f64::INFINITY;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            residual = 0.0;
            for (state, value) in next.iter_mut().enumerate() {
                *value = if mdp.is_terminal(state) {
                    0.0
                } else {
                    mdp.actions(state)
                        .map(|(_, t)| mdp.backup(&values, t))
                        .reduce(f64::max)
                        .unwrap_or(0.0)
                };
                residual = f64::max(residual, (*value - values[state]).abs());
            }
            std::mem::swap(&mut values, &mut next);
            if residual < self.tolerance {
                break;
            }
        }

        let converged = residual < self.tolerance;
        if !converged {
            log::warn!(
                "Value iteration did not converge within {} iterations (residual {:e})",
                iterations,
                residual
            );
        }
        ValueFunction {
            values,
            iterations,
            residual,
            converged,
        }
    }
}

impl From<&PlannerConfig> for ValueIteration {
    fn from(config: &PlannerConfig) -> Self {
        Self::new(config.tolerance, config.max_iterations)
    }
}
