use super::{Action, PlannerConfig, RoadMdp, ValueFunction, ValueIteration};
use crate::Result;
use arrayvec::ArrayVec;

/// Something the value function of the last plan can be drawn onto,
/// as a grid of lanes by time steps.
pub trait ValueSurface {
    /// Called before the cells of a new value function are drawn.
    fn clear(&mut self, _lanes: usize, _steps: usize) {}

    /// Draws one cell. `normalized` is the value rescaled onto `[0, 1]`
    /// over all the drawn cells.
    fn fill(&mut self, lane: usize, step: usize, value: f64, normalized: f64);
}

/// Plans the actions of the ego vehicle by solving the road abstraction
/// with value iteration and following the greedy policy.
#[derive(Clone, Debug)]
pub struct TtcAgent {
    config: PlannerConfig,
    order: ArrayVec<usize, 5>,
    solver: ValueIteration,
    last: Option<Solution>,
}

/// The value function of the last plan, and the layout of the MDP it belongs to.
#[derive(Clone, Debug)]
struct Solution {
    value: ValueFunction,
    speed_index: usize,
    lane_count: usize,
    steps: usize,
}

impl TtcAgent {
    /// Creates an agent.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            order: config.preference_order().iter().map(|a| a.index()).collect(),
            solver: ValueIteration::from(&config),
            config,
            last: None,
        })
    }

    /// The configuration of the agent.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Computes a sequence of `horizon` actions from the current state of the abstraction.
    ///
    /// The sequence follows the greedy policy from the initial state,
    /// assuming every action has its modelled effect.
    pub fn plan(&mut self, mdp: &RoadMdp) -> Result<Vec<Action>> {
        let finite = mdp.to_finite()?;
        let value = self.solver.solve(&finite);

        let mut actions = Vec::with_capacity(self.config.horizon);
        let mut state = mdp.initial_state();
        for _ in 0..self.config.horizon {
            let action = match value.greedy_action(&finite, state, &self.order) {
                Some(action) => action,
                None => break,
            };
            actions.push(Action::ALL[action]);
            state = finite
                .transition(state, action)
                .and_then(|t| t.outcomes.first())
                .map_or(state, |(next, _)| *next);
        }
        log::debug!(
            "Planned {:?} from {:?} ({} iterations, residual {:e})",
            actions,
            mdp.decode(mdp.initial_state()),
            value.iterations,
            value.residual
        );

        self.last = Some(Solution {
            value,
            speed_index: mdp.state().speed_index,
            lane_count: mdp.lane_count(),
            steps: mdp.steps(),
        });
        Ok(actions)
    }

    /// The value function computed by the last plan.
    pub fn value_function(&self) -> Option<&ValueFunction> {
        self.last.as_ref().map(|s| &s.value)
    }

    /// Draws the values of the last plan at the ego vehicle's speed level, per lane and time step.
    pub fn display(&self, surface: &mut impl ValueSurface) {
        let last = match &self.last {
            Some(last) => last,
            None => return,
        };
        let offset = last.speed_index * last.lane_count * last.steps;
        let values = &last.value.values[offset..offset + last.lane_count * last.steps];
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        surface.clear(last.lane_count, last.steps);
        for (idx, value) in values.iter().enumerate() {
            let normalized = if max > min {
                (value - min) / (max - min)
            } else {
                0.5
            };
            surface.fill(idx / last.steps, idx % last.steps, *value, normalized);
        }
    }
}
