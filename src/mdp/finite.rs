use crate::{Error, Result};
use smallvec::SmallVec;

/// Probabilities may deviate from summing to one by this much.
const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// The outcome of taking an action in a state.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// The immediate reward.
    pub reward: f64,
    /// The successor states and their probabilities.
    pub outcomes: SmallVec<[(usize, f64); 2]>,
}

/// A tabular Markov decision process with a finite set of states and actions.
///
/// Not every action has to be defined in every state: undefined actions
/// are simply never considered there.
#[derive(Clone, Debug)]
pub struct FiniteMdp {
    num_states: usize,
    num_actions: usize,
    /// Indexed by `state * num_actions + action`.
    transitions: Vec<Option<Transition>>,
    terminal: Vec<bool>,
    discount: f64,
}

impl FiniteMdp {
    /// Creates an MDP with no transitions defined.
    pub fn new(num_states: usize, num_actions: usize, discount: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&discount) {
            return Err(Error::Config(format!(
                "discount must be in [0, 1), got {}",
                discount
            )));
        }
        Ok(Self {
            num_states,
            num_actions,
            transitions: vec![None; num_states * num_actions],
            terminal: vec![false; num_states],
            discount,
        })
    }

    /// The number of states.
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// The number of actions.
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// The discount factor.
    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Defines the outcome of taking `action` in `state`.
    pub fn set_transition(
        &mut self,
        state: usize,
        action: usize,
        reward: f64,
        outcomes: &[(usize, f64)],
    ) -> Result<()> {
        let idx = self.index(state, action)?;
        for (next, _) in outcomes {
            self.check_state(*next)?;
        }
        let total = outcomes.iter().map(|(_, p)| p).sum::<f64>();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE || outcomes.iter().any(|(_, p)| *p < 0.0) {
            return Err(Error::BadDistribution {
                state,
                action,
                total,
            });
        }
        self.transitions[idx] = Some(Transition {
            reward,
            outcomes: SmallVec::from_slice(outcomes),
        });
        Ok(())
    }

    /// Defines a deterministic transition.
    pub fn set_deterministic(
        &mut self,
        state: usize,
        action: usize,
        next: usize,
        reward: f64,
    ) -> Result<()> {
        self.set_transition(state, action, reward, &[(next, 1.0)])
    }

    /// Marks a state as terminal: its value is zero and no action is taken from it.
    pub fn set_terminal(&mut self, state: usize) -> Result<()> {
        self.check_state(state)?;
        self.terminal[state] = true;
        Ok(())
    }

    /// Whether the state is terminal.
    pub fn is_terminal(&self, state: usize) -> bool {
        self.terminal[state]
    }

    /// Gets the transition for an action, if it is defined in that state.
    /// Out of range states and actions have no transition.
    pub fn transition(&self, state: usize, action: usize) -> Option<&Transition> {
        if state >= self.num_states || action >= self.num_actions {
            return None;
        }
        self.transitions[state * self.num_actions + action].as_ref()
    }

    /// The actions defined in a state, with their transitions.
    pub fn actions(&self, state: usize) -> impl Iterator<Item = (usize, &Transition)> + '_ {
        let start = state * self.num_actions;
        self.transitions[start..start + self.num_actions]
            .iter()
            .enumerate()
            .filter_map(|(action, t)| t.as_ref().map(|t| (action, t)))
    }

    /// The expected return of taking `action` in `state`, then following `values`.
    pub fn q_value(&self, values: &[f64], state: usize, action: usize) -> Option<f64> {
        self.transition(state, action).map(|t| self.backup(values, t))
    }

    /// The one step lookahead value of a transition.
    pub(crate) fn backup(&self, values: &[f64], transition: &Transition) -> f64 {
        let expected = transition
            .outcomes
            .iter()
            .map(|(next, p)| p * values[*next])
            .sum::<f64>();
        transition.reward + self.discount * expected
    }

    fn index(&self, state: usize, action: usize) -> Result<usize> {
        self.check_state(state)?;
        if action >= self.num_actions {
            return Err(Error::IndexOutOfRange {
                what: "action",
                index: action,
                count: self.num_actions,
            });
        }
        Ok(state * self.num_actions + action)
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state >= self.num_states {
            return Err(Error::IndexOutOfRange {
                what: "state",
                index: state,
                count: self.num_states,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validates_transitions() {
        let mut mdp = FiniteMdp::new(2, 2, 0.9).unwrap();
        assert!(mdp.set_deterministic(0, 0, 2, 1.0).is_err());
        assert!(mdp.set_deterministic(0, 2, 1, 1.0).is_err());
        assert!(matches!(
            mdp.set_transition(0, 0, 1.0, &[(0, 0.5), (1, 0.4)]),
            Err(Error::BadDistribution { .. })
        ));
        mdp.set_transition(0, 1, 1.0, &[(0, 0.5), (1, 0.5)]).unwrap();
        assert_eq!(mdp.actions(0).map(|(a, _)| a).collect::<Vec<_>>(), vec![1]);
        assert!(mdp.transition(0, 0).is_none());
        assert!(FiniteMdp::new(1, 1, 1.0).is_err());
    }

    #[test]
    fn q_values() {
        let mut mdp = FiniteMdp::new(2, 1, 0.5).unwrap();
        mdp.set_deterministic(0, 0, 1, 1.0).unwrap();
        assert_eq!(mdp.q_value(&[0.0, 4.0], 0, 0), Some(3.0));
        assert_eq!(mdp.q_value(&[0.0, 4.0], 1, 0), None);
    }

    #[test]
    fn out_of_range_lookups_are_undefined() {
        let mut mdp = FiniteMdp::new(2, 2, 0.5).unwrap();
        mdp.set_deterministic(1, 0, 1, 7.0).unwrap();
        assert!(mdp.transition(0, 2).is_none());
        assert!(mdp.transition(2, 0).is_none());
        assert_eq!(mdp.q_value(&[0.0, 0.0], 0, 2), None);
        assert_eq!(mdp.transition(1, 0).map(|t| t.reward), Some(7.0));
    }
}
