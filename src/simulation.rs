#[cfg(feature = "debug")]
use crate::debug::{debug_path, debug_vehicle, take_debug_frame};
use crate::math::Point2d;
use crate::mdp::{Action, MdpConfig, RoadMdp, TtcAgent, ValueFunction};
use crate::vehicle::Trajectory;
use crate::{Error, Result, Road, VehicleId};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The configuration of a [Simulation].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Simulation cycles per second of wall clock time.
    pub fps: f64,
    /// Simulated seconds per second of wall clock time.
    pub real_time_ratio: f64,
    /// Planning decisions per simulated second.
    pub policy_frequency: f64,
    /// The interval between samples of the predicted trajectory, in s.
    pub trajectory_timestep: f64,
    /// Whether a crash of the ego vehicle ends the run.
    pub terminate_on_crash: bool,
    /// When set, the run completes once the ego vehicle is this far ahead of all other traffic, in m.
    pub pass_margin: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            real_time_ratio: 1.0,
            policy_frequency: 1.0,
            trajectory_timestep: 0.35,
            terminate_on_crash: true,
            pass_margin: None,
        }
    }
}

impl SimulationConfig {
    /// Checks that the configuration can be used.
    pub fn validate(&self) -> Result<()> {
        let valid = self.fps > 0.0
            && self.real_time_ratio > 0.0
            && self.policy_frequency > 0.0
            && self.trajectory_timestep > 0.0
            && self.pass_margin.map_or(true, f64::is_finite);
        if !valid {
            return Err(Error::Config(format!(
                "invalid simulation configuration: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// The simulated time step in s.
    pub fn dt(&self) -> f64 {
        self.real_time_ratio / self.fps
    }

    /// The number of cycles between planning decisions, at least one.
    pub fn policy_period(&self) -> usize {
        let period = self.fps / (self.real_time_ratio * self.policy_frequency);
        usize::max(period.floor() as usize, 1)
    }
}

/// A discrete signal from the outside world, e.g. a keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// End the run.
    Quit,
    /// Pause a running simulation, or resume a paused one.
    TogglePause,
    /// Make the ego vehicle perform an action now.
    Override(Action),
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Outcome {
    /// A quit signal was received.
    Quit,
    /// The ego vehicle crashed.
    Crashed,
    /// The ego vehicle passed all other traffic.
    Completed,
}

/// The state of a [Simulation].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Terminated(Outcome),
}

/// A highway simulation with an optional planned ego vehicle.
pub struct Simulation {
    /// The road and its vehicles.
    road: Road,
    /// Plans the actions of the ego vehicle.
    agent: Option<TtcAgent>,
    /// How the road is abstracted for the agent.
    mdp_config: MdpConfig,
    config: SimulationConfig,
    /// The number of cycles simulated.
    tick: usize,
    state: RunState,
    /// The predicted motion of the ego vehicle under the last plan.
    trajectory: Trajectory,
    /// Debugging information from the previously simulated cycle.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation.
    ///
    /// The agent plans for the road's ego vehicle. If there is no ego vehicle,
    /// or it cannot be planned for, the agent is dropped and every vehicle
    /// follows its own driver.
    pub fn new(
        road: Road,
        agent: Option<TtcAgent>,
        mdp_config: MdpConfig,
        config: SimulationConfig,
    ) -> Result<Self> {
        config.validate()?;
        mdp_config.validate()?;
        let plannable = road
            .ego()
            .and_then(|id| road.vehicle(id))
            .map_or(false, |v| v.plannable().is_some());
        if agent.is_some() && !plannable {
            log::warn!("The road has no plannable ego vehicle; running without an agent");
        }
        Ok(Self {
            road,
            agent: agent.filter(|_| plannable),
            mdp_config,
            config,
            tick: 0,
            state: RunState::Running,
            trajectory: vec![],
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        })
    }

    /// Runs one cycle: handles the signals, then advances the simulation unless it is paused or over.
    pub fn process(&mut self, signals: impl IntoIterator<Item = Signal>) -> RunState {
        for signal in signals {
            self.handle_signal(signal);
        }
        if self.state == RunState::Running {
            self.act();
            self.step();
        }
        self.state
    }

    /// Runs until the simulation terminates or `max_cycles` cycles have been processed.
    pub fn run(&mut self, max_cycles: usize) -> RunState {
        for _ in 0..max_cycles {
            if let RunState::Terminated(_) = self.process(None) {
                break;
            }
        }
        self.state
    }

    fn handle_signal(&mut self, signal: Signal) {
        self.state = match (signal, self.state) {
            (_, RunState::Terminated(_)) => return,
            (Signal::Quit, _) => {
                log::info!("Quit after {} cycles", self.tick);
                RunState::Terminated(Outcome::Quit)
            }
            (Signal::TogglePause, RunState::Running) => RunState::Paused,
            (Signal::TogglePause, RunState::Paused) => RunState::Running,
            (Signal::Override(action), state) => {
                if let Some(ego) = self.road.ego() {
                    if let Err(err) = self.road.apply_action(ego, action) {
                        log::warn!("Cannot apply {:?}: {}", action, err);
                    }
                }
                state
            }
        };
    }

    /// Computes the commands of all vehicles, re-planning for the ego vehicle when due.
    fn act(&mut self) {
        self.road.act();
        if self.tick % self.config.policy_period() != 0 {
            return;
        }
        if let Some(ego) = self.road.ego() {
            if let Err(err) = self.plan(ego) {
                log::warn!("Planning failed at cycle {}: {}", self.tick, err);
            }
        }
    }

    /// Plans for the ego vehicle, stores the predicted trajectory and applies the first action.
    fn plan(&mut self, ego: VehicleId) -> Result<()> {
        let agent = match &mut self.agent {
            Some(agent) => agent,
            None => return Ok(()),
        };
        let mdp = RoadMdp::new(&self.road, ego, &self.mdp_config)?.simplified();
        let actions = agent.plan(&mdp)?;
        let vehicle = self.road.vehicle(ego).ok_or(Error::UnknownVehicle(ego))?;
        self.trajectory = vehicle.predict_trajectory(
            &actions,
            self.mdp_config.max_action_duration,
            self.config.trajectory_timestep,
            self.config.dt(),
            &self.road,
        )?;
        #[cfg(feature = "debug")]
        debug_path("trajectory", self.trajectory.iter().map(|s| s.position));
        if let Some(action) = actions.first() {
            self.road.apply_action(ego, *action)?;
        }
        Ok(())
    }

    /// Moves every vehicle, then checks whether the run is over.
    fn step(&mut self) {
        self.road.step(self.config.dt());
        self.tick += 1;

        if let Some(outcome) = self.end_condition() {
            log::info!("Run ended after {} cycles: {:?}", self.tick, outcome);
            self.state = RunState::Terminated(outcome);
        }

        #[cfg(feature = "debug")]
        {
            if let Some(ego) = self.road.ego().and_then(|id| self.road.vehicle(id)) {
                debug_vehicle("ego", ego.position(), ego.heading(), ego.speed());
                debug_path("ego_bounds", ego.bounds().corners());
            }
            self.debug = take_debug_frame();
        }
    }

    fn end_condition(&self) -> Option<Outcome> {
        let ego = self.road.vehicle(self.road.ego()?)?;
        if self.config.terminate_on_crash && ego.crashed() {
            return Some(Outcome::Crashed);
        }
        let margin = self.config.pass_margin?;
        let mut others = self.road.iter_vehicles().filter(|v| v.id() != ego.id()).peekable();
        others.peek()?;
        let passed = others.all(|v| ego.pos_rear() - v.pos_front() >= margin);
        passed.then_some(Outcome::Completed)
    }

    /// The road being simulated.
    pub fn road(&self) -> &Road {
        &self.road
    }

    /// Mutable access to the road, e.g. to add vehicles during a run.
    pub fn road_mut(&mut self) -> &mut Road {
        &mut self.road
    }

    /// The number of cycles simulated.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// The simulated time in s.
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.config.dt()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The predicted trajectory of the ego vehicle under the last plan.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// The planning agent, if the ego vehicle is planned.
    pub fn agent(&self) -> Option<&TtcAgent> {
        self.agent.as_ref()
    }

    /// The value function of the last plan.
    pub fn value_function(&self) -> Option<&ValueFunction> {
        self.agent.as_ref()?.value_function()
    }

    /// Where a display should be centred: on the ego vehicle if there is one,
    /// otherwise on the middle of the road, level with the average vehicle.
    pub fn display_position(&self) -> Point2d {
        if let Some(ego) = self.road.ego().and_then(|id| self.road.vehicle(id)) {
            return ego.position();
        }
        let lanes = self.road.lanes();
        let y = match (lanes.first(), lanes.last()) {
            (Some(first), Some(last)) => 0.5 * (first.centre() + last.centre()),
            _ => 0.0,
        };
        let count = self.road.iter_vehicles().count();
        let x = if count > 0 {
            self.road.iter_vehicles().map(|v| v.position().x).sum::<f64>() / count as f64
        } else {
            0.0
        };
        Point2d::new(x, y)
    }

    /// Gets the debugging information for the previously simulated cycle as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timing() {
        let config = SimulationConfig::default();
        assert_eq!(config.policy_period(), 30);
        assert!((config.dt() - 1.0 / 30.0).abs() < 1e-12);

        let fast = SimulationConfig {
            real_time_ratio: 2.0,
            policy_frequency: 2.0,
            ..Default::default()
        };
        assert_eq!(fast.policy_period(), 7);
        let frantic = SimulationConfig {
            policy_frequency: 100.0,
            ..Default::default()
        };
        assert_eq!(frantic.policy_period(), 1);
    }

    #[test]
    fn rejects_bad_config() {
        let config = SimulationConfig {
            fps: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let road = Road::new(2, 4.0).unwrap();
        assert!(Simulation::new(road, None, MdpConfig::default(), config).is_err());
    }

    #[test]
    fn empty_road_never_completes() {
        let mut road = Road::new(2, 4.0).unwrap();
        let ego = road
            .add_vehicle(
                &crate::VehicleAttributes::default(),
                Box::new(crate::MdpDriver::default()),
                0,
                0.0,
                25.0,
            )
            .unwrap();
        road.set_ego(ego).unwrap();
        let config = SimulationConfig {
            pass_margin: Some(10.0),
            ..Default::default()
        };
        let mut sim = Simulation::new(road, None, MdpConfig::default(), config).unwrap();
        assert_eq!(sim.run(60), RunState::Running);
        assert_eq!(sim.tick(), 60);
    }

    #[test]
    fn display_follows_traffic_without_ego() {
        let mut road = Road::new(3, 4.0).unwrap();
        let attribs = crate::VehicleAttributes::default();
        for long in [10.0, 30.0] {
            road.add_vehicle(&attribs, Box::new(crate::IdmDriver::default()), 0, long, 20.0)
                .unwrap();
        }
        let sim = Simulation::new(road, None, MdpConfig::default(), Default::default()).unwrap();
        assert_eq!(sim.display_position(), Point2d::new(20.0, 4.0));
    }
}
