//! Tests that simulate traffic on a multi-lane highway.

use assert_approx_eq::assert_approx_eq;
use highway_sim::{
    Action, Driver, IdmDriver, IdmParams, MdpConfig, MdpDriver, Outcome, PlannerConfig, Road,
    RoadMdp, RunState, Signal, Simulation, SimulationConfig, TtcAgent, VehicleAttributes,
    VehicleId,
};
use rand::SeedableRng;

fn idm(desired_speed: f64) -> Box<dyn Driver> {
    Box::new(IdmDriver::new(&IdmParams {
        desired_speed,
        ..Default::default()
    }))
}

/// Creates an empty road with a planned ego vehicle.
fn road_with_ego(lanes: usize, lane: usize, speed: f64) -> (Road, VehicleId) {
    let mut road = Road::new(lanes, 4.0).unwrap();
    let ego = road
        .add_vehicle(
            &VehicleAttributes::default(),
            Box::new(MdpDriver::default()),
            lane,
            0.0,
            speed,
        )
        .unwrap();
    road.set_ego(ego).unwrap();
    (road, ego)
}

/// Test that vehicles keep a finite state and a bounded speed in dense random traffic.
#[test]
fn vehicles_stay_finite_and_bounded() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut road = Road::create_random(4, 4.0, 30, &mut rng).unwrap();
    let ego = road
        .spawn_behind(
            &VehicleAttributes::default(),
            Box::new(MdpDriver::default()),
            25.0,
            &mut rng,
        )
        .unwrap();
    road.set_ego(ego).unwrap();

    let agent = TtcAgent::new(PlannerConfig::default()).unwrap();
    let config = SimulationConfig {
        terminate_on_crash: false,
        ..Default::default()
    };
    let mut sim = Simulation::new(road, Some(agent), MdpConfig::default(), config).unwrap();
    for _ in 0..300 {
        sim.process(None);
        for vehicle in sim.road().iter_vehicles() {
            assert!(vehicle.position().x.is_finite() && vehicle.position().y.is_finite());
            assert!(vehicle.heading().is_finite());
            assert!(vehicle.speed() >= 0.0 && vehicle.speed() <= vehicle.max_speed());
        }
    }
    assert_eq!(sim.tick(), 300);
}

/// Test that a car following vehicle brakes for a slower leader and settles behind it.
#[test]
fn follower_slows_to_leader_speed() {
    let mut road = Road::new(1, 4.0).unwrap();
    let attribs = VehicleAttributes::default();
    let follower = road.add_vehicle(&attribs, idm(25.0), 0, 0.0, 25.0).unwrap();
    let leader = road.add_vehicle(&attribs, idm(10.0), 0, 30.0, 10.0).unwrap();

    road.act();
    assert!(road.vehicle(follower).unwrap().command().acceleration < 0.0);
    assert_approx_eq!(road.vehicle(leader).unwrap().command().acceleration, 0.0);

    for _ in 0..300 {
        road.act();
        road.step(0.1);
    }
    let (follower, leader) = (road.vehicle(follower).unwrap(), road.vehicle(leader).unwrap());
    assert!(!follower.crashed() && !leader.crashed());
    assert!(leader.pos_rear() > follower.pos_front());
    assert_approx_eq!(follower.speed(), 10.0, 1.0);
}

/// Test that both vehicles of a collision are flagged at once, and stay flagged.
#[test]
fn collisions_are_permanent() {
    let mut road = Road::new(1, 4.0).unwrap();
    let attribs = VehicleAttributes::default();
    let rear = road.add_vehicle(&attribs, idm(30.0), 0, 0.0, 30.0).unwrap();
    let front = road.add_vehicle(&attribs, idm(0.0), 0, 20.0, 0.0).unwrap();

    let crashed = |road: &Road| {
        (
            road.vehicle(rear).unwrap().crashed(),
            road.vehicle(front).unwrap().crashed(),
        )
    };
    let mut steps = 0;
    while crashed(&road) == (false, false) {
        assert!(steps < 100, "vehicles never collided");
        road.act();
        road.step(0.1);
        steps += 1;
    }
    assert_eq!(crashed(&road), (true, true));

    for _ in 0..50 {
        road.act();
        road.step(0.1);
        assert_eq!(crashed(&road), (true, true));
    }
    assert!(road.iter_vehicles().all(|v| v.speed() == 0.0));
}

/// Builds a simulation on an empty three lane road, along with the trajectory
/// predicted from the first plan.
fn empty_road_simulation() -> (Simulation, Vec<highway_sim::TrajectorySample>) {
    let (road, ego) = road_with_ego(3, 0, 25.0);
    let agent = TtcAgent::new(PlannerConfig {
        horizon: 5,
        ..Default::default()
    })
    .unwrap();
    let config = SimulationConfig {
        trajectory_timestep: 1.0,
        terminate_on_crash: false,
        ..Default::default()
    };
    let mdp_config = MdpConfig::default();

    let mdp = RoadMdp::new(&road, ego, &mdp_config).unwrap().simplified();
    let actions = agent.clone().plan(&mdp).unwrap();
    assert_eq!(actions.len(), 5);
    let predicted = road
        .vehicle(ego)
        .unwrap()
        .predict_trajectory(&actions, 1.0, 1.0, config.dt(), &road)
        .unwrap();
    assert_eq!(predicted.len(), 5);

    let sim = Simulation::new(road, Some(agent), mdp_config, config).unwrap();
    (sim, predicted)
}

fn ego_position(sim: &Simulation) -> highway_sim::math::Point2d {
    let ego = sim.road().ego().unwrap();
    sim.road().vehicle(ego).unwrap().position()
}

/// Test that re-planning every second reproduces the upfront plan when nothing else moves.
#[test]
fn receding_horizon_matches_upfront_plan() {
    let (mut sim, predicted) = empty_road_simulation();
    let period = sim.config().policy_period();
    assert_eq!(period, 30);

    for sample in &predicted {
        for _ in 0..period {
            sim.process(None);
        }
        assert_approx_eq!(sim.time(), sample.time, 1e-9);
        let position = ego_position(&sim);
        assert_approx_eq!(position.x, sample.position.x, 1e-6);
        assert_approx_eq!(position.y, sample.position.y, 1e-6);
    }
    // The ego ends up fast and in the rightmost lane
    let last = predicted.last().unwrap();
    assert_eq!(last.lane, 2);
    assert_approx_eq!(last.speed, 30.0, 0.1);
}

/// Test that re-planning reacts to traffic the upfront plan did not know about.
#[test]
fn receding_horizon_reacts_to_new_traffic() {
    let (mut sim, predicted) = empty_road_simulation();
    let period = sim.config().policy_period();
    for _ in 0..period {
        sim.process(None);
    }

    // Block every lane with stopped vehicles
    let ahead = ego_position(&sim).x + 60.0;
    for lane in 0..3 {
        sim.road_mut()
            .add_vehicle(&VehicleAttributes::default(), idm(0.0), lane, ahead, 0.0)
            .unwrap();
    }
    for _ in 0..4 * period {
        sim.process(None);
    }

    let expected = predicted.last().unwrap().position;
    assert!(ego_position(&sim).x < expected.x - 1.0);
}

/// Test that the planned vehicle gets past a slower vehicle ahead of it without crashing.
#[test]
fn ego_overtakes_slow_leader() {
    let (mut road, ego) = road_with_ego(3, 1, 25.0);
    let leader = road
        .add_vehicle(&VehicleAttributes::default(), idm(15.0), 1, 50.0, 15.0)
        .unwrap();
    let agent = TtcAgent::new(PlannerConfig::default()).unwrap();
    let mut sim = Simulation::new(road, Some(agent), MdpConfig::default(), Default::default())
        .unwrap();

    for _ in 0..500 {
        assert_eq!(sim.process(None), RunState::Running);
        assert!(!sim.road().vehicle(ego).unwrap().crashed());
    }
    let (ego, leader) = (
        sim.road().vehicle(ego).unwrap(),
        sim.road().vehicle(leader).unwrap(),
    );
    assert!(ego.position().x > leader.position().x);
    assert!(!sim.trajectory().is_empty());
    assert!(sim.value_function().is_some());
}

/// Test that the planned vehicle falls in behind a slower leader when it cannot change lanes.
#[test]
fn ego_follows_slow_leader_on_single_lane() {
    for (gap, leader_speed) in [(50.0, 15.0), (100.0, 10.0), (150.0, 15.0)] {
        let (mut road, ego) = road_with_ego(1, 0, 25.0);
        let leader = road
            .add_vehicle(
                &VehicleAttributes::default(),
                idm(leader_speed),
                0,
                gap,
                leader_speed,
            )
            .unwrap();
        let agent = TtcAgent::new(PlannerConfig::default()).unwrap();
        let config = SimulationConfig {
            terminate_on_crash: false,
            ..Default::default()
        };
        let mut sim = Simulation::new(road, Some(agent), MdpConfig::default(), config).unwrap();

        for cycle in 0..500 {
            sim.process(None);
            assert!(
                !sim.road().vehicle(ego).unwrap().crashed(),
                "crashed at cycle {} (gap {}, leader at {} m/s)",
                cycle,
                gap,
                leader_speed
            );
        }
        let (ego, leader) = (
            sim.road().vehicle(ego).unwrap(),
            sim.road().vehicle(leader).unwrap(),
        );
        assert!(ego.pos_front() < leader.pos_rear());
    }
}

/// Test that an unavoidable crash ends the run.
#[test]
fn crash_ends_run() {
    let (mut road, _) = road_with_ego(1, 0, 25.0);
    road.add_vehicle(&VehicleAttributes::default(), idm(0.0), 0, 20.0, 0.0)
        .unwrap();
    let agent = TtcAgent::new(PlannerConfig::default()).unwrap();
    let mut sim = Simulation::new(road, Some(agent), MdpConfig::default(), Default::default())
        .unwrap();
    assert_eq!(sim.run(300), RunState::Terminated(Outcome::Crashed));
    assert!(sim.tick() < 300);
}

/// Test that passing all other traffic completes the run.
#[test]
fn passing_traffic_completes_run() {
    let (mut road, _) = road_with_ego(2, 1, 25.0);
    road.add_vehicle(&VehicleAttributes::default(), idm(10.0), 0, -10.0, 10.0)
        .unwrap();
    let agent = TtcAgent::new(PlannerConfig::default()).unwrap();
    let config = SimulationConfig {
        pass_margin: Some(20.0),
        ..Default::default()
    };
    let mut sim = Simulation::new(road, Some(agent), MdpConfig::default(), config).unwrap();
    assert_eq!(sim.run(300), RunState::Terminated(Outcome::Completed));
}

/// Test the pause and quit signals.
#[test]
fn pause_and_quit() {
    let (road, _) = road_with_ego(2, 0, 25.0);
    let mut sim = Simulation::new(road, None, MdpConfig::default(), Default::default()).unwrap();
    assert!(sim.agent().is_none());

    assert_eq!(sim.process(None), RunState::Running);
    assert_eq!(sim.tick(), 1);
    let position = ego_position(&sim);

    assert_eq!(sim.process([Signal::TogglePause]), RunState::Paused);
    assert_eq!(sim.process(None), RunState::Paused);
    assert_eq!(sim.tick(), 1);
    assert_eq!(ego_position(&sim), position);

    assert_eq!(sim.process([Signal::TogglePause]), RunState::Running);
    assert_eq!(sim.tick(), 2);

    let quit = RunState::Terminated(Outcome::Quit);
    assert_eq!(sim.process([Signal::Quit]), quit);
    assert_eq!(sim.process([Signal::TogglePause]), quit);
    assert_eq!(sim.tick(), 2);
}

/// Test that a manual override reaches the ego vehicle.
#[test]
fn override_steers_ego() {
    let (road, ego) = road_with_ego(2, 0, 25.0);
    let mut sim = Simulation::new(road, None, MdpConfig::default(), Default::default()).unwrap();
    sim.process([Signal::Override(Action::LaneRight)]);
    for _ in 0..90 {
        sim.process(None);
    }
    let vehicle = sim.road().vehicle(ego).unwrap();
    assert_eq!(vehicle.plannable().unwrap().target_lane(), 1);
    assert_eq!(vehicle.lane_index(), 1);
    assert_eq!(sim.display_position(), vehicle.position());
}
