use std::time::Instant;

use highway_sim::{
    MdpConfig, MdpDriver, PlannerConfig, Road, RunState, Simulation, SimulationConfig, TtcAgent,
    VehicleAttributes,
};
use rand::SeedableRng;

const MAX_CYCLES: usize = 30 * 120;

fn main() -> highway_sim::Result<()> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let mut road = Road::create_random(4, 4.0, 50, &mut rng)?;
    let ego = road.spawn_behind(
        &VehicleAttributes::default(),
        Box::new(MdpDriver::default()),
        25.0,
        &mut rng,
    )?;
    road.set_ego(ego)?;

    let agent = TtcAgent::new(PlannerConfig::default())?;
    let config = SimulationConfig {
        pass_margin: Some(50.0),
        ..Default::default()
    };
    let mut sim = Simulation::new(road, Some(agent), MdpConfig::default(), config)?;

    println!("Simulating...");
    let start = Instant::now();
    let state = sim.run(MAX_CYCLES);
    let elapsed = start.elapsed();
    let frame = elapsed / sim.tick().max(1) as u32;
    println!(
        "{:?} after {} cycles ({:.1} s simulated) in {:?} --> avg. cycle {:?}, {:.0}x real time",
        state,
        sim.tick(),
        sim.time(),
        elapsed,
        frame,
        sim.time() / elapsed.as_secs_f64().max(1e-9),
    );
    if let RunState::Terminated(outcome) = state {
        println!("Outcome: {:?}", outcome);
    }
    Ok(())
}
