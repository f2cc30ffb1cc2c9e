use crate::lane::Lane;
use crate::mdp::Action;
use crate::vehicle::{lane_index_at, DEFAULT_COLOR, EGO_COLOR};
use crate::{
    Driver, Error, IdmDriver, IdmParams, Result, Vehicle, VehicleAttributes, VehicleId, VehicleSet,
};
use rand::Rng;
use rand_distr::Distribution;

/// Longitudinal spacing between randomly placed vehicles on a one lane road, in m.
const RANDOM_SPACING: f64 = 30.0; // m

/// A straight multi-lane highway and the vehicles driving on it.
pub struct Road {
    /// The lanes, ordered left to right.
    lanes: Vec<Lane>,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The vehicle controlled by the planner, if there is one.
    ego: Option<VehicleId>,
}

impl Road {
    /// Creates an empty road with `lanes_count` lanes of the given width.
    pub fn new(lanes_count: usize, lane_width: f64) -> Result<Self> {
        if lanes_count == 0 || !(lane_width > 0.0) {
            return Err(Error::Config(format!(
                "a road needs at least one lane of positive width (got {} x {})",
                lanes_count, lane_width
            )));
        }
        Ok(Self {
            lanes: (0..lanes_count).map(|i| Lane::new(i, lane_width)).collect(),
            vehicles: VehicleSet::default(),
            ego: None,
        })
    }

    /// Creates a road populated with randomly placed car following vehicles.
    /// Speeds are drawn from a normal distribution and used as the drivers' desired speeds.
    pub fn create_random(
        lanes_count: usize,
        lane_width: f64,
        vehicles_count: usize,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let mut road = Self::new(lanes_count, lane_width)?;
        road.populate_random(vehicles_count, 24.0, 1.0, rng)?;
        Ok(road)
    }

    /// Adds a vehicle to the road, centred on `lane` at longitudinal position `long`.
    pub fn add_vehicle(
        &mut self,
        attributes: &VehicleAttributes,
        driver: Box<dyn Driver>,
        lane: usize,
        long: f64,
        speed: f64,
    ) -> Result<VehicleId> {
        let lane = self.lanes.get(lane).ok_or(Error::IndexOutOfRange {
            what: "lane",
            index: lane,
            count: self.lanes.len(),
        })?;
        if !long.is_finite() || !speed.is_finite() {
            return Err(Error::Config(format!(
                "vehicle position {} and speed {} must be finite",
                long, speed
            )));
        }
        let lane_index = lane.index();
        let vehicle_id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, driver, lane, long, speed));
        self.lanes[lane_index].insert_vehicle(&self.vehicles, vehicle_id);
        Ok(vehicle_id)
    }

    /// Adds a vehicle in a random lane behind all the vehicles already on the road.
    pub fn spawn_behind(
        &mut self,
        attributes: &VehicleAttributes,
        driver: Box<dyn Driver>,
        speed: f64,
        rng: &mut impl Rng,
    ) -> Result<VehicleId> {
        let lane = rng.gen_range(0..self.lanes.len());
        let offset = RANDOM_SPACING * (-5.0 / 30.0 * self.lanes.len() as f64).exp();
        let long = self
            .vehicles
            .values()
            .map(|v| v.position().x)
            .reduce(f64::min)
            .map_or(0.0, |x_min| x_min - offset);
        self.add_vehicle(attributes, driver, lane, long, speed)
    }

    /// Adds `count` car following vehicles behind the existing traffic, with desired speeds
    /// sampled from a normal distribution with the given mean and standard deviation.
    pub fn populate_random(
        &mut self,
        count: usize,
        mean_speed: f64,
        stddev: f64,
        rng: &mut impl Rng,
    ) -> Result<()> {
        let distr = rand_distr::Normal::new(mean_speed, stddev)
            .map_err(|err| Error::Config(format!("invalid speed distribution: {}", err)))?;
        for _ in 0..count {
            let speed = distr
                .sample(rng)
                .clamp(0.75 * mean_speed, 1.25 * mean_speed);
            let driver = IdmDriver::new(&IdmParams {
                desired_speed: speed,
                ..Default::default()
            });
            self.spawn_behind(&VehicleAttributes::default(), Box::new(driver), speed, rng)?;
        }
        Ok(())
    }

    /// Marks a vehicle as the ego vehicle, replacing any previous one.
    pub fn set_ego(&mut self, vehicle_id: VehicleId) -> Result<()> {
        if !self.vehicles.contains_key(vehicle_id) {
            return Err(Error::UnknownVehicle(vehicle_id));
        }
        if let Some(old) = self.ego.and_then(|id| self.vehicles.get_mut(id)) {
            old.set_color(DEFAULT_COLOR);
        }
        self.vehicles[vehicle_id].set_color(EGO_COLOR);
        self.ego = Some(vehicle_id);
        Ok(())
    }

    /// The ID of the ego vehicle, if there is one.
    pub fn ego(&self) -> Option<VehicleId> {
        self.ego
    }

    /// Gets the lanes, ordered left to right.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Gets the lane with the given index, clamped to the lanes of the road.
    pub fn lane(&self, index: usize) -> &Lane {
        &self.lanes[usize::min(index, self.lanes.len() - 1)]
    }

    /// The index of the lane closest to the lateral position `y`.
    pub fn lane_index_at(&self, y: f64) -> usize {
        lane_index_at(&self.lanes, y)
    }

    /// Returns an iterator over all the vehicles on the road.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Gets a mutable reference to the vehicle with the given ID.
    pub fn vehicle_mut(&mut self, vehicle_id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(vehicle_id)
    }

    /// The closest vehicle ahead of `vehicle` in its lane.
    pub fn leader(&self, vehicle: &Vehicle) -> Option<&Vehicle> {
        self.leader_in(vehicle, vehicle.lane_index())
    }

    /// The closest vehicle ahead of `vehicle` in the given lane.
    pub fn leader_in(&self, vehicle: &Vehicle, lane: usize) -> Option<&Vehicle> {
        self.lane(lane)
            .vehicles()
            .iter()
            .filter_map(|id| self.vehicles.get(*id))
            .find(|other| other.id != vehicle.id && other.position().x > vehicle.position().x)
    }

    /// The closest vehicle behind `vehicle` in the given lane.
    pub fn follower(&self, vehicle: &Vehicle, lane: usize) -> Option<&Vehicle> {
        self.lane(lane)
            .vehicles()
            .iter()
            .rev()
            .filter_map(|id| self.vehicles.get(*id))
            .find(|other| other.id != vehicle.id && other.position().x < vehicle.position().x)
    }

    /// Computes the next command of every vehicle.
    ///
    /// Every driver observes the same snapshot of the road;
    /// nothing moves until [`step`](Self::step) is called.
    pub fn act(&self) {
        for vehicle in self.vehicles.values() {
            vehicle.act(self);
        }
    }

    /// Passes a discrete action to a planned vehicle and recomputes its command.
    pub fn apply_action(&mut self, vehicle_id: VehicleId, action: Action) -> Result<()> {
        let lane_count = self.lanes.len();
        self.vehicles
            .get_mut(vehicle_id)
            .ok_or(Error::UnknownVehicle(vehicle_id))?
            .plannable_mut()
            .ok_or(Error::NotPlannable(vehicle_id))?
            .act(action, lane_count);
        self.vehicles[vehicle_id].act(self);
        Ok(())
    }

    /// Advances the road by `dt` seconds, using the commands from the last [`act`](Self::act).
    pub fn step(&mut self, dt: f64) {
        self.integrate(dt);
        self.update_lanes();
        self.check_collisions();
    }

    /// Integrates the positions and velocities of all vehicles.
    fn integrate(&mut self, dt: f64) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.integrate(dt, &self.lanes);
        }
    }

    /// Re-sorts the vehicles of each lane after they have moved.
    fn update_lanes(&mut self) {
        for lane in &mut self.lanes {
            lane.clear_vehicles();
        }
        let ids = self.vehicles.keys().collect::<Vec<_>>();
        for vehicle_id in ids {
            let lane = self.vehicles[vehicle_id].lane_index();
            self.lanes[lane].insert_vehicle(&self.vehicles, vehicle_id);
        }
    }

    /// Marks every pair of vehicles whose bounds overlap as crashed.
    ///
    /// Each pair is checked, which is quadratic in the number of vehicles.
    fn check_collisions(&mut self) {
        let ids = self.vehicles.keys().collect::<Vec<_>>();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                let (va, vb) = (&self.vehicles[*a], &self.vehicles[*b]);
                let reach = va.length() + vb.length();
                if (va.position().x - vb.position().x).abs() > reach {
                    continue;
                }
                if !va.bounds().overlaps(&vb.bounds()) {
                    continue;
                }
                if !(va.crashed() && vb.crashed()) {
                    log::info!("Collision between {:?} and {:?}", a, b);
                }
                let speed = f64::min(va.speed(), vb.speed());
                if let Some([va, vb]) = self.vehicles.get_disjoint_mut([*a, *b]) {
                    va.crash();
                    vb.crash();
                    va.set_speed(speed);
                    vb.set_speed(speed);
                }
            }
        }
    }
}
