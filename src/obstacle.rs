//! Obstacle definitions
//!
//! An `Obstacle` describes one kind of hazard: where it may appear, how many
//! and how big, how heavy it is and what a train hitting it does. The
//! built-in catalog can be replaced by one loaded from JSON.

use glam::{Quat, Vec3};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::euler_degrees;

/// Terrain type around the train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    Rock,
    Forest,
    Meadow,
    Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimalType {
    Cow,
    Cat,
    Chicken,
    Goat,
    Pig,
    Sheep,
}

/// What a collision with a train does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Impact {
    pub derail: bool,
    pub explode: bool,
}

/// One kind of obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Obstacle {
    /// Type name, unique within a catalog
    pub kind: String,
    /// Biomes this obstacle shows up in; empty means anywhere
    pub biomes: Vec<Biome>,
    /// Asset bundle the variants are loaded from
    pub asset_bundle: String,
    /// Single prefab to use instead of every variant in the bundle
    pub prefab: Option<String>,
    /// Whether timed random events may pick this obstacle
    pub in_pool: bool,
    /// Impulse (newton-seconds) that derails the train; 0 disables
    pub derail_threshold: f32,

    // === Spawning ===
    pub min_count: usize,
    pub max_count: usize,
    /// Placement search radius; falls back to the configured default
    pub max_radius: Option<f32>,
    /// Any yaw is acceptable (searched in steps) instead of a fixed rotation
    pub free_orientation: bool,

    // === Body ===
    pub min_scale: f32,
    pub max_scale: f32,
    pub min_mass: f32,
    pub max_mass: f32,

    // === Offsets ===
    /// Per-axis multiplier on top of the uniform scale
    pub scale_offset: Option<Vec3>,
    /// Applied on top of the track rotation
    pub rotation_offset: Option<Quat>,

    // === Exploding ===
    /// Impulse (newton-seconds) that blows the obstacle apart; 0 or none disables
    pub explode_threshold: Option<f32>,

    pub animal: Option<AnimalType>,
}

impl Default for Obstacle {
    fn default() -> Self {
        Self {
            kind: String::new(),
            biomes: Vec::new(),
            asset_bundle: String::new(),
            prefab: None,
            in_pool: true,
            derail_threshold: 150_000.0,

            min_count: 1,
            max_count: 1,
            max_radius: None,
            free_orientation: false,

            min_scale: 1.0,
            max_scale: 1.0,
            min_mass: 1000.0,
            max_mass: 1000.0,

            scale_offset: None,
            rotation_offset: None,

            explode_threshold: None,

            animal: None,
        }
    }
}

impl Obstacle {
    /// Whether the obstacle may appear in `biome`
    pub fn allows_biome(&self, biome: Biome) -> bool {
        self.biomes.is_empty() || self.biomes.contains(&biome)
    }

    /// Search radius for placement
    pub fn search_radius(&self, default: f32) -> f32 {
        self.max_radius.unwrap_or(default)
    }

    /// Number of bodies in one event, uniform in `[min_count, max_count]`
    pub fn random_count<R: Rng>(&self, rng: &mut R) -> usize {
        let (lo, hi) = ordered(self.min_count, self.max_count);
        rng.random_range(lo..=hi)
    }

    /// Per-axis body scale: a uniform draw times the scale offset
    pub fn random_scale<R: Rng>(&self, rng: &mut R) -> Vec3 {
        let (lo, hi) = ordered(self.min_scale, self.max_scale);
        let uniform = if hi > lo { rng.random_range(lo..=hi) } else { lo };
        Vec3::splat(uniform) * self.scale_offset.unwrap_or(Vec3::ONE)
    }

    pub fn random_mass<R: Rng>(&self, rng: &mut R) -> f32 {
        let (lo, hi) = ordered(self.min_mass, self.max_mass);
        if hi > lo { rng.random_range(lo..=hi) } else { lo }
    }

    /// Desired rotation of a body placed on track facing `track_rotation`
    pub fn desired_rotation(&self, track_rotation: Quat) -> Option<Quat> {
        self.rotation_offset.map(|offset| track_rotation * offset)
    }

    /// Outcome of a train hitting this obstacle with `impulse`
    pub fn evaluate_impact(&self, impulse: f32) -> Impact {
        let derail = self.derail_threshold > 0.0 && impulse >= self.derail_threshold;
        let explode = match self.explode_threshold {
            Some(threshold) if threshold > 0.0 => impulse >= threshold,
            _ => false,
        };
        Impact { derail, explode }
    }

    /// Display label for one spawned instance
    pub fn label(&self, id: u64) -> String {
        format!("{} #{}", self.kind, id)
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if b < a { (b, a) } else { (a, b) }
}

/// The set of obstacles events can choose from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleCatalog {
    pub obstacles: Vec<Obstacle>,
}

impl Default for ObstacleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ObstacleCatalog {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    /// The stock obstacles
    pub fn builtin() -> Self {
        let animal = |kind: &str, animal: AnimalType, biomes: Vec<Biome>, in_pool: bool, min_count: usize| Obstacle {
            kind: kind.to_string(),
            asset_bundle: "bloodsplat".to_string(),
            biomes,
            in_pool,
            min_count,
            max_count: 10,
            max_radius: Some(5.0),
            free_orientation: true,
            min_scale: 0.8,
            max_scale: 1.2,
            min_mass: 1000.0,
            max_mass: 2000.0,
            explode_threshold: Some(15_000.0),
            animal: Some(animal),
            ..Obstacle::default()
        };

        Self::new(vec![
            Obstacle {
                kind: "Rockslide".to_string(),
                asset_bundle: "rocks".to_string(),
                biomes: vec![Biome::Rock],
                min_count: 5,
                max_count: 10,
                min_scale: 1.5,
                max_scale: 2.0,
                min_mass: 5000.0,
                max_mass: 7500.0,
                ..Obstacle::default()
            },
            Obstacle {
                kind: "FallenTrees".to_string(),
                asset_bundle: "trees".to_string(),
                biomes: vec![Biome::Forest],
                min_scale: 4.0,
                max_scale: 6.0,
                min_mass: 15_000.0,
                max_mass: 25_000.0,
                // Lay across the track
                rotation_offset: Some(euler_degrees(Vec3::new(90.0, 90.0, 0.0))),
                ..Obstacle::default()
            },
            Obstacle {
                kind: "FunRamp".to_string(),
                asset_bundle: "fun".to_string(),
                prefab: Some("ObstacleRamp".to_string()),
                in_pool: false,
                min_mass: 999_999.0,
                max_mass: 999_999.0,
                scale_offset: Some(Vec3::new(1.5, 1.0, 1.5)),
                rotation_offset: Some(euler_degrees(Vec3::new(0.0, -90.0, 0.0))),
                // Very low for launch
                derail_threshold: 5000.0,
                ..Obstacle::default()
            },
            animal("Cows", AnimalType::Cow, vec![Biome::Meadow, Biome::Field], true, 1),
            animal("Cats", AnimalType::Cat, Vec::new(), false, 1),
            animal("Chicken", AnimalType::Chicken, Vec::new(), false, 5),
            animal("Goats", AnimalType::Goat, Vec::new(), false, 1),
            animal("Pigs", AnimalType::Pig, Vec::new(), false, 1),
            animal("Sheep", AnimalType::Sheep, Vec::new(), false, 1),
        ])
    }

    /// Parse a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let catalog: ObstacleCatalog = serde_json::from_str(json)?;
        if let Some(bad) = catalog.obstacles.iter().find(|o| o.kind.is_empty()) {
            return Err(SettingsError::Invalid(format!(
                "obstacle with bundle '{}' has no type name",
                bad.asset_bundle
            )));
        }
        Ok(catalog)
    }

    pub fn get(&self, kind: &str) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.kind.eq_ignore_ascii_case(kind))
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Obstacles eligible for a random event
    ///
    /// `biome: None` ignores biome restrictions; `everything` also includes
    /// obstacles kept out of the pool.
    pub fn pool(&self, biome: Option<Biome>, everything: bool) -> Vec<&Obstacle> {
        self.obstacles
            .iter()
            .filter(|o| everything || o.in_pool)
            .filter(|o| biome.is_none_or(|b| o.allows_biome(b)))
            .collect()
    }

    /// Pick a random eligible obstacle
    pub fn choose<R: Rng>(&self, rng: &mut R, biome: Option<Biome>, everything: bool) -> Option<&Obstacle> {
        self.pool(biome, everything).choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_builtin_catalog() {
        let catalog = ObstacleCatalog::builtin();
        assert_eq!(catalog.len(), 9);
        assert!(catalog.get("rockslide").is_some());
        assert!(catalog.get("Dragons").is_none());
        assert!(catalog.obstacles.iter().all(|o| o.min_count <= o.max_count));
    }

    #[test]
    fn test_pool_filters_biome_and_flag() {
        let catalog = ObstacleCatalog::builtin();
        let kinds = |pool: Vec<&Obstacle>| pool.iter().map(|o| o.kind.clone()).collect::<Vec<_>>();

        assert_eq!(kinds(catalog.pool(Some(Biome::Rock), false)), vec!["Rockslide"]);
        assert_eq!(kinds(catalog.pool(Some(Biome::Field), false)), vec!["Cows"]);
        assert_eq!(kinds(catalog.pool(None, false)), vec!["Rockslide", "FallenTrees", "Cows"]);
        assert_eq!(catalog.pool(None, true).len(), 9);
        // Biome-less obstacles go anywhere once forced in
        assert!(kinds(catalog.pool(Some(Biome::Rock), true)).contains(&"Cats".to_string()));
    }

    #[test]
    fn test_choose_is_deterministic() {
        let catalog = ObstacleCatalog::builtin();
        let pick = |seed| {
            let mut rng = Pcg32::seed_from_u64(seed);
            (0..10)
                .map(|_| catalog.choose(&mut rng, None, false).unwrap().kind.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(7), pick(7));

        let mut rng = Pcg32::seed_from_u64(1);
        assert!(ObstacleCatalog::new(Vec::new()).choose(&mut rng, None, true).is_none());
    }

    #[test]
    fn test_random_ranges() {
        let catalog = ObstacleCatalog::builtin();
        let rocks = catalog.get("Rockslide").unwrap();
        let ramp = catalog.get("FunRamp").unwrap();
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..100 {
            let count = rocks.random_count(&mut rng);
            assert!((5..=10).contains(&count));
            let scale = rocks.random_scale(&mut rng);
            assert!(scale.x >= 1.5 && scale.x <= 2.0);
            assert_eq!(scale.x, scale.z);
            let mass = rocks.random_mass(&mut rng);
            assert!((5000.0..=7500.0).contains(&mass));
        }
        assert_eq!(ramp.random_scale(&mut rng), Vec3::new(1.5, 1.0, 1.5));
        assert_eq!(ramp.random_count(&mut rng), 1);
    }

    #[test]
    fn test_evaluate_impact() {
        let catalog = ObstacleCatalog::builtin();
        let cows = catalog.get("Cows").unwrap();
        assert_eq!(cows.evaluate_impact(1000.0), Impact::default());
        assert_eq!(
            cows.evaluate_impact(20_000.0),
            Impact {
                derail: false,
                explode: true
            }
        );
        assert_eq!(
            cows.evaluate_impact(150_000.0),
            Impact {
                derail: true,
                explode: true
            }
        );

        let mut harmless = Obstacle::default();
        harmless.derail_threshold = 0.0;
        harmless.explode_threshold = Some(0.0);
        assert_eq!(harmless.evaluate_impact(1e9), Impact::default());
    }

    #[test]
    fn test_desired_rotation() {
        let catalog = ObstacleCatalog::builtin();
        let rocks = catalog.get("Rockslide").unwrap();
        assert!(rocks.desired_rotation(Quat::IDENTITY).is_none());

        let ramp = catalog.get("FunRamp").unwrap();
        let rot = ramp.desired_rotation(Quat::IDENTITY).unwrap();
        // Ramp faces along -X on a track running along +Z
        assert!(((rot * Vec3::Z) - -Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_catalog_json() {
        let catalog = ObstacleCatalog::from_json(
            r#"{ "obstacles": [ { "kind": "Boulder", "asset_bundle": "rocks", "min_count": 2, "max_count": 3 } ] }"#,
        )
        .unwrap();
        let boulder = catalog.get("Boulder").unwrap();
        assert_eq!(boulder.max_count, 3);
        assert!(boulder.in_pool);
        assert_eq!(boulder.derail_threshold, 150_000.0);

        let err = ObstacleCatalog::from_json(r#"{ "obstacles": [ { "asset_bundle": "rocks" } ] }"#).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));

        let json = serde_json::to_string(&ObstacleCatalog::builtin()).unwrap();
        assert_eq!(ObstacleCatalog::from_json(&json).unwrap(), ObstacleCatalog::builtin());
    }
}
