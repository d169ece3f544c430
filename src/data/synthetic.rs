//! Synthetic plate generation from Gompertz ground truth.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::modified_gompertz;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Total wells, blanks included.
    pub samples: usize,
    /// Leading wells that only carry the background signal.
    pub blanks: usize,
    /// Wells per strain; replicates share their true parameters.
    pub replicates: usize,
    pub duration: f64,
    pub interval: f64,
    /// Medium background added to every well.
    pub background: f64,
    /// Inoculum density above background.
    pub n0: f64,
    /// Range for the log-scale capacity `A`.
    pub capacity: (f64, f64),
    pub growth_rate: (f64, f64),
    pub lag: (f64, f64),
    /// Std dev of additive Gaussian measurement noise.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            samples: 96,
            blanks: 3,
            replicates: 3,
            duration: 24.0,
            interval: 0.25,
            background: 0.05,
            n0: 0.01,
            capacity: (3.0, 4.5),
            growth_rate: (0.4, 0.9),
            lag: (1.5, 4.0),
            noise: 0.002,
            seed: 42,
        }
    }
}

/// Parameters used to generate one well.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrueParams {
    pub name: String,
    pub capacity: f64,
    pub mu: f64,
    pub lag: f64,
}

#[derive(Debug, Clone)]
pub struct SimulatedPlate {
    pub times: Vec<f64>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
    /// One entry per growing well, in row order.
    pub truth: Vec<TrueParams>,
}

pub fn simulate_plate(config: &SimulationConfig) -> Result<SimulatedPlate, AppError> {
    if config.samples == 0 || config.blanks >= config.samples {
        return Err(AppError::input("Sample count must exceed the number of blank wells."));
    }
    if config.replicates == 0 {
        return Err(AppError::input("Replicate count must be > 0."));
    }
    if !(config.interval.is_finite() && config.duration.is_finite() && config.interval > 0.0 && config.duration > config.interval) {
        return Err(AppError::input("Invalid time grid for simulation."));
    }
    for (label, (lo, hi)) in [
        ("capacity", config.capacity),
        ("growth rate", config.growth_rate),
        ("lag", config.lag),
    ] {
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && hi >= lo) {
            return Err(AppError::input(format!("Invalid {label} range for simulation.")));
        }
    }
    if !(config.n0 > 0.0 && config.background >= 0.0) {
        return Err(AppError::input("Inoculum must be > 0 and background >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise.max(0.0))
        .map_err(|e| AppError::internal(format!("Noise distribution error: {e}")))?;

    let steps = (config.duration / config.interval).floor() as usize;
    let times: Vec<f64> = (0..=steps).map(|i| i as f64 * config.interval).collect();

    let mut rows = Vec::with_capacity(config.samples);
    for i in 0..config.blanks {
        let trace = times
            .iter()
            .map(|_| Some(config.background + normal.sample(&mut rng)))
            .collect();
        rows.push((format!("blank {}", i + 1), trace));
    }

    let mut truth = Vec::with_capacity(config.samples - config.blanks);
    let mut strain = None;
    for j in 0..config.samples - config.blanks {
        let replicate = j % config.replicates;
        if replicate == 0 || strain.is_none() {
            strain = Some((
                rng.gen_range(config.capacity.0..=config.capacity.1),
                rng.gen_range(config.growth_rate.0..=config.growth_rate.1),
                rng.gen_range(config.lag.0..=config.lag.1),
            ));
        }
        let Some((capacity, mu, lag)) = strain else {
            continue;
        };

        let name = format!("strain{}_{}", j / config.replicates + 1, replicate + 1);
        let trace = times
            .iter()
            .map(|&t| {
                let od = config.n0 * modified_gompertz(t, capacity, mu, lag).exp();
                Some(config.background + od + normal.sample(&mut rng))
            })
            .collect();
        rows.push((name.clone(), trace));
        truth.push(TrueParams {
            name,
            capacity,
            mu,
            lag,
        });
    }

    Ok(SimulatedPlate { times, rows, truth })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_plate() {
        let cfg = SimulationConfig {
            samples: 12,
            ..SimulationConfig::default()
        };
        let a = simulate_plate(&cfg).unwrap();
        let b = simulate_plate(&cfg).unwrap();
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.truth, b.truth);
        assert_eq!(a.rows.len(), 12);
        assert_eq!(a.truth.len(), 9);
    }

    #[test]
    fn replicates_share_parameters() {
        let cfg = SimulationConfig {
            samples: 9,
            noise: 0.0,
            ..SimulationConfig::default()
        };
        let plate = simulate_plate(&cfg).unwrap();
        assert_eq!(plate.truth[0].name, "strain1_1");
        assert_eq!(plate.truth[0].mu, plate.truth[2].mu);
        assert_eq!(plate.truth[3].name, "strain2_1");
        assert_eq!(plate.rows[0].0, "blank 1");
    }

    #[test]
    fn rejects_bad_layouts() {
        let cfg = SimulationConfig {
            samples: 3,
            blanks: 3,
            ..SimulationConfig::default()
        };
        assert!(simulate_plate(&cfg).is_err());
    }
}
