//! Seeded random search over a linear policy.
//!
//! A stand-in optimizer that keeps the train/paper-trade pipeline runnable
//! without an external learning library: start from the do-nothing policy,
//! perturb the best weights each episode and keep the perturbation when the
//! episode reward improves.

use crate::domain::agent::{TrainingControl, TrainingProgress};
use crate::domain::environment::TradingEnv;
use crate::domain::error::PapertraderError;
use crate::ports::policy_port::{Policy, PolicyOptimizer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

pub const DEFAULT_NOISE: f64 = 0.5;

/// `action_j = hmax * tanh(sum_k w_jk * state_k / scale_k + b_j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPolicy {
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
    scale: Vec<f64>,
    hmax: f64,
}

impl LinearPolicy {
    /// All-zero weights: never trades.
    pub fn zero(action_dim: usize, scale: Vec<f64>, hmax: f64) -> Self {
        Self {
            weights: vec![vec![0.0; scale.len()]; action_dim],
            bias: vec![0.0; action_dim],
            scale,
            hmax,
        }
    }

    fn perturbed(&self, rng: &mut StdRng, noise: f64) -> Self {
        let mut next = self.clone();
        for row in &mut next.weights {
            for w in row.iter_mut() {
                *w += rng.gen_range(-noise..=noise);
            }
        }
        for b in &mut next.bias {
            *b += rng.gen_range(-noise..=noise);
        }
        next
    }
}

impl Policy for LinearPolicy {
    fn act(&self, state: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z: f64 = row
                    .iter()
                    .zip(state.iter().zip(&self.scale))
                    .map(|(w, (s, scale))| w * s / scale)
                    .sum();
                self.hmax * (z + b).tanh()
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RandomSearchOptimizer {
    noise: f64,
}

impl Default for RandomSearchOptimizer {
    fn default() -> Self {
        Self {
            noise: DEFAULT_NOISE,
        }
    }
}

impl RandomSearchOptimizer {
    pub fn new(noise: f64) -> Self {
        Self { noise }
    }
}

/// Play one full episode; returns total reward and steps taken.
fn rollout(env: &mut TradingEnv, policy: &LinearPolicy) -> Result<(f64, usize), PapertraderError> {
    let mut state = env.reset();
    let mut total = 0.0;
    let mut steps = 0;
    loop {
        let step = env.step(&policy.act(&state))?;
        total += step.reward;
        steps += 1;
        state = step.state;
        if step.done {
            return Ok((total, steps));
        }
    }
}

impl PolicyOptimizer for RandomSearchOptimizer {
    fn train(
        &self,
        env: &mut TradingEnv,
        step_budget: usize,
        control: &TrainingControl,
    ) -> Result<Box<dyn Policy>, PapertraderError> {
        if !(self.noise.is_finite() && self.noise > 0.0) {
            return Err(PapertraderError::Optimization {
                reason: format!("noise must be positive, got {}", self.noise),
            });
        }
        let episode_len = env.episode_len();
        if episode_len == 0 || step_budget < episode_len {
            return Err(PapertraderError::Optimization {
                reason: format!(
                    "step budget {step_budget} is smaller than one episode ({episode_len} steps)"
                ),
            });
        }

        let scale: Vec<f64> = env.reset().iter().map(|v| v.abs().max(1.0)).collect();
        let hmax = env.session().hmax as f64;
        let mut rng = StdRng::seed_from_u64(env.session().seed);

        let mut best = LinearPolicy::zero(env.action_dim(), scale, hmax);
        let (mut best_reward, mut steps) = rollout(env, &best)?;
        let mut improvements = 0usize;

        while steps + episode_len <= step_budget {
            control.checkpoint(TrainingProgress {
                steps,
                step_budget,
                best_reward,
            })?;
            let candidate = best.perturbed(&mut rng, self.noise);
            let (reward, used) = rollout(env, &candidate)?;
            steps += used;
            if reward.is_finite() && reward > best_reward {
                debug!(steps, reward, previous = best_reward, "policy improved");
                best = candidate;
                best_reward = reward;
                improvements += 1;
            }
        }

        control.checkpoint(TrainingProgress {
            steps,
            step_budget,
            best_reward,
        })?;
        info!(steps, improvements, best_reward, "random search finished");
        Ok(Box::new(best))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::CancellationToken;
    use crate::domain::environment::TradingSession;
    use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
    use crate::domain::price_table::PriceTable;
    use chrono::NaiveDate;
    use std::sync::mpsc;

    fn table(closes: &[f64]) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            })
            .collect();
        PriceTable::align(&[PriceSeries::new("TEST", bars).unwrap()]).unwrap()
    }

    fn env(closes: &[f64], budget: usize) -> TradingEnv {
        let session = TradingSession {
            initial_cash: 10_000.0,
            step_budget: budget,
            reward_scaling: 1.0,
            ..Default::default()
        };
        TradingEnv::new(&session, table(closes)).unwrap()
    }

    #[test]
    fn zero_policy_holds() {
        let policy = LinearPolicy::zero(2, vec![1.0; 5], 100.0);
        assert_eq!(policy.act(&[10.0, 1.0, 2.0, 0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn actions_bounded_by_hmax() {
        let mut policy = LinearPolicy::zero(1, vec![1.0; 3], 50.0);
        policy.bias[0] = 1e6;
        let out = policy.act(&[0.0, 0.0, 0.0]);
        assert!(out[0] <= 50.0 && out[0] > 49.0);
    }

    #[test]
    fn budget_smaller_than_episode_fails() {
        let mut env = env(&[10.0; 11], 5);
        let err = RandomSearchOptimizer::default()
            .train(&mut env, 5, &TrainingControl::new())
            .unwrap_err();
        assert!(matches!(err, PapertraderError::Optimization { .. }));
    }

    #[test]
    fn learns_to_buy_a_rising_market() {
        let closes: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let mut env = env(&closes, 29 * 200);
        let policy = RandomSearchOptimizer::default()
            .train(&mut env, 29 * 200, &TrainingControl::new())
            .unwrap();
        let (curve, _) = RandomSearchOptimizer::default().predict(policy.as_ref(), &mut env).unwrap();
        let last = curve.last().unwrap().value;
        assert!(last > 10_000.0);
    }

    #[test]
    fn same_seed_same_policy() {
        let closes: Vec<f64> = (0..15).map(|i| 20.0 + (i as f64).sin()).collect();
        let run = || {
            let mut env = env(&closes, 14 * 20);
            let policy = RandomSearchOptimizer::default()
                .train(&mut env, 14 * 20, &TrainingControl::new())
                .unwrap();
            RandomSearchOptimizer::default().predict(policy.as_ref(), &mut env).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn cancellation_stops_training() {
        let token = CancellationToken::new();
        token.cancel();
        let control = TrainingControl::new().with_token(token);
        let mut env = env(&[10.0; 11], 1_000);
        let err = RandomSearchOptimizer::default()
            .train(&mut env, 1_000, &control)
            .unwrap_err();
        assert!(matches!(err, PapertraderError::Cancelled { steps: 10 }));
    }

    #[test]
    fn reports_progress_per_episode() {
        let (tx, rx) = mpsc::channel();
        let control = TrainingControl::new().with_progress(tx);
        let mut env = env(&[10.0; 11], 50);
        RandomSearchOptimizer::default().train(&mut env, 50, &control).unwrap();
        let steps: Vec<usize> = rx.try_iter().map(|p| p.steps).collect();
        assert_eq!(steps, vec![10, 20, 30, 40, 50]);
    }
}
