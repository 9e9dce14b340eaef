//! Decision policy and policy optimizer ports.

use crate::domain::agent::TrainingControl;
use crate::domain::environment::TradingEnv;
use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{ActionLog, EquityCurve};

/// A trained decision rule: state vector in, one share delta per symbol out.
pub trait Policy: Send + std::fmt::Debug {
    fn act(&self, state: &[f64]) -> Vec<f64>;
}

pub trait PolicyOptimizer: Send + Sync {
    /// Optimize a policy against `env` within `step_budget` environment
    /// steps. Implementations call `control.checkpoint` periodically.
    fn train(
        &self,
        env: &mut TradingEnv,
        step_budget: usize,
        control: &TrainingControl,
    ) -> Result<Box<dyn Policy>, PapertraderError>;

    /// Greedy deterministic rollout of `policy` from a fresh episode.
    fn predict(
        &self,
        policy: &dyn Policy,
        env: &mut TradingEnv,
    ) -> Result<(EquityCurve, ActionLog), PapertraderError> {
        let mut state = env.reset();
        loop {
            let actions = policy.act(&state);
            let step = env.step(&actions)?;
            state = step.state;
            if step.done {
                break;
            }
        }
        Ok((env.equity_curve().clone(), env.action_log().clone()))
    }
}
