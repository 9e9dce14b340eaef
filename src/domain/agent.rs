//! Trading agent lifecycle: train a policy, paper-trade it on held-out data,
//! then account for the result.
//!
//! `Created -> Training -> Trained -> PaperTrading -> Completed`, with
//! `Failed` reachable from `Training` and `PaperTrading`. Each agent runs
//! once; there is no retraining path.

use crate::domain::environment::{TradingEnv, TradingSession};
use crate::domain::error::PapertraderError;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::portfolio::{ActionLog, EquityCurve};
use crate::domain::price_table::PriceTable;
use crate::ports::policy_port::{Policy, PolicyOptimizer};
use chrono::NaiveDate;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Created,
    Training,
    Trained,
    PaperTrading,
    Completed,
    Failed,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shared cancel flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingProgress {
    pub steps: usize,
    pub step_budget: usize,
    pub best_reward: f64,
}

impl TrainingProgress {
    pub fn fraction(&self) -> f64 {
        if self.step_budget == 0 {
            return 1.0;
        }
        (self.steps as f64 / self.step_budget as f64).min(1.0)
    }
}

/// Cancellation, deadline and progress reporting for one training call.
#[derive(Debug, Clone)]
pub struct TrainingControl {
    token: CancellationToken,
    started: Instant,
    timeout: Option<Duration>,
    progress: Option<Sender<TrainingProgress>>,
}

impl Default for TrainingControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingControl {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            started: Instant::now(),
            timeout: None,
            progress: None,
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, sender: Sender<TrainingProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Report progress and check for cancellation or an expired deadline.
    /// Optimizers call this between units of work and stop on `Err`.
    pub fn checkpoint(&self, progress: TrainingProgress) -> Result<(), PapertraderError> {
        if self.token.is_cancelled() {
            return Err(PapertraderError::Cancelled {
                steps: progress.steps,
            });
        }
        let elapsed = self.started.elapsed();
        if self.timeout.is_some_and(|t| elapsed >= t) {
            return Err(PapertraderError::TimedOut {
                elapsed_secs: elapsed.as_secs_f64(),
                steps: progress.steps,
            });
        }
        if let Some(sender) = &self.progress {
            // receiver may have gone away; training carries on regardless
            let _ = sender.send(progress);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingReport {
    pub equity_curve: EquityCurve,
    pub action_log: ActionLog,
    pub summary: PerformanceSummary,
}

#[derive(Debug)]
pub struct TradingAgent {
    session: TradingSession,
    phase: AgentPhase,
    env: Option<TradingEnv>,
    policy: Option<Box<dyn Policy>>,
    training_end: Option<NaiveDate>,
    results: Option<(EquityCurve, ActionLog)>,
    failure: Option<String>,
}

impl TradingAgent {
    pub fn new(session: TradingSession) -> Result<Self, PapertraderError> {
        session.validate()?;
        Ok(Self {
            session,
            phase: AgentPhase::Created,
            env: None,
            policy: None,
            training_end: None,
            results: None,
            failure: None,
        })
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn session(&self) -> &TradingSession {
        &self.session
    }

    pub fn policy(&self) -> Option<&dyn Policy> {
        self.policy.as_deref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn training_end(&self) -> Option<NaiveDate> {
        self.training_end
    }

    /// Optimize a policy on `table`. Any failure moves the agent to
    /// `Failed` and is returned; nothing is retried. The session timeout
    /// applies unless `control` carries its own deadline.
    pub fn train(
        &mut self,
        table: PriceTable,
        optimizer: &dyn PolicyOptimizer,
        control: &TrainingControl,
    ) -> Result<(), PapertraderError> {
        self.expect_phase(AgentPhase::Created, "train")?;
        self.phase = AgentPhase::Training;

        let session_bound;
        let control = match (control.timeout, self.session.timeout_secs) {
            (None, Some(secs)) => {
                session_bound = control.clone().with_timeout(Duration::from_secs(secs));
                &session_bound
            }
            _ => control,
        };

        if table.len() < 2 {
            return Err(self.fail(PapertraderError::insufficient(
                "training price table",
                table.len(),
                2,
            )));
        }
        let training_end = table.last_date();
        let mut env = match TradingEnv::new(&self.session, table) {
            Ok(env) => env,
            Err(e) => return Err(self.fail(e)),
        };

        let budget = self.session.step_budget;
        if let Err(e) = control.checkpoint(TrainingProgress {
            steps: 0,
            step_budget: budget,
            best_reward: 0.0,
        }) {
            return Err(self.fail(e));
        }

        info!(
            symbols = env.action_dim(),
            dates = env.table().len(),
            step_budget = budget,
            "training started"
        );
        match optimizer.train(&mut env, budget, control) {
            Ok(policy) => {
                self.policy = Some(policy);
                self.training_end = training_end;
                self.env = Some(env);
                self.phase = AgentPhase::Trained;
                info!("training complete");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Replay the trained policy greedily on held-out data. The table must
    /// start strictly after the last training date.
    pub fn paper_trade(
        &mut self,
        table: PriceTable,
        optimizer: &dyn PolicyOptimizer,
    ) -> Result<(&EquityCurve, &ActionLog), PapertraderError> {
        self.expect_phase(AgentPhase::Trained, "paper trade")?;

        if let (Some(train_end), Some(first)) = (self.training_end, table.first_date()) {
            if first <= train_end {
                return Err(PapertraderError::invalid(
                    "paper trading table",
                    format!("starts {first}, not after training end {train_end}"),
                ));
            }
        }
        if table.len() < 2 {
            return Err(PapertraderError::insufficient(
                "paper trading price table",
                table.len(),
                2,
            ));
        }

        self.phase = AgentPhase::PaperTrading;
        let mut env = match TradingEnv::new(&self.session, table) {
            Ok(env) => env,
            Err(e) => return Err(self.fail(e)),
        };
        let Some(policy) = self.policy.as_deref() else {
            let e = PapertraderError::Optimization {
                reason: "no trained policy".into(),
            };
            return Err(self.fail(e));
        };
        let replay = optimizer.predict(policy, &mut env);
        self.env = Some(env);
        match replay {
            Ok((curve, log)) => {
                info!(steps = curve.len().saturating_sub(1), "paper trading complete");
                let (curve, log) = self.results.insert((curve, log));
                Ok((&*curve, &*log))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run performance accounting over the paper-trading results.
    pub fn complete(&mut self) -> Result<TradingReport, PapertraderError> {
        self.expect_phase(AgentPhase::PaperTrading, "complete")?;
        let Some((equity_curve, action_log)) = self.results.take() else {
            return Err(PapertraderError::InvalidTransition {
                phase: self.phase.to_string(),
                action: "complete before paper trading finished".into(),
            });
        };
        let summary = PerformanceSummary::from_equity(&equity_curve);
        self.phase = AgentPhase::Completed;
        Ok(TradingReport {
            equity_curve,
            action_log,
            summary,
        })
    }

    fn expect_phase(&self, expected: AgentPhase, action: &str) -> Result<(), PapertraderError> {
        if self.phase != expected {
            return Err(PapertraderError::InvalidTransition {
                phase: self.phase.to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, err: PapertraderError) -> PapertraderError {
        error!(phase = %self.phase, error = %err, "agent failed");
        self.failure = Some(err.to_string());
        self.phase = AgentPhase::Failed;
        err
    }
}

/// What a finished background training task hands back.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub agent: TradingAgent,
    pub result: Result<(), PapertraderError>,
}

/// Training running on a worker thread.
pub struct TrainingTask {
    handle: JoinHandle<TrainingOutcome>,
    token: CancellationToken,
    progress: Receiver<TrainingProgress>,
}

impl TrainingTask {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Drain progress reports received so far.
    pub fn progress(&self) -> Vec<TrainingProgress> {
        self.progress.try_iter().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for training to end and take the agent back.
    pub fn join(self) -> Result<TrainingOutcome, PapertraderError> {
        self.handle.join().map_err(|_| PapertraderError::Optimization {
            reason: "training thread panicked".into(),
        })
    }
}

/// Train `agent` on a worker thread. The session's timeout, if any, bounds
/// the run.
pub fn spawn_training(
    mut agent: TradingAgent,
    table: PriceTable,
    optimizer: Arc<dyn PolicyOptimizer>,
) -> TrainingTask {
    let token = CancellationToken::new();
    let (tx, rx) = mpsc::channel();
    let control = TrainingControl::new()
        .with_token(token.clone())
        .with_progress(tx);

    let handle = thread::spawn(move || {
        let result = agent.train(table, optimizer.as_ref(), &control);
        TrainingOutcome { agent, result }
    });

    TrainingTask {
        handle,
        token,
        progress: rx,
    }
}
