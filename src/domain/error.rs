//! Domain error types.

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PapertraderError {
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data for {context}: have {have}, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("simulation failed for {symbol}: {reason}")]
    Simulation { symbol: String, reason: String },

    #[error("policy optimization failed: {reason}")]
    Optimization { reason: String },

    #[error("training cancelled after {steps} steps")]
    Cancelled { steps: usize },

    #[error("training timed out after {elapsed_secs:.1}s ({steps} steps)")]
    TimedOut { elapsed_secs: f64, steps: usize },

    #[error("cannot {action} while agent is {phase}")]
    InvalidTransition { phase: String, action: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PapertraderError {
    pub fn insufficient(context: impl Into<String>, have: usize, need: usize) -> Self {
        PapertraderError::InsufficientData {
            context: context.into(),
            have,
            need,
        }
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PapertraderError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Per-symbol failures: the batch skips the symbol and keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PapertraderError::DataUnavailable { .. }
                | PapertraderError::InsufficientData { .. }
                | PapertraderError::Simulation { .. }
        )
    }

    /// Re-label an indicator-level `InsufficientData` with the symbol it was computed for.
    pub fn for_symbol(self, symbol: &str) -> Self {
        match self {
            PapertraderError::InsufficientData { context, have, need } => {
                PapertraderError::InsufficientData {
                    context: format!("{symbol} ({context})"),
                    have,
                    need,
                }
            }
            other => other,
        }
    }
}

impl From<&PapertraderError> for std::process::ExitCode {
    fn from(err: &PapertraderError) -> Self {
        let code: u8 = match err {
            PapertraderError::Io(_) | PapertraderError::Csv(_) => 1,
            PapertraderError::ConfigParse { .. }
            | PapertraderError::ConfigMissing { .. }
            | PapertraderError::ConfigInvalid { .. }
            | PapertraderError::InvalidParameter { .. } => 2,
            PapertraderError::DataUnavailable { .. }
            | PapertraderError::InsufficientData { .. } => 3,
            PapertraderError::Simulation { .. } | PapertraderError::Optimization { .. } => 4,
            PapertraderError::Cancelled { .. } | PapertraderError::TimedOut { .. } => 5,
            PapertraderError::InvalidTransition { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_per_symbol_kinds() {
        let data = PapertraderError::DataUnavailable {
            symbol: "AAPL".into(),
            reason: "timeout".into(),
        };
        let short = PapertraderError::insufficient("RSI(14)", 3, 16);
        let sim = PapertraderError::Simulation {
            symbol: "AAPL".into(),
            reason: "engine crashed".into(),
        };
        assert!(data.is_recoverable());
        assert!(short.is_recoverable());
        assert!(sim.is_recoverable());
    }

    #[test]
    fn run_level_errors_are_not_recoverable() {
        assert!(!PapertraderError::invalid("rsi_min", "must be <= 100").is_recoverable());
        assert!(
            !PapertraderError::Optimization {
                reason: "diverged".into()
            }
            .is_recoverable()
        );
        assert!(!PapertraderError::Cancelled { steps: 10 }.is_recoverable());
    }

    #[test]
    fn for_symbol_relabels_insufficient_data() {
        let err = PapertraderError::insufficient("SMA(50)", 20, 50).for_symbol("MSFT");
        assert_eq!(
            err.to_string(),
            "insufficient data for MSFT (SMA(50)): have 20, need 50"
        );
    }

    #[test]
    fn for_symbol_leaves_other_errors_alone() {
        let err = PapertraderError::invalid("period", "must be positive").for_symbol("MSFT");
        assert!(matches!(err, PapertraderError::InvalidParameter { .. }));
    }

    #[test]
    fn display_messages() {
        let err = PapertraderError::ConfigInvalid {
            section: "screening".into(),
            key: "rsi_max".into(),
            reason: "must be between 0 and 100".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [screening] rsi_max: must be between 0 and 100"
        );
        let err = PapertraderError::InvalidTransition {
            phase: "Created".into(),
            action: "paper trade".into(),
        };
        assert_eq!(err.to_string(), "cannot paper trade while agent is Created");
    }
}
