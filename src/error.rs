//! Rejections raised by the submission workflow before the engine runs.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SubmissionError {
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(f64),
    #[error("entry price must be positive, got {0}")]
    NonPositiveEntryPrice(f64),
    #[error("exit price must be positive, got {0}")]
    NonPositiveExitPrice(f64),
    #[error("stop-loss must be positive, got {0}")]
    NonPositiveStopLoss(f64),
    #[error("exit time {exit} is before entry time {entry}")]
    ExitBeforeEntry { entry: String, exit: String },
    #[error("exit time given without an exit price")]
    ExitTimeWithoutPrice,
    #[error("unrecognized entry line: {0}")]
    UnrecognizedEntry(String),
    #[error("malformed JSON submission: {0}")]
    MalformedJson(String),
}
