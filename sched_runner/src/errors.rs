// thiserror-based error types for the runner
use callback_sched::SchedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("IO: {0}")] Io(#[from] std::io::Error),
    #[error("Config: {0}")] Config(String),
    #[error("Schedule: {0}")] Schedule(#[from] SchedError),
}
