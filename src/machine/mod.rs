use thiserror::Error;

mod driver;
#[allow(clippy::module_inception)]
mod machine;
mod simulate;

pub use driver::*;
pub use machine::*;
pub use simulate::*;

#[derive(Error, Debug)]
pub enum MachineError {
    #[error("bus closed")]
    Closed,
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
