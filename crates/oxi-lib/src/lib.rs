pub mod acquisition;
pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod signal;

pub use acquisition::*;
pub use detectors::*;
pub use error::Error;
pub use metrics::*;
pub use signal::*;
