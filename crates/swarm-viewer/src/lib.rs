pub mod engine;
pub mod error;
pub mod metrics;
pub mod parser;

pub use engine::identity::ViewerIdentity;
pub use engine::population::{cancel_on, run as run_population, PopulationReport};
pub use engine::transport::{HttpTransport, ViewerTransport};
pub use engine::viewer::{Viewer, ViewerReport, ViewerStats};
pub use error::{NetworkError, ViewerError};
