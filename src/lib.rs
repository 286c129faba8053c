//! Client for the GoodWe SEMS portal: session handling, bounded retries and
//! normalization of station readings.

pub mod api;
pub mod model;
pub mod normalize;
pub mod settings;

pub use api::{ClientOptions, Error, SemsClient};
pub use model::{Credentials, InverterReading, NormalizedSnapshot, PowerState, Powerflow};
pub use settings::Settings;
