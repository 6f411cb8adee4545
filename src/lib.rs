// Public surface for library users
pub mod models;
pub mod data_provider;
pub mod errors;

// Kept public for the binary; not a stable library API
#[doc(hidden)]
pub mod artifacts;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod delivery;
#[doc(hidden)]
pub mod providers;
#[doc(hidden)]
pub mod render;
#[doc(hidden)]
pub mod services;
#[doc(hidden)]
pub mod util;

pub use data_provider::MarketDataClient;
pub use errors::{Result, SnapshotError};
pub use models::ranking::{RankedList, Rankings, ReturnSample, VolumeMode, VolumeSummary};
pub use models::series::{MarketSnapshot, TickerHistory};
pub use models::ticker::{SuffixPolicy, Ticker};
