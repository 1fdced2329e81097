//! Outbound integrations: Statistics Finland, Oulu open data and Google Places.

pub mod crime;
pub mod fetcher;
pub mod jsonstat;
pub mod oulu;
pub mod places;

pub use crime::{CrimeDataService, PxWebClient, StatisticsClient, SyncReport, SyncTrigger};
pub use fetcher::{HttpFetcher, RetryConfig};
pub use oulu::OuluDataService;
pub use places::PlacesClient;
