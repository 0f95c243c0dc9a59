#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod gateway;
pub mod network;
pub mod review_service;
pub mod session;
pub mod sync;

pub use vocab_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, GatewayError, ReviewServiceError, SessionError};
pub use gateway::{GatewayConfig, HttpRemoteGateway, RemoteGateway};
pub use network::NetworkMonitor;
pub use review_service::{AppliedAssessment, ReviewService};
pub use session::{SessionController, SessionPhase, SessionProgress, SubmittedReview};
pub use sync::{DEFAULT_SYNC_PERIOD, SyncService};
