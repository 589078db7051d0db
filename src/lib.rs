pub mod adapters;
pub mod app;
pub mod config;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{QueuedSink, SqliteStore, TracingSink, TtlCache};
pub use app::{App, DeskResponse, RegistrationDesk};
pub use config::AppConfig;
pub use domain::model::{Caller, Course, DomainEvent, EnrollmentReceipt, NewCourse, NewStudent, Student};
pub use domain::services::{CatalogService, RegistrationService};
pub use utils::error::{Entity, RegistryError, Result};
