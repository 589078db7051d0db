pub mod catalog;
pub mod registration;

pub use catalog::CatalogService;
pub use registration::RegistrationService;
