pub mod catalog;
pub mod documents;
pub mod locations;
pub mod orders;
pub mod relocation;

pub use catalog::CatalogResolver;
pub use documents::DocumentOrchestrator;
pub use locations::LocationService;
pub use orders::OrderResolver;
pub use relocation::RelocationService;
