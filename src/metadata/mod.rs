pub mod service;

pub use service::MetadataService;
