pub mod analysis;
pub mod forecast;
pub mod insights;
pub mod preprocess;
pub mod schema;
pub mod stats;
