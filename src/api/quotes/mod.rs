pub mod client;
pub mod models;

pub use client::QuoteApiClient;
pub use models::ApiError;
