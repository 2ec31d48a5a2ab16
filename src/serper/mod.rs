pub mod client;
pub mod types;

pub use client::{SearchApi, SerperClient, SerperError};
pub use types::{ImageResult, NewsItem};
