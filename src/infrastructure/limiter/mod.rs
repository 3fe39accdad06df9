//! Rate limiting: sliding window, token bucket, and the coordinating service

pub mod service;
pub mod sliding_window;
pub mod token_bucket;

pub use service::RateLimiterService;
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;
