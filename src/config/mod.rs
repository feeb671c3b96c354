pub mod consumer;

pub use consumer::ConsumerConfig;
