mod error;
mod executor;
mod jobs;
mod launcher;
mod pipeline;
mod redirect;

pub use executor::Executor;
