pub mod app;
pub mod cli;
pub mod config;
pub mod facets;
pub mod financials;
pub mod pipeline;
pub mod registry;
pub mod view;

#[cfg(test)]
mod tests;
