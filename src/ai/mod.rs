mod client;
mod gateway;
mod parse;
mod prompts;

pub use client::{GatewayConfig, GeminiClient};
pub use gateway::AiGateway;

#[cfg(test)]
pub(crate) use gateway::testing;
