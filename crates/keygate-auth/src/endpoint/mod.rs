//! Endpoint orchestrators.
//!
//! [`TokenEndpoint`] and [`AuthorizeEndpoint`] sequence the validation
//! pipelines and the strategy registries; both run an ordered stage
//! chain so hosts can splice in their own behavior without touching
//! the fixed protocol steps.

mod authorize;
mod extension;
mod token;

pub use authorize::{
    AuthorizeEndpoint, AuthorizeOutcome, InteractionContext, InteractionStage,
    default_interaction_stages,
};
pub use extension::{StageContext, StageOutcome, TokenEndpointStage, TokenResponse, run_stages};
pub use token::TokenEndpoint;
