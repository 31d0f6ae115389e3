pub mod config;
pub mod error;
pub mod graphql;
pub mod miners;
pub mod models;
pub mod queries;
pub mod util;

pub use config::Config;
pub use error::{Error, Result};
pub use graphql::{Client, ClientBuilder, PersonalAccessTokenAuthenticator};
pub use miners::{ProfileMetricsMiner, RepositoryContributionsMiner, UserMetricsMiner};
