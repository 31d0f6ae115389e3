pub mod auth;
pub mod client;
pub mod pagination;
pub mod query;

pub use auth::{Authenticator, PersonalAccessTokenAuthenticator};
pub use client::{Client, ClientBuilder, PageStream, RateLimitSnapshot};
pub use pagination::{PageState, PaginatedQuery, Paginator};
pub use query::{ArgValue, Query, QueryNode, Selection, SubValue, Substitutions};
