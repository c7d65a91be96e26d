pub mod postgres;
pub mod roster_http;

pub use postgres::PostgresStore;
pub use roster_http::HttpRosterProvider;
