// Query module - parses, plans and runs entity queries
pub mod executor;
pub mod parser;
pub mod plan;

pub use executor::{Parameters, QueryExecutor, QueryResult};
pub use parser::QueryParser;
pub use plan::QueryPlan;
