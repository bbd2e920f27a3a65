// moviedb - an in-memory movie database queried with an entity query language
// This is the library root that exposes the public API

pub mod config;
pub mod error;
pub mod mapping;
pub mod model;
pub mod query;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{PersistenceConfig, Profile};
pub use error::{Error, Result};
pub use mapping::Metamodel;
pub use model::{Country, Director, Entity, Film, Person, Role};
pub use query::{Parameters, QueryExecutor, QueryParser, QueryPlan, QueryResult};
pub use session::{Session, SessionFactory, TypedQuery};
pub use storage::{dataset::Dataset, Row, Value};
