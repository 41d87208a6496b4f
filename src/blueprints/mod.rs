//! Concrete blueprint definitions shipped with the engine

pub mod lambda;
pub mod postgres;

pub use lambda::{Function, FunctionScheduler};
pub use postgres::PostgresDatabase;
