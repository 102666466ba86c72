mod clock;
mod mysql;
mod params;

pub mod error;
pub mod results;
pub mod session;
pub mod statement;
pub mod types;

pub mod prelude;

pub use clock::ClockOffset;
pub use error::DbError;
pub use params::ParamMap;
pub use results::{Column, ResultTable};
pub use session::DbSession;
pub use statement::Statement;
pub use types::{DbEnum, Value, ValueKind};
