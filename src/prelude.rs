//! Convenient imports for common functionality.
//!
//! `use mysql_fluent::prelude::*;` pulls in the session, the statement
//! builder, and the value and result types most callers touch.

pub use crate::clock::ClockOffset;
pub use crate::error::DbError;
pub use crate::params::ParamMap;
pub use crate::results::{Column, ResultTable};
pub use crate::session::DbSession;
pub use crate::statement::Statement;
pub use crate::types::{DbEnum, Value, ValueKind};
