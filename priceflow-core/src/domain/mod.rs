//! Domain types: rows, price cells and frames.

pub mod frame;
pub mod row;

pub use frame::{Frame, BASE_COLUMNS, FEATURE_COLUMNS, TIMESTAMP_FORMAT};
pub use row::{Features, Price, Row};

/// Symbol type alias
pub type Symbol = String;
