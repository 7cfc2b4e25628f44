//! Backtest source port trait.

use crate::domain::error::MethodologyError;
use crate::domain::record::BacktestRecord;
use chrono::NaiveDate;

/// Reader over the logical tables of a backtest workbook export.
pub trait BacktestSource {
    /// Records of `table`, restricted to one reporting month when given.
    ///
    /// A table the source does not hold is [`MethodologyError::TableNotFound`].
    fn read_table(
        &self,
        table: &str,
        month: Option<NaiveDate>,
    ) -> Result<Vec<BacktestRecord>, MethodologyError>;
}
