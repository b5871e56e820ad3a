//! Commit endpoint port for normalized trades.

use crate::domain::error::TradeportError;
use crate::domain::trade::ExtractedTrade;

pub trait TradeStore {
    /// Persist the selected trades, already stamped with the resolved
    /// broker. Returns the number of trades written.
    fn commit_trades(
        &self,
        trades: &[ExtractedTrade],
        broker: &str,
    ) -> Result<usize, TradeportError>;
}
