//! # Domain Models
//!
//! Canonical types shared by the normalizer, the store and the analytics
//! queries.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated exchange-qualified ticker |
//! | [`TradeDate`] | Session date, `YYYY-MM-DD` on the wire |
//! | [`Period`] | Provider lookback window (`1y`, `6mo`, ...) |
//! | [`DailyBar`] | One symbol's OHLCV record for one day plus derived metrics |

mod daily_bar;
mod period;
mod symbol;
mod trade_date;

pub use daily_bar::{daily_return, DailyBar};
pub use period::Period;
pub use symbol::Symbol;
pub use trade_date::TradeDate;
