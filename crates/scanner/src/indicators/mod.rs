pub mod atr;
pub mod price_change;
pub mod smart_money;

pub use atr::AtrIndicator;
pub use price_change::price_change_pct;
pub use smart_money::{SmartMoneyDetector, SmartMoneySignal};
