pub mod binance;
pub mod coinbase;
pub mod http;
pub mod lunarcrush;

pub use binance::BinanceSpot;
pub use coinbase::CoinbaseSpot;
pub use lunarcrush::LunarCrushFeed;
