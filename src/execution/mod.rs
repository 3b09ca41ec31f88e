// Order execution and supervision module
pub mod executor;
pub mod feasibility;
pub mod ladder;
pub mod order_book;
pub mod portfolio;
pub mod sizing;
pub mod supervisor;

pub use executor::TradeExecutor;
pub use feasibility::{FeasibilityValidator, Rejection};
pub use ladder::{ceil_price, floor_price, PriceLadder, PRICE_DECIMALS};
pub use order_book::{OrderBook, SlotState};
pub use portfolio::PortfolioStore;
pub use sizing::{FixedSizing, OrderSizer};
pub use supervisor::{AttemptOutcome, AttemptPipeline, OrderSupervisor, SupervisionOutcome};
