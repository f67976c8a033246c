pub mod dispatcher;
pub mod metadata_cache;
pub mod position_sizer;
pub mod retry;

pub use dispatcher::{DispatchConfig, Dispatcher, Execution, DRY_RUN_ORDER_ID};
pub use metadata_cache::SymbolMetaCache;
pub use position_sizer::SizingMode;
pub use retry::RetryPolicy;
