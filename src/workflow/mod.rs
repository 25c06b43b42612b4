pub mod cancel;
pub mod item_ctx;
pub mod item_worker;

pub use cancel::CancelFlag;
pub use item_ctx::ItemCtx;
pub use item_worker::{BackoffPolicy, ItemWorker};
