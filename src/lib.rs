pub mod config;
pub mod context;
pub mod error;
pub mod state;
pub mod storage;
pub mod testing;

pub mod prelude {
    pub use crate::context::{Activity, TurnContext};
    pub use crate::error::Result;
    pub use crate::state::{SHORT_MEMORY_PROPERTY_NAME, ShortMemoryState, StatePropertyAccessor};
    pub use crate::storage::rest::RestStateStorage;
    pub use crate::storage::router::TurnScopedStorage;
    pub use crate::storage::{FileStorage, InMemoryStorage, Storage};
}
