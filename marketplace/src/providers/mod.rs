//! External collaborators.
//!
//! The engines depend on these traits only; the host application supplies
//! implementations (HTTP client, secure storage, catalog cache) and tests use
//! the [`mocks`](crate::mocks).
//!
//! ```text
//!  ┌──────────────┐ gateway calls  ┌────────────────┐
//!  │  Reducers    │───────────────▶│ RemoteGateway  │
//!  │ (engines)    │                └────────────────┘
//!  │              │ credentials    ┌────────────────┐
//!  │              │───────────────▶│ KeyValueStore  │
//!  └──────────────┘                └────────────────┘
//!  ┌──────────────┐ stock reads    ┌────────────────┐
//!  │ Client/cart  │───────────────▶│ CatalogCache   │
//!  └──────────────┘                └────────────────┘
//! ```
//!
//! Calls hand back `'static` boxed futures: the reducer starts a call while
//! it holds the state, and the runtime awaits it later.

mod catalog;
mod gateway;
mod storage;

pub use catalog::CatalogCache;
pub use gateway::RemoteGateway;
pub use storage::KeyValueStore;
