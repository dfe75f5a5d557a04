//! Actor-based check scheduling
//!
//! Every configured check gets its own runner actor, an independent async
//! task communicating via Tokio channels. One check's failure or slowness
//! never blocks another.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌────────────────────┐
//!                 │     Scheduler      │
//!                 └─────────┬──────────┘
//!                           │ spawns
//!             ┌─────────────┼─────────────┐
//!             │             │             │
//!     ┌───────▼──────┐      │     ┌───────▼──────┐
//!     │ CheckRunner  │      │     │ CheckRunner  │
//!     │  (check A)   │      │     │  (check N)   │
//!     └───────┬──────┘      │     └───────┬──────┘
//!             │   shared CheckExecutor    │
//!             └─────────────┼─────────────┘
//!                           │
//!          ┌────────────────┼────────────────┐
//!          │                │                │
//!   ┌──────▼─────┐   ┌──────▼──────┐  ┌──────▼───────┐
//!   │ Datasource │   │ Algorithmer │  │ HistoryStore │
//!   └────────────┘   │ / Actioner  │  └──────────────┘
//!                    └─────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each runner has an mpsc command channel (`RunNow`)
//! 2. **Events**: Runners publish a [`CheckRunEvent`] per run to a broadcast channel
//! 3. **Request/Response**: `RunNow` replies with the run's [`RunReport`] over oneshot
//! 4. **Cancellation**: in-flight runs are registered by check name so shutdown
//!    can abort them

pub mod cancellation;
pub mod check_runner;
pub mod executor;
pub mod messages;
pub mod scheduler;

pub use cancellation::CancellationRegistry;
pub use check_runner::CheckHandle;
pub use executor::CheckExecutor;
pub use messages::{CheckCommand, CheckRunEvent, RunReport};
pub use scheduler::Scheduler;
