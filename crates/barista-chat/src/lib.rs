//! Barista Chat crate - agent orchestration and session state.
//!
//! A turn flows through the [`executor::TurnExecutor`]: the session is
//! resolved from the [`session::SessionStore`], the
//! [`router::CapabilityRouter`] asks the [`reasoner::Reasoner`] which tools
//! to call, the [`tools::ToolRegistry`] runs them, and the reasoner writes
//! the final reply from the collected trace.

pub mod error;
pub mod executor;
pub mod reasoner;
pub mod router;
pub mod session;
pub mod tools;
pub mod types;

pub use error::{ChatError, ToolErrorKind};
pub use executor::{ExecuteOptions, TurnExecutor};
pub use reasoner::{build_reasoner, Decision, Reasoner, ReasoningRequest};
pub use router::{CapabilityRouter, PlannedCall, RouteDecision};
pub use session::{spawn_sweeper, InMemorySessionStore, LockedSession, SessionHandle, SessionStore};
pub use tools::{ParamKind, ParamSpec, ToolDescriptor, ToolKind, ToolRegistry};
pub use types::{
    ChatEnvelope, ChatStatus, InvocationResult, Role, Session, ToolCall, ToolInvocation,
    ToolOutput, Turn,
};
