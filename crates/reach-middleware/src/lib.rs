//! `reach-middleware` – transport between the arm core and the outside world
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.  Carries diagnostics, debug markers and handover
//!   detector traffic.
//! - [`action`] – the [`ActionClient`] seam every remote actuator endpoint
//!   implements, plus the [`GoalHandle`] used to track one submitted goal.

pub mod action;
pub mod bus;

pub use action::{ActionClient, Connection, EndpointProbe, GoalHandle};
pub use bus::{ChannelSubscriber, EventBus, Topic, TopicReceiver};
