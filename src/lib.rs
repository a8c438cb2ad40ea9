//! Bridge between a Mitsubishi heat pump's CN105 port and a topic-based
//! control plane.
//!
//! [`controller::HeatPumpController`] owns the link: it polls the unit,
//! publishes attributes whose value changed and forwards setting changes.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod protocol;
pub mod publish;
pub mod queue;
pub mod scheduler;
pub mod state;
