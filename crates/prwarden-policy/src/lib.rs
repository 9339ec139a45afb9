//! Heuristics that decide which comments a pull request deserves.
//!
//! Everything here is pure: the crate never talks to a hosting service and
//! never reads the clock. Data flows one way through the modules:
//! [`filter`] → [`gate`] → [`ticket`] / [`evaluate`] → [`planner`], and
//! [`engine::PolicyEngine`] drives the whole chain for one pull request.

pub mod engine;
pub mod evaluate;
pub mod filter;
pub mod gate;
pub mod planner;
pub mod ticket;
