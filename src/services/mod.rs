// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod groups;
pub mod scheduler;

pub use groups::{GroupService, SweepReport};
pub use scheduler::Scheduler;
