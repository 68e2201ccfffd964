// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod edge_trace;
pub mod event_bus;
pub mod report;

pub use edge_trace::EdgeTrace;
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use report::{CollectingSink, TextReport, TextReportWriter};
