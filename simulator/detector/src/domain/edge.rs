// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Textual request/assignment edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const REQUEST_ARROW: &str = "->";
const ASSIGNMENT_ARROW: &str = "<-";

/// Direction of an edge between an agent and a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// The agent is waiting for the resource.
    Request,
    /// The resource is held by the agent.
    Assignment,
}

/// One edge of the resource allocation graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub agent: String,
    pub resource: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn request(agent: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            resource: resource.into(),
            kind: EdgeKind::Request,
        }
    }

    pub fn assignment(agent: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            resource: resource.into(),
            kind: EdgeKind::Assignment,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.kind {
            EdgeKind::Request => REQUEST_ARROW,
            EdgeKind::Assignment => ASSIGNMENT_ARROW,
        };
        write!(f, "{} {} {}", self.agent, arrow, self.resource)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeParseError {
    #[error("expected `<agent> <arrow> <resource>`, found {0} token(s)")]
    TokenCount(usize),

    #[error("unknown arrow '{0}' (expected '->' or '<-')")]
    UnknownArrow(String),
}

impl FromStr for Edge {
    type Err = EdgeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let [agent, arrow, resource] = tokens.as_slice() else {
            return Err(EdgeParseError::TokenCount(tokens.len()));
        };

        let kind = match *arrow {
            REQUEST_ARROW => EdgeKind::Request,
            ASSIGNMENT_ARROW => EdgeKind::Assignment,
            other => return Err(EdgeParseError::UnknownArrow(other.to_string())),
        };

        Ok(Self {
            agent: agent.to_string(),
            resource: resource.to_string(),
            kind,
        })
    }
}
