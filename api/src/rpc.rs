// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! JSON-RPC 2.0 envelope types and the error codes the API speaks.

use elements::MapError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const INVALID_PARAMS: i64 = -32602;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;

/// What a handler can get wrong with a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Map(#[from] MapError),
}

impl ApiError {
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            ApiError::MissingField(_) | ApiError::InvalidField { .. } | ApiError::Map(_) => {
                INVALID_PARAMS
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    #[must_use]
    pub fn result(id: Value, result: Value) -> Self {
        RpcResponse {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    #[must_use]
    pub fn error(id: Value, code: i64, message: String) -> Self {
        RpcResponse {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError { code, message }),
            id,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
