//! Error types for the signaling relay

use thiserror::Error;

/// Errors that can occur while relaying or serving
#[derive(Error, Debug)]
pub enum SignalingError {
    /// The recipient's outbound queue is full
    #[error("Outbound queue full")]
    QueueFull,

    /// The recipient's connection is closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Listener or socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons an inbound client payload is discarded
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Payload is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level JSON value is not an object
    #[error("Envelope is not a JSON object")]
    NotAnObject,

    /// A join message lacks a required non-empty string field
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}
