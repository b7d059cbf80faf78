// Copyright (c) 2023 MASSA LABS <info@massa.net>

use serde::Deserialize;
use std::net::SocketAddr;

/// gRPC front-end configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct GrpcConfig {
    /// Bind address of the query API.
    pub bind: SocketAddr,
    /// Upper bound on concurrently resolved contracts during
    /// multi-contract fan-out.
    pub max_parallel_fanout: usize,
    /// Limits the maximum size of a decoded message.
    pub max_decoding_message_size: usize,
    /// Limits the maximum size of an encoded message.
    pub max_encoding_message_size: usize,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        GrpcConfig {
            bind: "0.0.0.0:13042".parse().expect("hardcoded bind address"),
            max_parallel_fanout: 64,
            max_decoding_message_size: 4 * 1024 * 1024,
            max_encoding_message_size: 4 * 1024 * 1024,
        }
    }
}
