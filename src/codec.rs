//! 节点编解码
//!
//! 注册值的编解码可插拔，默认使用 JSON；替换编解码器不需要改动注册与发现逻辑

use crate::error::{BeaconError, Result};
use crate::types::ServiceNode;

/// 节点编解码器
pub trait NodeCodec: Send + Sync {
    /// 将节点编码为注册值
    fn encode(&self, node: &ServiceNode) -> Result<String>;

    /// 从注册值解码节点
    fn decode(&self, raw: &[u8]) -> Result<ServiceNode>;
}

/// 默认 JSON 编解码器
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec;

impl NodeCodec for JsonCodec {
    fn encode(&self, node: &ServiceNode) -> Result<String> {
        serde_json::to_string(node)
            .map_err(|e| BeaconError::codec(format!("failed to encode service node: {}", e)))
    }

    fn decode(&self, raw: &[u8]) -> Result<ServiceNode> {
        serde_json::from_slice(raw)
            .map_err(|e| BeaconError::codec(format!("failed to decode service node: {}", e)))
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self
    }
}
