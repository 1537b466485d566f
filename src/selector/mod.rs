//! 节点选择模块
//!
//! 提供统一的选择器抽象与两种算法：静态权重随机与动态加权轮询。
//! 节点集合由 Servicer 按服务发现视图增删，调用结果通过 `after_handle` 回流

pub mod dynamic_round_robin;
pub mod weighted_random;

pub use dynamic_round_robin::DynamicRoundRobin;
pub use weighted_random::WeightedRandom;

use crate::config::SelectorAlgorithm;
use crate::error::Result;
use crate::types::ServiceNode;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// 发现载荷未携带权重时节点的默认权重
pub const DEFAULT_NODE_WEIGHT: u32 = 10;

/// 节点累计调用结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub success: u64,
    pub fail: u64,
}

/// 选择器视角下的服务节点
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) weight: u32,
    pub(crate) meta: HashMap<String, String>,
    pub(crate) statistics: Statistics,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: DEFAULT_NODE_WEIGHT,
            meta: HashMap::new(),
            statistics: Statistics::default(),
        }
    }

    /// 设置静态权重
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// 附加元数据
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// 节点唯一标识，格式 `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}

impl From<ServiceNode> for Node {
    fn from(node: ServiceNode) -> Self {
        Node::new(node.host, node.port)
    }
}

/// 一次调用的结果反馈
#[derive(Debug, Clone)]
pub struct HandleInfo {
    pub address: String,
    pub err: Option<String>,
}

impl HandleInfo {
    pub fn success(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            err: None,
        }
    }

    pub fn failure(address: impl Into<String>, err: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            err: Some(err.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

/// 节点选择器
#[async_trait]
pub trait Selector: Send + Sync {
    /// 选择器服务的服务名
    fn service_name(&self) -> &str;

    /// 加入节点，地址相同则覆盖
    async fn add_node(&self, node: Node) -> Result<()>;

    /// 按地址移除节点
    async fn delete_node(&self, node: &Node) -> Result<()>;

    /// 当前节点快照
    async fn nodes(&self) -> Result<Vec<Node>>;

    /// 为一次调用选出一个节点
    async fn select(&self) -> Result<Node>;

    /// 回流一次调用的结果
    async fn after_handle(&self, info: HandleInfo) -> Result<()>;
}

/// 按配置的算法创建选择器
pub fn new_selector(
    algorithm: SelectorAlgorithm,
    service_name: impl Into<String>,
) -> Arc<dyn Selector> {
    match algorithm {
        SelectorAlgorithm::WeightedRandom => Arc::new(WeightedRandom::new(service_name)),
        SelectorAlgorithm::DynamicRoundRobin => Arc::new(DynamicRoundRobin::new(service_name)),
    }
}
