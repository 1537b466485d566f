//! Beacon Service Governance Core Library
//!
//! 基于 etcd 的服务注册、服务发现与客户端负载均衡：
//! 实例以可续期租约自注册，监听任务维护最终一致的节点视图，
//! 可插拔的选择算法为每次出站调用挑选节点并吸收调用结果反馈

pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod selector;
pub mod servicer;
pub mod types;

// Re-exports
pub use codec::{JsonCodec, NodeCodec};
pub use config::{Config, EtcdConfig, ResolveType, SelectorAlgorithm, ServicerConfig};
pub use discovery::{Discover, EtcdDiscovery, ServiceList};
pub use error::{BeaconError, Result};
pub use registry::{EtcdRegistrar, Registrar};
pub use selector::{
    new_selector, DynamicRoundRobin, HandleInfo, Node, Selector, Statistics, WeightedRandom,
    DEFAULT_NODE_WEIGHT,
};
pub use servicer::{Servicer, ServicerRegistry};
pub use types::ServiceNode;
