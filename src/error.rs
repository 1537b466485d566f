//! Beacon Core 统一错误类型
//!
//! 本层不做任何内部重试，失败直接返回给调用方，由 RPC 客户端决定重试与退避策略

use thiserror::Error;

/// Beacon Core 统一错误类型
#[derive(Error, Debug)]
pub enum BeaconError {
    /// etcd 操作失败
    #[error("etcd operation failed: {0}")]
    Etcd(#[from] etcd_client::Error),

    /// 编解码失败
    #[error("codec error: {0}")]
    Codec(String),

    /// 配置错误
    #[error("config error: {0}")]
    Config(String),

    /// 配置文件解析失败
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 域名解析失败
    #[error("failed to resolve domain {host}: {reason}")]
    DnsResolve { host: String, reason: String },

    /// 服务当前没有可用节点
    #[error("no available node for service {0}")]
    NoAvailableNode(String),

    /// 非注册中心类型的服务没有选择器
    #[error("selector is not initialized for service {0}")]
    SelectorNotInitialized(String),

    /// 服务没有绑定发现器
    #[error("discovery is not initialized for service {0}")]
    DiscoveryNotInitialized(String),
}

impl BeaconError {
    /// 创建编解码错误
    pub fn codec(msg: impl Into<String>) -> Self {
        BeaconError::Codec(msg.into())
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        BeaconError::Config(msg.into())
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, BeaconError>;
