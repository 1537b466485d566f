use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub etcd: Option<EtcdConfig>,
    #[serde(default)]
    pub services: Vec<ServicerConfig>,
}

/// etcd 注册中心配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EtcdConfig {
    pub endpoints: Vec<String>,
    /// 租约时长（秒）
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl: i64,
}

fn default_lease_ttl() -> i64 {
    10
}

/// 单个服务的寻址配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicerConfig {
    pub service_name: String,
    #[serde(default = "default_resolve_type")]
    pub resolve_type: ResolveType,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub selector: SelectorAlgorithm,
    /// 定时强制校准选择器节点的周期（秒），0 表示不启用
    #[serde(default)]
    pub refresh_second: u64,
    pub ca_crt: Option<String>,
    pub client_pem: Option<String>,
    pub client_key: Option<String>,
}

fn default_resolve_type() -> ResolveType {
    ResolveType::Registry
}

/// 服务寻址方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolveType {
    /// 通过注册中心发现节点
    Registry,
    /// 固定 IP + 端口
    IpPort,
    /// 每次调用时解析域名
    Domain,
}

impl std::str::FromStr for ResolveType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "registry" => Ok(ResolveType::Registry),
            "ip_port" | "ipport" => Ok(ResolveType::IpPort),
            "domain" | "dns" => Ok(ResolveType::Domain),
            _ => Err(format!("Unknown resolve type: {}", s)),
        }
    }
}

/// 节点选择算法
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectorAlgorithm {
    /// 静态权重随机
    WeightedRandom,
    /// 动态加权轮询
    DynamicRoundRobin,
}

impl Default for SelectorAlgorithm {
    fn default() -> Self {
        SelectorAlgorithm::WeightedRandom
    }
}

impl std::str::FromStr for SelectorAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weighted_random" | "random" => Ok(SelectorAlgorithm::WeightedRandom),
            "dynamic_round_robin" | "round_robin" => Ok(SelectorAlgorithm::DynamicRoundRobin),
            _ => Err(format!("Unknown selector algorithm: {}", s)),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
