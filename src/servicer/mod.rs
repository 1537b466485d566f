//! 服务寻址门面
//!
//! 每个逻辑服务对应一个 Servicer，按配置绑定固定地址、域名解析或
//! （发现器 + 选择器）三种寻址方式之一；RPC 客户端只依赖
//! `pick` 选节点、`done` 回流结果这两个入口

pub mod registry;

pub use registry::ServicerRegistry;

use crate::config::{ResolveType, ServicerConfig};
use crate::discovery::{Discover, EtcdDiscovery};
use crate::error::{BeaconError, Result};
use crate::selector::{new_selector, HandleInfo, Node, Selector};
use crate::types::ServiceNode;
use etcd_client::Client;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// 注册中心寻址的运行状态
struct RegistryBinding {
    discovery: Arc<dyn Discover>,
    selector: Arc<dyn Selector>,
    /// 同一时刻最多一次在途校准，CAS 抢占失败方直接使用当前节点集
    adjusting: AtomicBool,
    rebalance: Mutex<()>,
    last_update: RwLock<Option<Instant>>,
    refresh_second: u64,
}

impl RegistryBinding {
    /// 将选择器节点集校准到发现视图
    ///
    /// 发现视图自上次校准后无变更时直接返回；CAS 抢占失败的调用方
    /// 不阻塞不重试，带着可能略旧但内部一致的节点集继续
    async fn adjust_selector_node(&self, force: bool) -> Result<()> {
        let updated = self.discovery.update_time().await;
        if !force {
            if let Some(last) = *self.last_update.read().await {
                if updated <= last {
                    return Ok(());
                }
            }
        }

        if self
            .adjusting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let result = self.sync_nodes(updated, force).await;
        self.adjusting.store(false, Ordering::Release);
        result
    }

    async fn sync_nodes(&self, updated: Instant, force: bool) -> Result<()> {
        let _guard = self.rebalance.lock().await;

        // 拿到执行权后复核时间戳：抢占期间别人可能已完成同一视图的校准
        if !force {
            if let Some(last) = *self.last_update.read().await {
                if updated <= last {
                    return Ok(());
                }
            }
        }

        let discovered: HashMap<String, ServiceNode> = self
            .discovery
            .nodes()
            .await
            .into_iter()
            .map(|n| (n.address(), n))
            .collect();
        let current = self.selector.nodes().await?;

        for node in &current {
            if !discovered.contains_key(&node.address()) {
                self.selector.delete_node(node).await?;
            }
        }

        let known: HashSet<String> = current.iter().map(|n| n.address()).collect();
        for (address, service_node) in discovered {
            if !known.contains(&address) {
                self.selector.add_node(Node::from(service_node)).await?;
            }
        }

        *self.last_update.write().await = Some(updated);
        Ok(())
    }
}

enum Resolution {
    IpPort { host: String, port: u16 },
    Domain { host: String, port: u16 },
    Registry(RegistryBinding),
}

/// 单个逻辑服务的寻址门面
pub struct Servicer {
    name: String,
    resolution: Resolution,
    ca_crt: Option<String>,
    client_pem: Option<String>,
    client_key: Option<String>,
}

impl Servicer {
    /// 固定地址寻址
    pub fn new_ip_port(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            resolution: Resolution::IpPort {
                host: host.into(),
                port,
            },
            ca_crt: None,
            client_pem: None,
            client_key: None,
        }
    }

    /// 域名寻址，每次调用都重新解析
    pub fn new_domain(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            resolution: Resolution::Domain {
                host: host.into(),
                port,
            },
            ca_crt: None,
            client_pem: None,
            client_key: None,
        }
    }

    /// 注册中心寻址
    pub fn new_registry(
        name: impl Into<String>,
        discovery: Arc<dyn Discover>,
        selector: Arc<dyn Selector>,
        refresh_second: u64,
    ) -> Self {
        Self {
            name: name.into(),
            resolution: Resolution::Registry(RegistryBinding {
                discovery,
                selector,
                adjusting: AtomicBool::new(false),
                rebalance: Mutex::new(()),
                last_update: RwLock::new(None),
                refresh_second,
            }),
            ca_crt: None,
            client_pem: None,
            client_key: None,
        }
    }

    /// 按服务配置构建
    ///
    /// 注册中心寻址需要调用方传入已连接的 etcd 客户端
    pub async fn from_config(cfg: &ServicerConfig, client: Option<Client>) -> Result<Self> {
        let servicer = match cfg.resolve_type {
            ResolveType::IpPort => {
                Self::new_ip_port(cfg.service_name.clone(), cfg.host.clone(), cfg.port)
            }
            ResolveType::Domain => {
                Self::new_domain(cfg.service_name.clone(), cfg.host.clone(), cfg.port)
            }
            ResolveType::Registry => {
                let client = client.ok_or_else(|| {
                    BeaconError::config(format!(
                        "registry servicer {} requires an etcd client",
                        cfg.service_name
                    ))
                })?;
                let discovery = EtcdDiscovery::start(client, cfg.service_name.clone()).await?;
                let selector = new_selector(cfg.selector, cfg.service_name.clone());
                Self::new_registry(
                    cfg.service_name.clone(),
                    Arc::new(discovery),
                    selector,
                    cfg.refresh_second,
                )
            }
        };

        Ok(servicer.with_tls(
            cfg.ca_crt.clone(),
            cfg.client_pem.clone(),
            cfg.client_key.clone(),
        ))
    }

    /// 附加 TLS 证书材料，本层不解释其内容
    pub fn with_tls(
        mut self,
        ca_crt: Option<String>,
        client_pem: Option<String>,
        client_key: Option<String>,
    ) -> Self {
        self.ca_crt = ca_crt;
        self.client_pem = client_pem;
        self.client_key = client_key;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ca_crt(&self) -> Option<&str> {
        self.ca_crt.as_deref()
    }

    pub fn client_pem(&self) -> Option<&str> {
        self.client_pem.as_deref()
    }

    pub fn client_key(&self) -> Option<&str> {
        self.client_key.as_deref()
    }

    /// 为一次出站调用选出节点
    pub async fn pick(&self) -> Result<Node> {
        match &self.resolution {
            Resolution::IpPort { host, port } => Ok(Node::new(host.clone(), *port)),
            Resolution::Domain { host, port } => {
                let mut addrs = tokio::net::lookup_host((host.as_str(), *port))
                    .await
                    .map_err(|e| BeaconError::DnsResolve {
                        host: host.clone(),
                        reason: e.to_string(),
                    })?;
                let addr = addrs.next().ok_or_else(|| BeaconError::DnsResolve {
                    host: host.clone(),
                    reason: "no address records".to_string(),
                })?;
                Ok(Node::new(addr.ip().to_string(), *port))
            }
            Resolution::Registry(binding) => {
                binding.adjust_selector_node(false).await?;
                binding.selector.select().await
            }
        }
    }

    /// 回流一次调用的结果
    pub async fn done(&self, node: &Node, err: Option<String>) -> Result<()> {
        match &self.resolution {
            Resolution::Registry(binding) => {
                let info = match err {
                    None => HandleInfo::success(node.address()),
                    Some(err) => HandleInfo::failure(node.address(), err),
                };
                binding.selector.after_handle(info).await
            }
            _ => Err(BeaconError::SelectorNotInitialized(self.name.clone())),
        }
    }

    /// 启动周期性强制校准任务
    ///
    /// 配置的周期为 0 或寻址方式不经注册中心时不启动；
    /// 周期任务无条件校准，为持续 CAS 竞争下的节点集陈旧度兜底
    pub fn start_refresh(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let Resolution::Registry(binding) = &self.resolution else {
            return None;
        };
        if binding.refresh_second == 0 {
            return None;
        }

        let period = Duration::from_secs(binding.refresh_second);
        info!(
            "periodic rebalance started for {} every {}s",
            self.name, binding.refresh_second
        );
        let servicer = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // interval 首次立即触发，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Resolution::Registry(binding) = &servicer.resolution else {
                    break;
                };
                if let Err(e) = binding.adjust_selector_node(true).await {
                    warn!("periodic rebalance failed for {}: {}", servicer.name, e);
                }
            }
        }))
    }
}
