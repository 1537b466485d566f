//! 服务发现模块
//!
//! 监听 etcd 键前缀，维护一份最终一致的本地节点视图；
//! 读取方只拿快照，内部状态不对外暴露引用

pub mod etcd;

pub use etcd::EtcdDiscovery;

use crate::types::ServiceNode;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

/// 服务发现视图
///
/// Servicer 只依赖该接口，便于在测试中替换实现
#[async_trait]
pub trait Discover: Send + Sync {
    /// 被发现的服务名
    fn service_name(&self) -> &str;

    /// 当前节点快照
    async fn nodes(&self) -> Vec<ServiceNode>;

    /// 节点视图最后一次变更的时间
    async fn update_time(&self) -> Instant;
}

/// 本地节点列表
///
/// 键为 etcd 注册键，值为解码后的节点；
/// 写入方为监听任务与一次性初始加载，读取方只获得快照
pub struct ServiceList {
    service_name: String,
    nodes: RwLock<HashMap<String, ServiceNode>>,
    updated: RwLock<Instant>,
}

impl ServiceList {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            nodes: RwLock::new(HashMap::new()),
            updated: RwLock::new(Instant::now()),
        }
    }

    /// 写入或覆盖一个节点
    pub async fn set_service_list(&self, key: impl Into<String>, node: ServiceNode) {
        let mut nodes = self.nodes.write().await;
        nodes.insert(key.into(), node);
        drop(nodes);
        *self.updated.write().await = Instant::now();
    }

    /// 移除一个节点
    pub async fn del_service_list(&self, key: &str) {
        let mut nodes = self.nodes.write().await;
        nodes.remove(key);
        drop(nodes);
        *self.updated.write().await = Instant::now();
    }

    /// 当前节点数量
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[async_trait]
impl Discover for ServiceList {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn nodes(&self) -> Vec<ServiceNode> {
        let nodes = self.nodes.read().await;
        nodes.values().cloned().collect()
    }

    async fn update_time(&self) -> Instant {
        *self.updated.read().await
    }
}
