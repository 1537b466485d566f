//! Servicer 注册表
//!
//! 进程内的服务名到 Servicer 映射，由启动期配置装载填充，
//! RPC 客户端按调用目标查询；以对象形式注入使用方，便于测试隔离

use super::Servicer;
use crate::config::{Config, ResolveType};
use crate::error::{BeaconError, Result};
use etcd_client::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 服务名到 Servicer 的映射表
#[derive(Default)]
pub struct ServicerRegistry {
    servicers: RwLock<HashMap<String, Arc<Servicer>>>,
}

impl ServicerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置构建全部 Servicer 并装入注册表
    ///
    /// 存在注册中心寻址的服务时建立一个共享的 etcd 客户端连接
    pub async fn from_config(config: &Config) -> Result<Self> {
        let needs_etcd = config
            .services
            .iter()
            .any(|s| s.resolve_type == ResolveType::Registry);
        let client = if needs_etcd {
            let etcd = config.etcd.as_ref().ok_or_else(|| {
                BeaconError::config("registry-type services require [etcd] configuration")
            })?;
            Some(Client::connect(etcd.endpoints.clone(), None).await?)
        } else {
            None
        };

        let registry = Self::new();
        for cfg in &config.services {
            let servicer = Arc::new(Servicer::from_config(cfg, client.clone()).await?);
            servicer.clone().start_refresh();
            registry.set_servicer(servicer).await;
        }
        Ok(registry)
    }

    pub async fn set_servicer(&self, servicer: Arc<Servicer>) {
        let mut servicers = self.servicers.write().await;
        servicers.insert(servicer.name().to_string(), servicer);
    }

    pub async fn get_servicer(&self, name: &str) -> Option<Arc<Servicer>> {
        let servicers = self.servicers.read().await;
        servicers.get(name).cloned()
    }

    pub async fn del_servicer(&self, name: &str) {
        let mut servicers = self.servicers.write().await;
        servicers.remove(name);
    }

    pub async fn len(&self) -> usize {
        self.servicers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.servicers.read().await.is_empty()
    }
}
