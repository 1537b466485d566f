//! etcd 服务注册实现

use super::Registrar;
use crate::codec::{JsonCodec, NodeCodec};
use crate::error::Result;
use crate::types::ServiceNode;
use async_trait::async_trait;
use etcd_client::{Client, PutOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// etcd 服务注册器
///
/// 注册键为 `{service}.{host}.{port}`，值为编码后的 [`ServiceNode`]，
/// 绑定一个 `lease_ttl` 秒的租约并由后台任务持续续期
pub struct EtcdRegistrar {
    client: Client,
    key: String,
    node: ServiceNode,
    codec: Arc<dyn NodeCodec>,
    lease_ttl: i64,
    lease_id: Option<i64>,
    keep_alive_handle: Option<tokio::task::JoinHandle<()>>,
    healthy: Arc<AtomicBool>,
}

impl EtcdRegistrar {
    /// 创建注册器，使用已连接的 etcd 客户端
    pub fn new(client: Client, service_name: &str, node: ServiceNode, lease_ttl: i64) -> Self {
        let key = format!("{}.{}.{}", service_name, node.host, node.port);
        Self {
            client,
            key,
            node,
            codec: Arc::new(JsonCodec),
            lease_ttl,
            lease_id: None,
            keep_alive_handle: None,
            healthy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 连接 etcd 并创建注册器
    pub async fn connect(
        endpoints: Vec<String>,
        service_name: &str,
        node: ServiceNode,
        lease_ttl: i64,
    ) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;
        Ok(Self::new(client, service_name, node, lease_ttl))
    }

    /// 替换注册值编解码器
    pub fn with_codec(mut self, codec: Arc<dyn NodeCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// 注册键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 当前租约 ID
    pub fn lease_id(&self) -> Option<i64> {
        self.lease_id
    }
}

#[async_trait]
impl Registrar for EtcdRegistrar {
    async fn register(&mut self) -> Result<()> {
        let lease = self.client.lease_grant(self.lease_ttl, None).await?;
        let lease_id = lease.id();

        let value = self.codec.encode(&self.node)?;
        let opts = PutOptions::new().with_lease(lease_id);
        self.client
            .put(self.key.clone(), value, Some(opts))
            .await?;

        let (mut keeper, mut stream) = self.client.lease_keep_alive(lease_id).await?;

        self.lease_id = Some(lease_id);
        self.healthy.store(true, Ordering::Release);

        let healthy = self.healthy.clone();
        let interval = Duration::from_secs((self.lease_ttl / 3).max(1) as u64);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                if let Err(e) = keeper.keep_alive().await {
                    error!("lease keep-alive request failed: {}", e);
                    healthy.store(false, Ordering::Release);
                    break;
                }

                match stream.next().await {
                    Some(Ok(resp)) => {
                        healthy.store(true, Ordering::Release);
                        debug!("lease {} renewed, ttl {}s", resp.id(), resp.ttl());
                    }
                    Some(Err(e)) => {
                        error!("lease keep-alive stream error: {}", e);
                        healthy.store(false, Ordering::Release);
                        break;
                    }
                    None => {
                        warn!("lease keep-alive channel closed");
                        healthy.store(false, Ordering::Release);
                        break;
                    }
                }
            }
        });
        self.keep_alive_handle = Some(handle);

        info!(
            "service registered: {} at {}:{}",
            self.key, self.node.host, self.node.port
        );

        Ok(())
    }

    async fn deregister(&mut self) -> Result<()> {
        if let Some(handle) = self.keep_alive_handle.take() {
            handle.abort();
        }

        if let Some(lease_id) = self.lease_id.take() {
            self.client.lease_revoke(lease_id).await?;
        }

        self.healthy.store(false, Ordering::Release);
        info!("service deregistered: {}", self.key);

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}

impl Drop for EtcdRegistrar {
    fn drop(&mut self) {
        if let Some(handle) = self.keep_alive_handle.take() {
            handle.abort();
        }
    }
}
