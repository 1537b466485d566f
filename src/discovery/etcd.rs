//! etcd 前缀监听服务发现

use super::{Discover, ServiceList};
use crate::codec::{JsonCodec, NodeCodec};
use crate::error::Result;
use crate::types::ServiceNode;
use async_trait::async_trait;
use etcd_client::{Client, EventType, GetOptions, WatchOptions};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// etcd 服务发现
///
/// 先以服务名前缀做一次全量加载，随后由单个监听任务按事件到达顺序
/// 增量维护节点视图，直到被关闭或监听通道断开
pub struct EtcdDiscovery {
    list: Arc<ServiceList>,
    cancel: CancellationToken,
    watch_handle: Option<tokio::task::JoinHandle<()>>,
}

impl EtcdDiscovery {
    /// 使用默认 JSON 编解码器启动服务发现
    pub async fn start(client: Client, service_name: impl Into<String>) -> Result<Self> {
        Self::start_with_codec(client, service_name, Arc::new(JsonCodec)).await
    }

    /// 启动服务发现：全量加载 + 前缀监听
    pub async fn start_with_codec(
        client: Client,
        service_name: impl Into<String>,
        codec: Arc<dyn NodeCodec>,
    ) -> Result<Self> {
        let service_name = service_name.into();
        let list = Arc::new(ServiceList::new(service_name.clone()));
        let cancel = CancellationToken::new();

        let mut client = client;

        // 全量加载，单个键解码失败只跳过该键
        let resp = client
            .get(
                service_name.clone(),
                Some(GetOptions::new().with_prefix()),
            )
            .await?;
        for kv in resp.kvs() {
            let key = match kv.key_str() {
                Ok(key) => key.to_string(),
                Err(e) => {
                    warn!("skip registration with invalid key: {}", e);
                    continue;
                }
            };
            match codec.decode(kv.value()) {
                Ok(node) => list.set_service_list(key, node).await,
                Err(e) => warn!("skip undecodable registration {}: {}", key, e),
            }
        }

        let (mut watcher, mut stream) = client
            .watch(
                service_name.clone(),
                Some(WatchOptions::new().with_prefix()),
            )
            .await?;

        let watch_list = list.clone();
        let watch_cancel = cancel.clone();
        let watch_codec = codec.clone();
        let watch_name = service_name.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watch_cancel.cancelled() => {
                        if let Err(e) = watcher.cancel().await {
                            warn!("failed to cancel watcher for {}: {}", watch_name, e);
                        }
                        break;
                    }
                    msg = stream.message() => match msg {
                        Ok(Some(resp)) => {
                            for event in resp.events() {
                                let Some(kv) = event.kv() else { continue };
                                let key = match kv.key_str() {
                                    Ok(key) => key.to_string(),
                                    Err(e) => {
                                        warn!("skip watch event with invalid key: {}", e);
                                        continue;
                                    }
                                };
                                match event.event_type() {
                                    EventType::Put => match watch_codec.decode(kv.value()) {
                                        Ok(node) => watch_list.set_service_list(key, node).await,
                                        Err(e) => {
                                            warn!("skip undecodable registration {}: {}", key, e)
                                        }
                                    },
                                    EventType::Delete => watch_list.del_service_list(&key).await,
                                }
                            }
                        }
                        Ok(None) => {
                            info!("watch channel closed for {}", watch_name);
                            break;
                        }
                        Err(e) => {
                            error!("watch stream error for {}: {}", watch_name, e);
                            break;
                        }
                    }
                }
            }
        });

        info!(
            "service discovery started for {}, {} initial node(s)",
            service_name,
            list.len().await
        );

        Ok(Self {
            list,
            cancel,
            watch_handle: Some(handle),
        })
    }

    /// 节点视图，可与 Servicer 共享
    pub fn service_list(&self) -> Arc<ServiceList> {
        self.list.clone()
    }

    /// 手动写入或覆盖一个节点
    pub async fn set_service_list(&self, key: impl Into<String>, node: ServiceNode) {
        self.list.set_service_list(key, node).await
    }

    /// 手动移除一个节点
    pub async fn del_service_list(&self, key: &str) {
        self.list.del_service_list(key).await
    }

    /// 停止监听任务
    pub async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(handle) = self.watch_handle.take() {
            let _ = handle.await;
        }
        info!("service discovery closed for {}", self.list.service_name());
        Ok(())
    }
}

#[async_trait]
impl Discover for EtcdDiscovery {
    fn service_name(&self) -> &str {
        self.list.service_name()
    }

    async fn nodes(&self) -> Vec<ServiceNode> {
        self.list.nodes().await
    }

    async fn update_time(&self) -> Instant {
        self.list.update_time().await
    }
}

impl Drop for EtcdDiscovery {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
