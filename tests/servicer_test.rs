//! Servicer 门面测试
//!
//! 用内存实现替代 etcd 发现器，验证寻址行为与校准协议

use async_trait::async_trait;
use beacon_core::discovery::{Discover, ServiceList};
use beacon_core::selector::{Selector, WeightedRandom};
use beacon_core::servicer::{Servicer, ServicerRegistry};
use beacon_core::types::ServiceNode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// 记录节点列表被读取次数的发现器，更新时间固定
struct CountingDiscover {
    update_time: Instant,
    reads: AtomicUsize,
}

impl CountingDiscover {
    fn new() -> Self {
        Self {
            update_time: Instant::now(),
            reads: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Discover for CountingDiscover {
    fn service_name(&self) -> &str {
        "user-rpc"
    }

    async fn nodes(&self) -> Vec<ServiceNode> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        vec![
            ServiceNode::new("10.0.0.1", 8001),
            ServiceNode::new("10.0.0.2", 8002),
        ]
    }

    async fn update_time(&self) -> Instant {
        self.update_time
    }
}

/// 测试：发现视图未变更时并发 pick 至多触发一次节点校准
#[tokio::test]
async fn test_rebalance_runs_once_for_unchanged_view() {
    let discover = Arc::new(CountingDiscover::new());
    let selector: Arc<dyn Selector> = Arc::new(WeightedRandom::new("user-rpc"));
    let servicer = Arc::new(Servicer::new_registry(
        "user-rpc",
        discover.clone(),
        selector,
        0,
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let servicer = servicer.clone();
        handles.push(tokio::spawn(async move { servicer.pick().await }));
    }
    for handle in handles {
        // CAS 抢占失败的调用可能在节点集填充前落空，这是协议允许的
        let _ = handle.await.expect("task should not panic");
    }

    assert_eq!(discover.reads(), 1, "only one diff pass may run");

    // 视图仍未变更，后续 pick 直接走时间戳短路
    for _ in 0..4 {
        servicer.pick().await.expect("pick after rebalance");
    }
    assert_eq!(discover.reads(), 1);
}

/// 测试：发现视图增删节点后 pick 前的校准会同步选择器
#[tokio::test]
async fn test_rebalance_follows_discovery_changes() {
    let list = Arc::new(ServiceList::new("user-rpc"));
    list.set_service_list("user-rpc.10.0.0.1.8001", ServiceNode::new("10.0.0.1", 8001))
        .await;
    list.set_service_list("user-rpc.10.0.0.2.8002", ServiceNode::new("10.0.0.2", 8002))
        .await;

    let selector = Arc::new(WeightedRandom::new("user-rpc"));
    let servicer = Servicer::new_registry("user-rpc", list.clone(), selector.clone(), 0);

    servicer.pick().await.expect("pick with two nodes");
    assert_eq!(selector.nodes().await.expect("nodes").len(), 2);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    list.del_service_list("user-rpc.10.0.0.2.8002").await;
    list.set_service_list("user-rpc.10.0.0.3.8003", ServiceNode::new("10.0.0.3", 8003))
        .await;

    let picked = servicer.pick().await.expect("pick after view change");
    let nodes = selector.nodes().await.expect("nodes");
    let addresses: Vec<String> = nodes.iter().map(|n| n.address()).collect();

    assert_eq!(nodes.len(), 2);
    assert!(addresses.contains(&"10.0.0.1:8001".to_string()));
    assert!(addresses.contains(&"10.0.0.3:8003".to_string()));
    assert_ne!(picked.address(), "10.0.0.2:8002");
}

/// 测试：调用结果经 done 回流到选择器统计
#[tokio::test]
async fn test_done_forwards_outcome_to_selector() {
    let list = Arc::new(ServiceList::new("user-rpc"));
    list.set_service_list("user-rpc.10.0.0.1.8001", ServiceNode::new("10.0.0.1", 8001))
        .await;

    let selector = Arc::new(WeightedRandom::new("user-rpc"));
    let servicer = Servicer::new_registry("user-rpc", list, selector.clone(), 0);

    let node = servicer.pick().await.expect("pick");
    servicer.done(&node, None).await.expect("done success");
    servicer
        .done(&node, Some("connection refused".to_string()))
        .await
        .expect("done failure");

    let nodes = selector.nodes().await.expect("nodes");
    assert_eq!(nodes[0].statistics().success, 1);
    assert_eq!(nodes[0].statistics().fail, 1);
}

/// 测试：固定地址寻址直接返回配置的节点
#[tokio::test]
async fn test_ip_port_pick_returns_configured_address() {
    let servicer = Servicer::new_ip_port("pay-rpc", "10.1.2.3", 9090);
    let node = servicer.pick().await.expect("pick");

    assert_eq!(node.host(), "10.1.2.3");
    assert_eq!(node.port(), 9090);
    assert_eq!(servicer.name(), "pay-rpc");
}

/// 测试：非注册中心寻址的 done 显式报错
#[tokio::test]
async fn test_done_without_selector_fails_fast() {
    let servicer = Servicer::new_ip_port("pay-rpc", "10.1.2.3", 9090);
    let node = servicer.pick().await.expect("pick");

    let err = servicer.done(&node, None).await.expect_err("done must fail");
    assert!(err.to_string().contains("selector is not initialized"));
}

/// 测试：域名寻址每次调用都解析并带回配置端口
#[tokio::test]
async fn test_domain_pick_resolves_per_call() {
    let servicer = Servicer::new_domain("gateway", "localhost", 8443);
    let node = servicer.pick().await.expect("resolve localhost");

    assert_eq!(node.port(), 8443);
    assert!(!node.host().is_empty());
}

/// 测试：注册表按名称存取与删除
#[tokio::test]
async fn test_servicer_registry_roundtrip() {
    let registry = ServicerRegistry::new();
    assert!(registry.is_empty().await);

    registry
        .set_servicer(Arc::new(Servicer::new_ip_port("pay-rpc", "10.1.2.3", 9090)))
        .await;
    registry
        .set_servicer(Arc::new(Servicer::new_domain("gateway", "example.com", 443)))
        .await;
    assert_eq!(registry.len().await, 2);

    let servicer = registry.get_servicer("pay-rpc").await.expect("lookup");
    assert_eq!(servicer.name(), "pay-rpc");

    registry.del_servicer("pay-rpc").await;
    assert!(registry.get_servicer("pay-rpc").await.is_none());
    assert_eq!(registry.len().await, 1);
}

/// 测试：TLS 材料原样透出
#[tokio::test]
async fn test_tls_material_passthrough() {
    let servicer = Servicer::new_ip_port("pay-rpc", "10.1.2.3", 9090).with_tls(
        Some("certs/ca.crt".to_string()),
        Some("certs/client.pem".to_string()),
        Some("certs/client.key".to_string()),
    );

    assert_eq!(servicer.ca_crt(), Some("certs/ca.crt"));
    assert_eq!(servicer.client_pem(), Some("certs/client.pem"));
    assert_eq!(servicer.client_key(), Some("certs/client.key"));
}
