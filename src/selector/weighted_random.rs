//! 静态权重随机选择

use super::{HandleInfo, Node, Selector};
use crate::error::{BeaconError, Result};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 一个节点占据的连续整数区间
///
/// 区间由权重降序累加分配，两端均为闭区间：
/// 首个节点为 `[0, w]`，其后依次为 `[t+1, t+w]`（t 为前一区间右端）
#[derive(Debug, Clone)]
struct NodeOffset {
    address: String,
    weight: u64,
    start: u64,
    end: u64,
}

struct WeightedState {
    nodes: HashMap<String, Node>,
    offsets: Vec<NodeOffset>,
    total_weight: u64,
    same_weight: bool,
}

impl WeightedState {
    /// 按权重降序重排并重新分配区间
    ///
    /// 抽样空间为 `[0, total_weight]` 共 total+1 个取值，而首个区间
    /// 比其权重多覆盖一个取值，排位最前的节点因此多得一次命中；
    /// 该偏差为既定行为，修正前需显式评估
    fn rebuild(&mut self) {
        self.offsets
            .sort_by(|a, b| b.weight.cmp(&a.weight));

        let mut total: u64 = 0;
        for (i, offset) in self.offsets.iter_mut().enumerate() {
            if i == 0 {
                offset.start = 0;
                offset.end = offset.weight;
            } else {
                offset.start = total + 1;
                offset.end = total + offset.weight;
            }
            total = offset.end;
        }
        self.total_weight = self.nodes.values().map(|n| n.weight as u64).sum();

        let mut weights = self.nodes.values().map(|n| n.weight);
        self.same_weight = match weights.next() {
            Some(first) => weights.all(|w| w == first),
            None => true,
        };
    }
}

/// 静态权重随机选择器
///
/// 权重在节点生命周期内不变，`after_handle` 只累计成败计数
pub struct WeightedRandom {
    service_name: String,
    state: RwLock<WeightedState>,
}

impl WeightedRandom {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            state: RwLock::new(WeightedState {
                nodes: HashMap::new(),
                offsets: Vec::new(),
                total_weight: 0,
                same_weight: true,
            }),
        }
    }

    /// 当前节点静态权重之和
    pub async fn total_weight(&self) -> u64 {
        self.state.read().await.total_weight
    }
}

#[async_trait]
impl Selector for WeightedRandom {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn add_node(&self, node: Node) -> Result<()> {
        let address = node.address();
        let weight = node.weight as u64;
        let mut state = self.state.write().await;

        if state.nodes.insert(address.clone(), node).is_some() {
            state.offsets.retain(|o| o.address != address);
        }
        state.offsets.push(NodeOffset {
            address,
            weight,
            start: 0,
            end: 0,
        });
        state.rebuild();

        Ok(())
    }

    async fn delete_node(&self, node: &Node) -> Result<()> {
        let address = node.address();
        let mut state = self.state.write().await;

        state.nodes.remove(&address);
        state.offsets.retain(|o| o.address != address);
        state.rebuild();

        Ok(())
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        Ok(state.nodes.values().cloned().collect())
    }

    async fn select(&self) -> Result<Node> {
        let state = self.state.read().await;
        if state.offsets.is_empty() {
            return Err(BeaconError::NoAvailableNode(self.service_name.clone()));
        }

        let mut rng = rand::thread_rng();
        let address = if state.same_weight {
            // 等权重时直接均匀取下标
            let idx = rng.gen_range(0..state.offsets.len());
            &state.offsets[idx].address
        } else {
            let draw = rng.gen_range(0..=state.total_weight);
            &state
                .offsets
                .iter()
                .find(|o| o.start <= draw && draw <= o.end)
                .ok_or_else(|| BeaconError::NoAvailableNode(self.service_name.clone()))?
                .address
        };

        state
            .nodes
            .get(address)
            .cloned()
            .ok_or_else(|| BeaconError::NoAvailableNode(self.service_name.clone()))
    }

    async fn after_handle(&self, info: HandleInfo) -> Result<()> {
        let mut state = self.state.write().await;
        match state.nodes.get_mut(&info.address) {
            Some(node) => {
                if info.succeeded() {
                    node.statistics.success += 1;
                } else {
                    node.statistics.fail += 1;
                }
            }
            // 节点可能已在上一次校准中被移除
            None => debug!(
                "outcome for unknown node {} of {}",
                info.address, self.service_name
            ),
        }
        Ok(())
    }
}
