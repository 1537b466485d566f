//! 动态加权轮询选择

use super::{HandleInfo, Node, Selector};
use crate::error::{BeaconError, Result};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 每次反馈的权重调整比例
pub const DEFAULT_STEP: f64 = 0.1;

/// 保留两位小数，0.005 进位
fn round2(x: f64) -> f64 {
    (x * 100.0 + 0.5).trunc() / 100.0
}

struct DynamicNode {
    node: Node,
    weight: f64,
    current_weight: f64,
}

struct DynamicState {
    nodes: HashMap<String, DynamicNode>,
    order: Vec<String>,
    total_weight: f64,
}

impl DynamicState {
    fn rebuild_total(&mut self) {
        self.total_weight = self.nodes.values().map(|n| n.weight).sum();
    }
}

/// 动态加权轮询选择器
///
/// 每个节点除静态权重外维护一个动态权重：调用成功按比例回升（不超过
/// 静态权重），失败按比例衰减（无下限）；选择按动态权重的累计区间进行
pub struct DynamicRoundRobin {
    service_name: String,
    step: f64,
    state: RwLock<DynamicState>,
}

impl DynamicRoundRobin {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::with_step(service_name, DEFAULT_STEP)
    }

    pub fn with_step(service_name: impl Into<String>, step: f64) -> Self {
        Self {
            service_name: service_name.into(),
            step,
            state: RwLock::new(DynamicState {
                nodes: HashMap::new(),
                order: Vec::new(),
                total_weight: 0.0,
            }),
        }
    }

    /// 各节点当前的动态权重，按加入顺序返回
    pub async fn current_weights(&self) -> Vec<(String, f64)> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|addr| state.nodes.get(addr).map(|n| (addr.clone(), n.current_weight)))
            .collect()
    }
}

#[async_trait]
impl Selector for DynamicRoundRobin {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn add_node(&self, node: Node) -> Result<()> {
        let address = node.address();
        let weight = node.weight as f64;
        let mut state = self.state.write().await;

        if state
            .nodes
            .insert(
                address.clone(),
                DynamicNode {
                    node,
                    weight,
                    current_weight: weight,
                },
            )
            .is_some()
        {
            state.order.retain(|a| a != &address);
        }
        state.order.push(address);
        state.rebuild_total();

        Ok(())
    }

    async fn delete_node(&self, node: &Node) -> Result<()> {
        let address = node.address();
        let mut state = self.state.write().await;

        state.nodes.remove(&address);
        state.order.retain(|a| a != &address);
        state.rebuild_total();

        Ok(())
    }

    async fn nodes(&self) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        Ok(state.nodes.values().map(|n| n.node.clone()).collect())
    }

    async fn select(&self) -> Result<Node> {
        let state = self.state.read().await;
        if state.order.is_empty() {
            return Err(BeaconError::NoAvailableNode(self.service_name.clone()));
        }

        let mut rng = rand::thread_rng();
        let dynamic_total: f64 = state.nodes.values().map(|n| n.current_weight).sum();

        let address = if dynamic_total > 0.0 {
            let draw = rng.gen_range(0.0..dynamic_total);
            let mut acc = 0.0;
            let mut picked = None;
            for addr in &state.order {
                let Some(node) = state.nodes.get(addr) else { continue };
                acc += node.current_weight;
                if draw < acc {
                    picked = Some(addr);
                    break;
                }
            }
            // 浮点累加误差时落到末位节点
            picked.or_else(|| state.order.last())
        } else {
            // 动态权重全部衰减殆尽时退化为均匀随机
            let idx = rng.gen_range(0..state.order.len());
            state.order.get(idx)
        };

        address
            .and_then(|addr| state.nodes.get(addr))
            .map(|n| n.node.clone())
            .ok_or_else(|| BeaconError::NoAvailableNode(self.service_name.clone()))
    }

    async fn after_handle(&self, info: HandleInfo) -> Result<()> {
        let step = self.step;
        let mut state = self.state.write().await;
        match state.nodes.get_mut(&info.address) {
            Some(node) => {
                if info.succeeded() {
                    node.node.statistics.success += 1;
                    node.current_weight =
                        round2(node.current_weight * (1.0 + step)).min(node.weight);
                } else {
                    node.node.statistics.fail += 1;
                    node.current_weight = round2(node.current_weight * (1.0 - step));
                }
            }
            None => debug!(
                "outcome for unknown node {} of {}",
                info.address, self.service_name
            ),
        }
        Ok(())
    }
}
