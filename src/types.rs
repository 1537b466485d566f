use serde::{Deserialize, Serialize};

/// 注册到 etcd 的服务节点载荷
///
/// 序列化为 `{"Host":"<ip>","Port":<int>}`，与既有注册数据保持兼容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceNode {
    pub host: String,
    pub port: u16,
}

impl ServiceNode {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 节点的唯一标识，格式 `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
