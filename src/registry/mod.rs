//! 服务注册模块
//!
//! 将本实例的地址写入 etcd 并通过租约续期维持存活；
//! 租约到期未续期时注册信息由 etcd 自动清除

pub mod registrar;

pub use registrar::EtcdRegistrar;

use crate::error::Result;
use async_trait::async_trait;

/// 服务注册器
#[async_trait]
pub trait Registrar: Send + Sync {
    /// 注册本实例并开始租约续期
    async fn register(&mut self) -> Result<()>;

    /// 撤销租约并注销本实例
    async fn deregister(&mut self) -> Result<()>;

    /// 最近一次续期是否成功
    ///
    /// 续期失败不会中断运行，租约会在服务端自行过期；
    /// 该标志用于让持有方观察到租约丢失
    fn is_healthy(&self) -> bool;
}
