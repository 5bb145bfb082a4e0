use std::sync::Arc;

use anyhow::Result;

use crate::{
    cache::CacheManager, config::Config, llm::client::ProviderRouter, quota::UsageLedger,
};

#[derive(Clone)]
pub struct GeneratorContext {
    /// Provider路由器，所有模型调用都经由它完成
    pub router: Arc<ProviderRouter>,
    /// 配置
    pub config: Config,
    /// 缓存管理器
    pub cache_manager: Arc<CacheManager>,
    /// 用户配额台账
    pub usage: Arc<UsageLedger>,
    /// 当前任务所属用户
    pub user_id: Option<String>,
}

impl GeneratorContext {
    /// 根据配置创建上下文并注册全部provider
    pub fn new(config: Config) -> Result<Self> {
        let router = ProviderRouter::from_config(&config)?;
        Ok(Self::with_router(config, router))
    }

    /// 使用已构建好的路由器创建上下文
    pub fn with_router(config: Config, router: ProviderRouter) -> Self {
        let cache_manager = Arc::new(CacheManager::new(config.cache.clone()));
        let usage = Arc::new(UsageLedger::new(config.quota.clone()));
        Self {
            router: Arc::new(router),
            config,
            cache_manager,
            usage,
            user_id: None,
        }
    }

    /// 绑定到某个用户的上下文副本，共享路由器、缓存与配额台账
    pub fn for_user(&self, user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            ..self.clone()
        }
    }
}
