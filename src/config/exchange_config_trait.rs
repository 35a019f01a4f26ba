// ==========================================
// 组织架构管理系统 - 导入导出配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口(不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;

// ==========================================
// ExchangeConfigReader Trait
// ==========================================
// 用途: 导入导出引擎所需的配置读取接口
// 实现者: ConfigManager(从 config_kv 表读取)
#[async_trait]
pub trait ExchangeConfigReader: Send + Sync {
    /// 获取缺省批量块大小
    ///
    /// # 默认值
    /// - 100
    async fn get_default_batch_size(&self) -> anyhow::Result<usize>;

    /// 获取导入文件大小上限(MB)
    ///
    /// # 默认值
    /// - 50
    async fn get_max_file_size_mb(&self) -> anyhow::Result<u64>;

    /// 获取并发运行上限(后台导入/导出共用)
    ///
    /// # 默认值
    /// - 3
    async fn get_max_concurrent_runs(&self) -> anyhow::Result<usize>;
}
