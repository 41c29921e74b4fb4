use serde::{Deserialize, Serialize};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "SAFELINK";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - storage: 数据目录与段日志
/// - safety: 白名单、黑名单源、远程查询
/// - watchdog: 定时任务节奏
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > 配置文件 > 默认值
    /// ENV 前缀：SAFELINK，分隔符：__
    /// 示例：SAFELINK__WATCHDOG__INTERVAL_SECS=600
    pub fn load(path: Option<&str>) -> Self {
        use config::{Config, Environment, File};

        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> crate::errors::Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 段日志目录
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 每次写入后 fsync
    #[serde(default = "default_sync_on_write")]
    pub sync_on_write: bool,
    /// 单个段的最大字节数，超过后滚动到新段
    #[serde(default = "default_segment_max_bytes")]
    pub segment_max_bytes: u64,
}

/// 安全分类配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// 白名单文件（每行一个域名）
    #[serde(default = "default_whitelist_path")]
    pub whitelist_path: Option<String>,
    #[serde(default)]
    pub blocklist: BlocklistConfig,
    #[serde(default)]
    pub remote: RemoteLookupConfig,
}

/// 黑名单源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistConfig {
    /// 纯文本黑名单地址（每行一个 URL 或域名）；None 表示不刷新
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
    /// 单次刷新最多接收的条目数
    #[serde(default = "default_feed_max_entries")]
    pub max_entries: usize,
}

/// 远程查询服务配置（Safe Browsing v4）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLookupConfig {
    /// API Key；未配置时禁用远程查询
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_remote_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
    /// 每日请求配额
    #[serde(default = "default_daily_quota")]
    pub daily_quota: u64,
    /// 单次请求超时
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

/// 定时任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// 首次周期运行前的等待时间
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// 运行间隔
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_sync_on_write() -> bool {
    true
}

fn default_segment_max_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_whitelist_path() -> Option<String> {
    Some("whitelist".to_string())
}

fn default_feed_timeout_secs() -> u64 {
    30
}

fn default_feed_max_entries() -> usize {
    500_000
}

fn default_remote_endpoint() -> String {
    "https://safebrowsing.googleapis.com/v4/threatMatches:find".to_string()
}

fn default_client_id() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_daily_quota() -> u64 {
    10_000
}

fn default_remote_timeout_secs() -> u64 {
    5
}

fn default_initial_delay_secs() -> u64 {
    60
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_on_write: default_sync_on_write(),
            segment_max_bytes: default_segment_max_bytes(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            whitelist_path: default_whitelist_path(),
            blocklist: BlocklistConfig::default(),
            remote: RemoteLookupConfig::default(),
        }
    }
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            feed_url: None,
            timeout_secs: default_feed_timeout_secs(),
            max_entries: default_feed_max_entries(),
        }
    }
}

impl Default for RemoteLookupConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_remote_endpoint(),
            client_id: default_client_id(),
            client_version: default_client_version(),
            daily_quota: default_daily_quota(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
