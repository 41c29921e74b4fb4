use std::fmt;

#[derive(Debug, Clone)]
pub enum SafelinkError {
    Persistence(String),
    RecoveryRead(String),
    Classification(String),
    Job(String),
    Validation(String),
    CodeSpaceExhausted(String),
    Config(String),
    FileOperation(String),
    Serialization(String),
}

impl SafelinkError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            SafelinkError::Persistence(_) => "E001",
            SafelinkError::RecoveryRead(_) => "E002",
            SafelinkError::Classification(_) => "E003",
            SafelinkError::Job(_) => "E004",
            SafelinkError::Validation(_) => "E005",
            SafelinkError::CodeSpaceExhausted(_) => "E006",
            SafelinkError::Config(_) => "E007",
            SafelinkError::FileOperation(_) => "E008",
            SafelinkError::Serialization(_) => "E009",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SafelinkError::Persistence(_) => "Persistence Error",
            SafelinkError::RecoveryRead(_) => "Recovery Read Error",
            SafelinkError::Classification(_) => "Classification Error",
            SafelinkError::Job(_) => "Job Error",
            SafelinkError::Validation(_) => "Validation Error",
            SafelinkError::CodeSpaceExhausted(_) => "Code Space Exhausted",
            SafelinkError::Config(_) => "Configuration Error",
            SafelinkError::FileOperation(_) => "File Operation Error",
            SafelinkError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            SafelinkError::Persistence(msg) => msg,
            SafelinkError::RecoveryRead(msg) => msg,
            SafelinkError::Classification(msg) => msg,
            SafelinkError::Job(msg) => msg,
            SafelinkError::Validation(msg) => msg,
            SafelinkError::CodeSpaceExhausted(msg) => msg,
            SafelinkError::Config(msg) => msg,
            SafelinkError::FileOperation(msg) => msg,
            SafelinkError::Serialization(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于日志）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for SafelinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for SafelinkError {}

// 便捷的构造函数
impl SafelinkError {
    pub fn persistence<T: Into<String>>(msg: T) -> Self {
        SafelinkError::Persistence(msg.into())
    }

    pub fn recovery_read<T: Into<String>>(msg: T) -> Self {
        SafelinkError::RecoveryRead(msg.into())
    }

    pub fn classification<T: Into<String>>(msg: T) -> Self {
        SafelinkError::Classification(msg.into())
    }

    pub fn job<T: Into<String>>(msg: T) -> Self {
        SafelinkError::Job(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        SafelinkError::Validation(msg.into())
    }

    pub fn code_space_exhausted<T: Into<String>>(msg: T) -> Self {
        SafelinkError::CodeSpaceExhausted(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        SafelinkError::Config(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        SafelinkError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SafelinkError::Serialization(msg.into())
    }
}

// 常见错误类型的 From 实现
impl From<std::io::Error> for SafelinkError {
    fn from(err: std::io::Error) -> Self {
        SafelinkError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for SafelinkError {
    fn from(err: serde_json::Error) -> Self {
        SafelinkError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for SafelinkError {
    fn from(err: config::ConfigError) -> Self {
        SafelinkError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SafelinkError {
    fn from(err: toml::ser::Error) -> Self {
        SafelinkError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for SafelinkError {
    fn from(err: url::ParseError) -> Self {
        SafelinkError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SafelinkError>;
