use std::fmt;

/// 短期记忆状态子系统的统一错误类型
#[derive(Debug)]
pub enum StateError {
    /// 入站 Activity 前置条件错误
    Activity(ActivityError),
    /// 存储后端错误
    Storage(StorageError),
    /// 解码/类型转换错误
    Decode(DecodeError),
    /// 属性不存在（必填属性读取时抛出，区别于解码失败）
    PropertyNotFound(String),
    /// 配置错误
    Config(ConfigError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// 入站 Activity 前置条件错误
#[derive(Debug)]
pub enum ActivityError {
    /// Activity 缺少 channelId，无法计算存储键
    MissingChannelId,
    /// Activity 缺少 From.Id，无法计算存储键
    MissingUserId,
    /// 属性名为空
    EmptyPropertyName,
}

/// 存储后端错误
#[derive(Debug)]
pub enum StorageError {
    /// 网络请求失败
    NetworkError(String),
    /// 远端返回错误状态码
    ApiError { status: u16, message: String },
    /// 本地存储读写失败
    IoError(String),
    /// 序列化/反序列化错误
    SerializationError(String),
}

/// 解码/类型转换错误
#[derive(Debug)]
pub enum DecodeError {
    /// 后端返回的数据不是预期的属性包形状
    InvalidBagShape(String),
    /// 属性值无法转换为声明的类型
    PropertyConversion { name: String, message: String },
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

// 实现 Display trait
impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Activity(e) => write!(f, "Activity Error: {}", e),
            StateError::Storage(e) => write!(f, "Storage Error: {}", e),
            StateError::Decode(e) => write!(f, "Decode Error: {}", e),
            StateError::PropertyNotFound(name) => write!(f, "Property '{}' not found", name),
            StateError::Config(e) => write!(f, "Config Error: {}", e),
            StateError::Io(e) => write!(f, "IO Error: {}", e),
            StateError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for ActivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityError::MissingChannelId => {
                write!(f, "invalid activity: missing channelId")
            }
            ActivityError::MissingUserId => {
                write!(f, "invalid activity: missing From.Id")
            }
            ActivityError::EmptyPropertyName => write!(f, "property name must not be empty"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            StorageError::ApiError { status, message } => {
                write!(f, "API error (status {}): {}", status, message)
            }
            StorageError::IoError(msg) => write!(f, "Storage IO error: {}", msg),
            StorageError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidBagShape(msg) => {
                write!(f, "Data is not in the correct format for state: {}", msg)
            }
            DecodeError::PropertyConversion { name, message } => {
                write!(f, "Cannot convert property '{}': {}", name, message)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

// 实现 std::error::Error trait
impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ActivityError {}
impl std::error::Error for StorageError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for ConfigError {}

// From 转换实现
impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Io(err)
    }
}

impl From<reqwest::Error> for StateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StateError::Storage(StorageError::NetworkError("Request timeout".to_string()))
        } else if err.is_connect() {
            StateError::Storage(StorageError::NetworkError(format!(
                "Connection failed: {}",
                err
            )))
        } else {
            StateError::Storage(StorageError::NetworkError(err.to_string()))
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Storage(StorageError::SerializationError(err.to_string()))
    }
}

impl From<serde_yaml::Error> for StateError {
    fn from(err: serde_yaml::Error) -> Self {
        StateError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<ActivityError> for StateError {
    fn from(err: ActivityError) -> Self {
        StateError::Activity(err)
    }
}

impl From<StorageError> for StateError {
    fn from(err: StorageError) -> Self {
        StateError::Storage(err)
    }
}

impl From<DecodeError> for StateError {
    fn from(err: DecodeError) -> Self {
        StateError::Decode(err)
    }
}

impl From<ConfigError> for StateError {
    fn from(err: ConfigError) -> Self {
        StateError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, StateError>;
