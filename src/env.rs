//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量读取，所有变量均以 `TRANSLATOR_` 开头

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量：未设置返回 `Ok(None)`，格式错误返回 `Err`
    fn lookup() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Self::parse(value.trim()).map(Some),
            _ => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        match Self::lookup() {
            Ok(Some(value)) => value,
            _ => default,
        }
    }
}

fn invalid(name: &str, message: String) -> EnvError {
    EnvError {
        variable: name.to_string(),
        message,
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> EnvResult<T> {
    value
        .parse::<T>()
        .map_err(|_| invalid(name, format!("Invalid number '{}'", value)))
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TRANSLATOR_LOG_LEVEL";
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(invalid(
                    Self::NAME,
                    format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                )),
            }
        }
    }
}

/// 请求相关环境变量
pub mod translation {
    use super::*;

    /// 每个请求包含的块数
    pub struct BlocksPerRequest;
    impl EnvVar<usize> for BlocksPerRequest {
        const NAME: &'static str = "TRANSLATOR_BLOCKS_PER_REQUEST";
        const DESCRIPTION: &'static str = "Blocks sent per translation request: 3, 5 or 8";

        fn parse(value: &str) -> EnvResult<usize> {
            let count: usize = parse_number(value, Self::NAME)?;
            if matches!(count, 3 | 5 | 8) {
                Ok(count)
            } else {
                Err(invalid(
                    Self::NAME,
                    format!("Unsupported value {}. Use: 3, 5, 8", count),
                ))
            }
        }
    }

    /// 采样温度
    pub struct Temperature;
    impl EnvVar<f32> for Temperature {
        const NAME: &'static str = "TRANSLATOR_TEMPERATURE";
        const DESCRIPTION: &'static str = "Sampling temperature between 0.0 and 1.0";

        fn parse(value: &str) -> EnvResult<f32> {
            let temperature: f32 = parse_number(value, Self::NAME)?;
            if (0.0..=1.0).contains(&temperature) {
                Ok(temperature)
            } else {
                Err(invalid(
                    Self::NAME,
                    format!("Temperature {} out of range 0.0-1.0", temperature),
                ))
            }
        }
    }

    /// 最大输出令牌数
    pub struct MaxTokens;
    impl EnvVar<u32> for MaxTokens {
        const NAME: &'static str = "TRANSLATOR_MAX_TOKENS";
        const DESCRIPTION: &'static str = "Maximum completion tokens per request";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_number(value, Self::NAME)
        }
    }

    /// 请求超时（毫秒）
    pub struct TimeoutMs;
    impl EnvVar<u64> for TimeoutMs {
        const NAME: &'static str = "TRANSLATOR_TIMEOUT_MS";
        const DESCRIPTION: &'static str = "Request timeout in milliseconds";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_number(value, Self::NAME)
        }
    }
}

/// 动画相关环境变量
pub mod animation {
    use super::*;

    /// 淡出保持时间（毫秒）
    pub struct FadeOutMs;
    impl EnvVar<u64> for FadeOutMs {
        const NAME: &'static str = "TRANSLATOR_FADE_OUT_MS";
        const DESCRIPTION: &'static str = "Hold before an element's content is replaced";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_number(value, Self::NAME)
        }
    }

    /// 显示后到稳定状态的保持时间（毫秒）
    pub struct SettleMs;
    impl EnvVar<u64> for SettleMs {
        const NAME: &'static str = "TRANSLATOR_SETTLE_MS";
        const DESCRIPTION: &'static str = "Hold between reveal and settled state";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_number(value, Self::NAME)
        }
    }

    /// 完成或出错后自动复位的延迟（毫秒）
    pub struct ResetDelayMs;
    impl EnvVar<u64> for ResetDelayMs {
        const NAME: &'static str = "TRANSLATOR_RESET_DELAY_MS";
        const DESCRIPTION: &'static str = "Delay before the session state is cleared";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_number(value, Self::NAME)
        }
    }
}
