use crate::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SNAPLEN: i32 = 1024;
pub const DEFAULT_TIMEOUT_MS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl FromStr for OutputFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(OutputFormat::Pretty),
            "json" => Ok(OutputFormat::Json),
            other => Err(CaptureError::Config(format!("無効な出力形式: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// 未設定の場合は起動時に対話的に選択する
    pub device: Option<String>,
    pub snaplen: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
    /// BPFフィルタ式。空文字列はフィルタなし
    pub filter: String,
    /// 指定された場合はデバイスの代わりにpcapファイルを読む
    pub read_file: Option<PathBuf>,
    pub resolve_hosts: bool,
    pub output: OutputFormat,
    pub max_packets: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            filter: String::new(),
            read_file: None,
            resolve_hosts: true,
            output: OutputFormat::Pretty,
            max_packets: None,
            log_file: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_env() -> CaptureResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CaptureResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let snaplen = match non_empty("CAPTURE_SNAPLEN") {
            Some(v) => v
                .trim()
                .parse::<i32>()
                .map_err(|e| CaptureError::Config(format!("無効なスナップ長: {}", e)))?,
            None => defaults.snaplen,
        };
        if snaplen <= 0 {
            return Err(CaptureError::Config(format!("スナップ長は正の値である必要があります: {}", snaplen)));
        }

        let timeout_ms = match non_empty("CAPTURE_TIMEOUT_MS") {
            Some(v) => v
                .trim()
                .parse::<i32>()
                .map_err(|e| CaptureError::Config(format!("無効なタイムアウト: {}", e)))?,
            None => defaults.timeout_ms,
        };
        // 0はlibpcapで無期限待ちになり、停止要求を検知できない
        if timeout_ms <= 0 {
            return Err(CaptureError::Config(format!("タイムアウトは正の値である必要があります: {}", timeout_ms)));
        }

        let promiscuous = match non_empty("CAPTURE_PROMISCUOUS") {
            Some(v) => parse_bool("CAPTURE_PROMISCUOUS", &v)?,
            None => defaults.promiscuous,
        };

        let resolve_hosts = match non_empty("CAPTURE_RESOLVE_HOSTS") {
            Some(v) => parse_bool("CAPTURE_RESOLVE_HOSTS", &v)?,
            None => defaults.resolve_hosts,
        };

        let output = match non_empty("CAPTURE_OUTPUT") {
            Some(v) => v.parse()?,
            None => defaults.output,
        };

        let max_packets = match non_empty("CAPTURE_COUNT") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|e| CaptureError::Config(format!("無効なパケット数: {}", e)))?,
            ),
            None => None,
        };

        Ok(CaptureConfig {
            device: non_empty("CAPTURE_DEVICE").map(|v| v.trim().to_string()),
            snaplen,
            promiscuous,
            timeout_ms,
            filter: lookup("CAPTURE_FILTER").unwrap_or_default(),
            read_file: non_empty("CAPTURE_READ_FILE").map(PathBuf::from),
            resolve_hosts,
            output,
            max_packets,
            log_file: non_empty("CAPTURE_LOG_FILE").map(PathBuf::from),
        })
    }
}

fn parse_bool(key: &str, value: &str) -> CaptureResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CaptureError::Config(format!("{}の値が不正です: {}", key, other))),
    }
}
