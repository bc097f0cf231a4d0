use crate::utils::error::DiagnosisError;
use crate::Result;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// 模型输入边长（128x128）
pub const INPUT_SIZE: u32 = 128;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// ONNX 模型文件路径
    pub model_path: PathBuf,

    /// 开发模式
    pub dev_mode: bool,

    /// 输入像素取值范围
    pub pixel_scale: PixelScale,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

/// 送入模型前的像素取值范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelScale {
    /// 原始 0..=255 取值（模型内部自带 rescale 层）
    #[default]
    Raw,
    /// 归一化到 0..=1
    Unit,
}

impl PixelScale {
    pub fn factor(self) -> f32 {
        match self {
            PixelScale::Raw => 1.0,
            PixelScale::Unit => 1.0 / 255.0,
        }
    }
}

impl FromStr for PixelScale {
    type Err = DiagnosisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(PixelScale::Raw),
            "unit" => Ok(PixelScale::Unit),
            other => Err(DiagnosisError::Config(format!(
                "Unknown pixel scale '{}', expected 'raw' or 'unit'",
                other
            ))),
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: impl Into<PathBuf>,
        intra_threads: Option<usize>,
        pixel_scale: PixelScale,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();

        let onnx_config = OnnxConfig {
            intra_threads: intra_threads.unwrap_or((cpu_cores * 3 / 4).max(1)), // 默认使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 20 * 1024 * 1024, // 20MB
        };

        let config = Self {
            bind_addr,
            model_path: model_path.into(),
            dev_mode,
            pixel_scale,
            onnx_config,
            server_config,
        };
        config.validate()?;

        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.onnx_config.intra_threads == 0 {
            return Err(DiagnosisError::Config(
                "intra_threads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// 解析绑定地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr.parse().map_err(|e| {
            DiagnosisError::Config(format!("Invalid bind address {}: {}", self.bind_addr, e))
        })
    }

    /// 单个上传图像允许的最大字节数
    pub fn max_image_bytes(&self) -> usize {
        self.server_config.max_request_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8501".to_string(),
            model_path: PathBuf::from("models/plant_disease.onnx"),
            dev_mode: false,
            pixel_scale: PixelScale::Raw,
            onnx_config: OnnxConfig {
                intra_threads: 1,
                optimization_level: 3,
            },
            server_config: ServerConfig {
                request_timeout: 60,
                max_request_size: 20 * 1024 * 1024,
            },
        }
    }
}
