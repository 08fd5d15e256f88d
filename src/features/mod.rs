/// 图片压缩（JSON / 二进制两种入口）
pub mod compress;

/// 存活检查
pub mod health;

/// 凭证状态与用量
pub mod status;

/// Tinify 上游客户端
pub mod tinify;
