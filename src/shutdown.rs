//! 优雅退出信号
//!
//! Linux/macOS 监听 SIGINT 与 SIGTERM，其他平台监听 Ctrl+C。

use tracing::{info, warn};

/// 退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
}

/// 等待第一个退出信号
pub async fn wait_for_signal() -> ShutdownReason {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("接收到SIGINT信号 (Ctrl+C)");
                        ShutdownReason::Interrupt
                    }
                    _ = sigterm.recv() => {
                        info!("接收到SIGTERM信号");
                        ShutdownReason::Terminate
                    }
                }
            }
            Err(e) => {
                warn!("SIGTERM 处理器注册失败，仅监听 Ctrl+C: {}", e);
                wait_for_ctrl_c().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await
    }
}

async fn wait_for_ctrl_c() -> ShutdownReason {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl+C 处理器注册失败: {}", e);
        // 无法监听信号时保持运行，交由进程管理器终止
        std::future::pending::<()>().await;
    }
    info!("接收到Ctrl+C信号");
    ShutdownReason::Interrupt
}
