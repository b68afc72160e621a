//! 邮件发送
//!
//! 只定义发送契约；默认实现把重置链接写入结构化日志，不包含 SMTP 传输。

use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_reset_link(&self, to: &str, link: &str) -> Result<(), AppError>;
}

/// 基于 tracing 的发送器
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl EmailSender for LogMailer {
    async fn send_reset_link(&self, to: &str, link: &str) -> Result<(), AppError> {
        // 链接包含一次性凭证，只在 debug 级别输出
        tracing::info!(from = %self.from_address, to = %to, "Password reset email dispatched");
        tracing::debug!(to = %to, link = %link, "Password reset link");
        Ok(())
    }
}
