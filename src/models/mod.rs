//! 数据模型模块

pub mod auth;
pub mod feedback;
pub mod role;
pub mod user;
