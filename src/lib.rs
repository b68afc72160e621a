//! 学习管理系统后端
//! 认证、基于角色的访问控制、个人资料与反馈问答

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
