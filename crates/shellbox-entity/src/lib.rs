//! # shellbox-entity
//!
//! Domain entity models for Shellbox: users and their plans, name slots,
//! boxes, and background task records. All models derive `serde` traits and
//! `sqlx::FromRow` so they can move between the API boundary and the
//! relational store without mapping layers.

pub mod boxes;
pub mod slot;
pub mod task;
pub mod user;
