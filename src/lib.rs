//! Petri 网显式状态模型检查核心.
//!
//! 状态以位键存放在路径压缩的位字典树 [`ptrie::StateIndex`] 中; [`checker::ModelChecker`]
//! 在网与性质自动机的积上即时生成后继, 做可达性、安全性或接受环搜索.
#![warn(non_snake_case)]

pub mod buchi;
pub mod checker;
pub mod config;
pub mod encoding;
pub mod model;
pub mod net;
pub mod options;
pub mod product;
pub mod ptrie;
pub mod util;
