//! # Petri 网核心定义（Place/Transition Net）
//!
//! 设离散库所集合 `P` 与迁移集合 `T`，基数分别为 `|P|` 与 `|T|`。
//! 定义输入/输出映射 `Pre, Post ∈ ℕ^{|P|×|T|}`。对任意标识 `M ∈ ℕ^{|P|}`：
//!
//! * 迁移 `t ∈ T` **可发生** 当且仅当 `∀p ∈ P: M[p] ≥ Pre[p, t]`；
//!   若启用抑制弧（`feature = "inhibitor"`），则抑制弧 `(p, t)` 要求 `M[p] < Pre[p, t]`；
//! * 迁移发生后 `M' = M - Pre[:, t] + Post[:, t]`，复位弧（`feature = "reset"`）
//!   在加入输出前将对应库所清零；容量上限与计数溢出以 [`FireError`] 报告。
//!
//! 模型检查核心只通过 [`NetModel`] 使用网。
//!
//! ## 示例
//!
//! ```rust
//! use pn_verify::net::*;
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new_with_tokens_and_capacity("p0", 1, 1));
//! let p1 = net.add_place(Place::new_with_tokens_and_capacity("p1", 0, 1));
//! let t0 = net.add_transition(Transition::new("t0"));
//!
//! net.set_input_weight(p0, t0, 1);
//! net.set_output_weight(p1, t0, 1);
//!
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire_transition(&marking, t0).unwrap();
//! assert_eq!(next.tokens(p0), 0);
//! assert_eq!(next.tokens(p1), 1);
//! ```

pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use core::{FireError, Net, NetModel};
pub use ids::{PlaceId, TransitionId};
pub use incidence::{Incidence, IncidenceBool};
pub use index_vec::{Idx, IndexVec};
pub use structure::{Marking, Place, Transition, Weight};
