//! The mutation/generation engine (§4.2): code generators, the five
//! mutators, context reachability, per-mutator statistics, and the
//! `FuzzEngine` that ties them together for the scheduler.

pub mod context_graph;
pub mod engine;
pub mod generators;
pub mod mutators;
pub mod rewrite;
pub mod stats;
pub mod tracer;
pub mod value_type;

pub use context_graph::ContextGraph;
pub use engine::{FuzzEngine, ProductionMode, Produced};
pub use generators::{default_generators, CodeGenerator};
pub use mutators::{default_mutators, MutationContext, Mutator};
pub use stats::{MutatorStats, StatsTable};
pub use tracer::{EngineTracer, MutationOutcome, NoopTracer};
pub use value_type::ValueType;
