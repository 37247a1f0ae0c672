/// Data layer: source model types, loading, and flattening.
///
/// Architecture:
/// ```text
///  model.json   static_reduction_model.json
///        │                 │
///        ▼                 ▼
///   ┌──────────────────────────┐
///   │          loader          │  parse JSON → SourceModel, StaticReduction
///   └──────────────────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ SourceModel │  channel groups, modal matrices, GainSource
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  table   │  flatten groups → FlatTable (one row per record)
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod table;
