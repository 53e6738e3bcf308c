/// Data layer: the spectrum model, file loading, selection and export.
///
/// Architecture:
/// ```text
///  .fits / .json / .parquet / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  extension → registry / template / table reader
///   └──────────┘
///        │
///        ▼
///   ┌────────────────────┐
///   │ SpectrumCollection  │  Vec<Spectrum>, grouped by purpose
///   └────────────────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌──────────┐   ┌──────────┐
///   │  filter   │   │  export   │  CSV / Parquet tables
///   └──────────┘   └──────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
