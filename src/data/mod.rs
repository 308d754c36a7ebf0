/// Data layer: filename decoding, report parsing, reference loading and
/// the output table model.
///
/// Architecture:
/// ```text
///  *_fit_results.txt         PD summary (.csv / .json / .parquet)
///        │                           │
///        ▼                           ▼
///   ┌──────────┐  ┌────────────┐  ┌───────────┐
///   │ filename │  │ fit_result │  │ reference │  base key → PD volt
///   └──────────┘  └────────────┘  └───────────┘
///        │              │               │
///        └──────────────┼───────────────┘
///                       ▼
///                 ┌──────────┐
///                 │  model   │  Cell / Table → CSV
///                 └──────────┘
/// ```
///
/// `charge` reads the `*_mean.txt` summaries used for the modelling data set.

pub mod charge;
pub mod filename;
pub mod fit_result;
pub mod model;
pub mod reference;
