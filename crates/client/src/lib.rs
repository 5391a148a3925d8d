//! Front end for tdf: sessions, data frames and expression helpers.
//!
//! ```no_run
//! use tdf_client::{col, eq, lit_i64, sum, SessionContext};
//!
//! # async fn run() -> tdf_common::Result<()> {
//! let ctx = SessionContext::default();
//! ctx.parquet("data.parquet", None)?
//!     .filter(eq(col("c1"), lit_i64(200)))
//!     .aggregate(vec![col("c1")], vec![sum(col("c2"))])
//!     .show()
//!     .await
//! # }
//! ```

mod session;

pub mod dataframe;
pub mod expr;

pub use dataframe::DataFrame;
pub use expr::*;
pub use session::{SessionContext, SharedSession};
