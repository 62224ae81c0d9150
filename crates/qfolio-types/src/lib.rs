mod asset;
mod error;
mod returns;
mod weights;
mod constraints;
mod solver;
mod cancel;

pub use asset::AssetId;
pub use error::{ErrorKind, QfolioError, Result};
pub use returns::{PriceRow, ReturnKind, ReturnSeries};
pub use weights::{WeightVector, WEIGHT_TOLERANCE};
pub use constraints::{ConstraintConfig, Constraints};
pub use solver::{ConstraintSatisfaction, Diagnostics, SolveStatus, SolverKind, SolverResult};
pub use cancel::{CancelToken, RunBudget};
