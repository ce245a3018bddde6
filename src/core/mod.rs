mod finding;
mod grouped;
mod report;
mod savings;
mod validation;

pub use finding::Finding;
pub use grouped::Grouped;
pub use report::CostReport;
pub use savings::{SavingsEstimate, SavingsTier};
pub use validation::{
    CategoryResults, Check, CheckStatus, SectionOutcome, SectionStatus, ValidationReport,
    ValidationResults,
};
