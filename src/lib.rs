pub mod browser;
pub mod error;
pub mod report;
pub mod runner;
pub mod server;
pub mod suite;

//  Re-export commonly used items
pub use browser::{Browser, BrowserKind, TestResult, TestStatus};
pub use error::{BrowserError, Phase, ServerError, SuiteDescriptionError, SuiteRendererError};
pub use report::{RunReport, SuiteReport};
pub use runner::{RunnerAssets, TestRunner};
pub use server::{ServerConfig, SuiteServer};
pub use suite::{
    PathView, SuiteDescription, SuiteRenderer, SuiteSource, ERROR_DIV_ID, RESULTS_DIV_ID,
};
