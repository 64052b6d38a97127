pub mod description;
pub(crate) mod paths;
pub mod renderer;

pub use description::{PathView, SuiteDescription, SuiteSource};
pub use renderer::{
    include_path_prefix, suite_page_path, SuiteRenderer, ERROR_DIV_ID, RESULTS_DIV_ID,
    SUITE_URL_PREFIX,
};
