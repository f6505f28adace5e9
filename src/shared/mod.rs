pub mod errors;
pub mod schema;
pub mod state;
pub mod test_utils;
pub mod utils;
