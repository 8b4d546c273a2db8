pub mod settings;

pub use settings::Config;

use crate::error::FetchError;
use std::sync::Arc;

/// Loads the `.env` file if present, reads the environment and validates it.
pub fn load_config() -> Result<Arc<Config>, FetchError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.validate()?;

    Ok(Arc::new(config))
}
