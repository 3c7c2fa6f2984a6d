use dotenv::dotenv;
use crate::errors::Result;
use std::env;

pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Runtime settings, handed to `rocket()` and managed as state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
}

impl Settings {
    pub fn from_env() -> Result<Settings> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(cost) => cost.trim().parse::<u32>()?,
            Err(_) => DEFAULT_BCRYPT_COST,
        };

        Ok(Settings {
            database_url,
            jwt_secret,
            bcrypt_cost: clamp_cost(bcrypt_cost),
        })
    }
}

/// bcrypt rejects costs outside 4..=31.
pub fn clamp_cost(cost: u32) -> u32 {
    cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST)
}
