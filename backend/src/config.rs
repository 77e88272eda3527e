use std::env;

/// Service fee added on top of every event price, in cents.
pub const DEFAULT_SERVICE_FEE_CENTS: i64 = 90;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub service_fee_cents: i64,
    pub is_production: bool,
    pub payments: PaymentConfig,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub frontend_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let is_production = env::var("BOOKING_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => {
                if is_production && secret.len() < 32 {
                    panic!("JWT_SECRET must be at least 32 characters in production");
                }
                secret
            }
            Err(_) => {
                if is_production {
                    panic!("JWT_SECRET environment variable must be set in production");
                }
                tracing::warn!("WARNING: Using default JWT secret. Set JWT_SECRET in production!");
                "development_secret_key_change_in_production".to_string()
            }
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| parse_origins(&origins))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:booking.db".to_string()),
            jwt_secret,
            jwt_expiration_hours: parse_or("JWT_EXPIRATION_HOURS", 24 * 7),
            bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            cors_allowed_origins,
            service_fee_cents: parse_or("SERVICE_FEE_CENTS", DEFAULT_SERVICE_FEE_CENTS),
            is_production,
            payments: PaymentConfig::from_env(is_production),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl PaymentConfig {
    pub fn from_env(is_production: bool) -> Self {
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();

        if is_production && (stripe_secret_key.is_empty() || stripe_webhook_secret.is_empty()) {
            panic!(
                "Payment environment variables must be set in production (STRIPE_SECRET_KEY, STRIPE_WEBHOOK_SECRET)"
            );
        }

        if !is_production && stripe_secret_key.is_empty() {
            tracing::warn!("STRIPE_SECRET_KEY is not set; using the in-process mock payment gateway.");
        }

        Self {
            stripe_secret_key,
            stripe_webhook_secret,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "eur".to_string()),
            timeout_secs: parse_or("PAYMENT_TIMEOUT_SECS", 10),
        }
    }

    pub fn stripe_enabled(&self) -> bool {
        !self.stripe_secret_key.is_empty()
    }

    /// Settings used by the test app: mock gateway, fixed webhook secret.
    pub fn for_tests() -> Self {
        Self {
            stripe_secret_key: String::new(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            currency: "eur".to_string(),
            timeout_secs: 2,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{} has an invalid value {:?}; using the default", key, value);
            default
        }),
        Err(_) => default,
    }
}

fn parse_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_empty_entries_dropped() {
        assert_eq!(
            parse_origins(" https://a.example , ,https://b.example,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        assert_eq!(parse_or("BOOKING_TEST_UNSET_VARIABLE", 42_i64), 42);
    }
}
