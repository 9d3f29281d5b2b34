/// User agent string for HTTP requests
pub const USER_AGENT: &str = "astoria-pollen/0.1.0";

/// Pollen.com forecast API endpoint for the Astoria, NY zip code
pub const FORECAST_URL: &str = "https://www.pollen.com/api/forecast/current/pollen/11106";

/// Forecast page the API expects as the referer
pub const FORECAST_REFERER: &str = "https://www.pollen.com/forecast/current/pollen/11106";

/// Location name used at the start of every post
pub const DEFAULT_LOCATION_LABEL: &str = "Astoria";

/// Parameter store path holding the deployment's credentials
pub const PARAMETER_PREFIX: &str = "/astoria-pollen";

/// Region used for the parameter store when none is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Additional forecast attempts after the first one fails
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Fixed pause between forecast attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 50;

/// Absolute timeout for a single forecast attempt
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1000;

/// Deadline for a single posting target
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;

/// Top of the pollen.com index scale
pub const INDEX_SCALE_MAX: f64 = 12.0;

/// Days at or below this index are not worth posting about
pub const PUBLISH_THRESHOLD: f64 = 1.0;

/// Timeout for a single parameter store request
pub const PARAMETER_STORE_TIMEOUT_SECS: u64 = 10;
