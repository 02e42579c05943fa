//! Invocation configuration and build identity.
//!
//! [`Config`] carries the knobs the pipeline accepts from its caller (today
//! only the HTTP fetch behaviour). [`BuildInfo`] is the tool's identity,
//! fixed at compile time and handed to the front end at startup.

use std::fmt;
use std::time::Duration;

/// Options controlling how remote sources are fetched.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use xq::config::FetchOptions;
///
/// let opts = FetchOptions::default().timeout(Some(Duration::from_secs(10)));
/// assert_eq!(opts.timeout, Some(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Total time allowed for an HTTP request, including reading the body.
    /// `None` (the default) waits indefinitely.
    pub timeout: Option<Duration>,
    /// Value of the `User-Agent` header sent with HTTP requests.
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchOptions {
    /// Sets the HTTP timeout. `None` disables it.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header sent with HTTP requests.
    #[must_use]
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}

/// Configuration for one run of the query pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// How `http://` and `https://` sources are fetched.
    pub fetch: FetchOptions,
}

impl Config {
    /// Replaces the fetch options.
    #[must_use]
    pub fn fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }
}

/// Identity of the `xq` build.
///
/// Values come from Cargo metadata and from optional `XQ_SOURCE`,
/// `XQ_COMMIT`, `XQ_PLATFORM` and `XQ_BUILD_TIME` environment variables set
/// when compiling. Anything not provided reads `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub name: &'static str,
    pub source: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub platform: &'static str,
    pub build_time: &'static str,
}

const UNKNOWN: &str = "unknown";

impl BuildInfo {
    /// The identity of the running binary.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            source: or_unknown(option_env!("XQ_SOURCE")),
            version: env!("CARGO_PKG_VERSION"),
            commit: or_unknown(option_env!("XQ_COMMIT")),
            platform: or_unknown(option_env!("XQ_PLATFORM")),
            build_time: or_unknown(option_env!("XQ_BUILD_TIME")),
        }
    }
}

const fn or_unknown(value: Option<&'static str>) -> &'static str {
    match value {
        Some(v) => v,
        None => UNKNOWN,
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Commit: {}", self.commit)?;
        writeln!(f, "Platform: {}", self.platform)?;
        write!(f, "Build Time: {}", self.build_time)
    }
}
