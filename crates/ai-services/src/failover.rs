//! Primary/secondary response generation

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use aibridge_session_core::services::{ChatMessage, GeneratedReply, ResponseGenerator, ServiceError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// When the secondary generator is tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Only the primary is ever used
    Never,
    /// Fall back when the primary cannot be reached, times out or answers 5xx
    #[default]
    OnUnreachable,
    /// Fall back on every primary failure
    OnAnyError,
}

impl FallbackPolicy {
    pub fn allows(self, error: &ServiceError) -> bool {
        match self {
            FallbackPolicy::Never => false,
            FallbackPolicy::OnUnreachable => error.is_unreachable(),
            FallbackPolicy::OnAnyError => true,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown fallback policy {0:?} (expected never, on_unreachable or on_any_error)")]
pub struct UnknownPolicy(pub String);

impl FromStr for FallbackPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "never" | "off" | "none" => Ok(FallbackPolicy::Never),
            "on_unreachable" | "unreachable" => Ok(FallbackPolicy::OnUnreachable),
            "on_any_error" | "any" | "always" => Ok(FallbackPolicy::OnAnyError),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FallbackPolicy::Never => "never",
            FallbackPolicy::OnUnreachable => "on_unreachable",
            FallbackPolicy::OnAnyError => "on_any_error",
        };
        f.write_str(name)
    }
}

/// Tries the primary generator, then the secondary when the policy allows
pub struct FailoverGenerator {
    primary: Arc<dyn ResponseGenerator>,
    secondary: Option<Arc<dyn ResponseGenerator>>,
    policy: FallbackPolicy,
}

impl FailoverGenerator {
    pub fn new(primary: Arc<dyn ResponseGenerator>) -> Self {
        Self {
            primary,
            secondary: None,
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn ResponseGenerator>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }
}

#[async_trait]
impl ResponseGenerator for FailoverGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<GeneratedReply, ServiceError> {
        let error = match self.primary.generate(messages).await {
            Ok(reply) => return Ok(reply),
            Err(e) => e,
        };
        match &self.secondary {
            Some(secondary) if self.policy.allows(&error) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = secondary.name(),
                    error = %error,
                    "Primary generator failed, falling back"
                );
                secondary.generate(messages).await
            }
            _ => Err(error),
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}
