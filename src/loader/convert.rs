//! Conversion of definitions into runtime types

use super::types::{
    ErrorsDefinition, HttpDefinition, PaginationDefinition, PayloadFailureDefinition,
    ProviderDefinition, RefinementRuleDefinition, RetryDefinition, StopConditionDefinition,
};
use crate::classify::{ErrorClassifier, PayloadFailureRule, RefinementRule};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::pagination::{
    CursorStrategy, LinkHeaderStrategy, MarkerStrategy, NextUrlStrategy, OffsetStrategy,
    PageNumberStrategy, SinglePage, StopCondition,
};
use crate::retry::{Backoff, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

impl ProviderDefinition {
    /// HTTP client configuration for this provider
    pub fn http_config(&self) -> HttpClientConfig {
        let mut config = self.http.to_config();
        config.base_url = Some(self.base_url.clone());
        config.retry = self.retry.to_policy();
        config.default_headers.extend(self.headers.clone());
        config
    }
}

impl HttpDefinition {
    /// Client configuration without base URL, retry or headers
    pub fn to_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .no_rate_limit()
            .hold_off_on_throttle(self.hold_off_on_throttle);
        if let Some(rps) = self.rate_limit_rps {
            let burst = self.rate_limit_burst.unwrap_or(rps);
            builder = builder.rate_limit(RateLimiterConfig::new(rps, burst));
        }
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }
}

impl RetryDefinition {
    /// Runtime retry policy
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            max_elapsed: Duration::from_secs(self.max_elapsed_secs),
            backoff: Backoff::new(
                self.backoff,
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
            ),
            retry_on_conflict: self.retry_on_conflict,
        }
    }
}

impl ErrorsDefinition {
    /// Runtime classifier; fails on an invalid rule
    pub fn to_classifier(&self) -> Result<ErrorClassifier> {
        let mut builder = ErrorClassifier::builder();

        if !self.message_paths.is_empty() {
            builder = builder.message_paths(self.message_paths.iter().cloned());
        }
        if !self.code_paths.is_empty() {
            builder = builder.code_paths(self.code_paths.iter().cloned());
        }
        for name in &self.rate_limit_remaining_headers {
            builder = builder.remaining_header(name);
        }
        for name in &self.rate_limit_reset_headers {
            builder = builder.reset_header(name);
        }
        for rule in &self.rules {
            builder = builder.rule(rule.to_rule()?);
        }
        for rule in &self.payload_failures {
            builder = builder.payload_rule(rule.to_rule());
        }

        Ok(builder.build())
    }
}

impl RefinementRuleDefinition {
    /// Runtime refinement rule
    pub fn to_rule(&self) -> Result<RefinementRule> {
        let rule = match (&self.message_contains, &self.error_code, &self.pattern) {
            (Some(needle), None, None) => RefinementRule::message_contains(needle, self.kind),
            (None, Some(code), None) => RefinementRule::error_code(code, self.kind),
            (None, None, Some(pattern)) => RefinementRule::pattern(pattern, self.kind)?,
            _ => {
                return Err(Error::invalid_value(
                    "errors.rules",
                    "exactly one of message_contains, error_code or pattern must be set",
                ))
            }
        };
        Ok(rule.for_statuses(self.statuses.iter().copied()))
    }
}

impl PayloadFailureDefinition {
    /// Runtime payload failure rule
    pub fn to_rule(&self) -> PayloadFailureRule {
        let rule = match &self.equals {
            Some(value) => PayloadFailureRule::field_equals(&self.path, value.clone()),
            None => PayloadFailureRule::field_present(&self.path),
        };
        rule.with_kind(self.kind)
    }
}

impl PaginationDefinition {
    /// Runtime marker strategy
    pub fn to_strategy(&self) -> Result<Arc<dyn MarkerStrategy>> {
        let strategy: Arc<dyn MarkerStrategy> = match self {
            Self::None => Arc::new(SinglePage),
            Self::Offset {
                offset_param,
                limit_param,
                limit,
                stop,
            } => Arc::new(
                OffsetStrategy::new(offset_param, limit_param, *limit)
                    .with_stop_condition(stop.to_condition()),
            ),
            Self::PageNumber {
                page_param,
                start_page,
                page_size_param,
                page_size,
                stop,
            } => {
                let mut numbered = PageNumberStrategy::new(page_param, *start_page)
                    .with_stop_condition(stop.to_condition());
                match (page_size_param, page_size) {
                    (Some(param), Some(size)) => {
                        numbered = numbered.with_page_size(param, *size);
                    }
                    (Some(param), None) => numbered.page_size_param = Some(param.clone()),
                    (None, Some(size)) => numbered.page_size = Some(*size),
                    (None, None) => {}
                }
                Arc::new(numbered)
            }
            Self::Cursor {
                cursor_param,
                cursor_path,
                cursor_header,
                stop,
            } => {
                let strategy = match (cursor_path, cursor_header) {
                    (Some(path), None) => CursorStrategy::new(cursor_param, path),
                    (None, Some(header)) => CursorStrategy::from_header(cursor_param, header),
                    _ => {
                        return Err(Error::invalid_value(
                            "pagination",
                            "cursor pagination needs exactly one of cursor_path or cursor_header",
                        ))
                    }
                };
                match stop {
                    Some(stop) => Arc::new(strategy.with_stop_condition(stop.to_condition())),
                    None => Arc::new(strategy),
                }
            }
            Self::LinkHeader { rel } => Arc::new(LinkHeaderStrategy::new(rel)),
            Self::NextUrl { next_url_path } => Arc::new(NextUrlStrategy::new(next_url_path)),
        };
        Ok(strategy)
    }
}

impl StopConditionDefinition {
    /// Runtime stop condition
    pub fn to_condition(&self) -> StopCondition {
        match self {
            Self::EmptyPage => StopCondition::EmptyPage,
            Self::TotalCount { path } => StopCondition::total_count(path),
            Self::TotalPages { path } => StopCondition::total_pages(path),
            Self::Field { path, value } => StopCondition::field(path, value.clone()),
        }
    }
}
