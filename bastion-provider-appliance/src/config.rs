//! Provider configuration
//!
//! Built from the provider block's attribute map. Every timing knob has a
//! default; only the tenant is required.

use std::collections::HashMap;
use std::time::Duration;

use bastion_core::resource::Value;

use crate::error::{ApplianceError, ApplianceResult};
use crate::interface::PortLayoutTable;
use crate::inventory::RowLayout;
use crate::poller::WaitConfig;
use crate::types::{Locale, OrderKind};

const DEFAULT_ORDER_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_ORDER_DELAY_SECS: u64 = 10;
const DEFAULT_CREATE_TIMEOUT_MINS: u64 = 60;
const DEFAULT_UPDATE_TIMEOUT_MINS: u64 = 60;
const DEFAULT_DELETE_TIMEOUT_MINS: u64 = 60;
const DEFAULT_PROCESS_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_PROCESS_TIMEOUT_MINS: u64 = 30;
const SECS_PER_MIN: u64 = 60;

/// Configuration shared by every appliance resource of one provider instance
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub tenant_id: String,
    pub locale: Locale,
    pub order_poll_interval: Duration,
    pub order_delay: Duration,
    pub create_timeout: Duration,
    pub update_timeout: Duration,
    pub delete_timeout: Duration,
    pub process_poll_interval: Duration,
    pub process_timeout: Duration,
    /// Lower bound on the time between two status queries of any wait
    pub min_poll_interval: Duration,
    pub row_layout: RowLayout,
    pub port_layouts: PortLayoutTable,
}

impl ProviderConfig {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            locale: Locale::default(),
            order_poll_interval: Duration::from_secs(DEFAULT_ORDER_POLL_INTERVAL_SECS),
            order_delay: Duration::from_secs(DEFAULT_ORDER_DELAY_SECS),
            create_timeout: Duration::from_secs(DEFAULT_CREATE_TIMEOUT_MINS * SECS_PER_MIN),
            update_timeout: Duration::from_secs(DEFAULT_UPDATE_TIMEOUT_MINS * SECS_PER_MIN),
            delete_timeout: Duration::from_secs(DEFAULT_DELETE_TIMEOUT_MINS * SECS_PER_MIN),
            process_poll_interval: Duration::from_secs(DEFAULT_PROCESS_POLL_INTERVAL_SECS),
            process_timeout: Duration::from_secs(DEFAULT_PROCESS_TIMEOUT_MINS * SECS_PER_MIN),
            min_poll_interval: Duration::ZERO,
            row_layout: RowLayout::default(),
            port_layouts: PortLayoutTable::default(),
        }
    }

    /// Build a configuration from provider block attributes
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> ApplianceResult<Self> {
        let attrs = Attributes(attributes);

        let tenant_id = attrs
            .get_string("tenant_id")?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApplianceError::invalid_config("tenant_id is required"))?;
        let mut config = Self::new(tenant_id);

        if let Some(locale) = attrs.get_string("locale")? {
            config.locale = Locale::parse(locale)?;
        }
        if let Some(secs) = attrs.get_positive("order_poll_interval_secs")? {
            config.order_poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = attrs.get_non_negative("order_delay_secs")? {
            config.order_delay = Duration::from_secs(secs);
        }
        if let Some(timeout) = attrs.get_minutes("create_timeout_mins")? {
            config.create_timeout = timeout;
        }
        if let Some(timeout) = attrs.get_minutes("update_timeout_mins")? {
            config.update_timeout = timeout;
        }
        if let Some(timeout) = attrs.get_minutes("delete_timeout_mins")? {
            config.delete_timeout = timeout;
        }
        if let Some(secs) = attrs.get_positive("process_poll_interval_secs")? {
            config.process_poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = attrs.get_non_negative("min_poll_interval_secs")? {
            config.min_poll_interval = Duration::from_secs(secs);
        }
        if let Some(timeout) = attrs.get_minutes("process_timeout_mins")? {
            config.process_timeout = timeout;
        }

        Ok(config)
    }

    /// Wait parameters for an order of the given kind
    pub fn order_wait(&self, kind: OrderKind) -> WaitConfig {
        let timeout = match kind {
            OrderKind::Create => self.create_timeout,
            OrderKind::Update => self.update_timeout,
            OrderKind::Delete => self.delete_timeout,
        };
        WaitConfig::new(timeout)
            .with_delay(self.order_delay)
            .with_poll_interval(self.order_poll_interval)
            .with_min_timeout(self.min_poll_interval)
    }

    /// Wait parameters for a portal interface update process
    pub fn process_wait(&self) -> WaitConfig {
        WaitConfig::new(self.process_timeout)
            .with_poll_interval(self.process_poll_interval)
            .with_min_timeout(self.min_poll_interval)
    }
}

/// Typed accessors over an attribute map
struct Attributes<'a>(&'a HashMap<String, Value>);

impl Attributes<'_> {
    fn get_string(&self, key: &str) -> ApplianceResult<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ApplianceError::invalid_config(format!(
                "{} must be a string, got {:?}",
                key, other
            ))),
        }
    }

    fn get_non_negative(&self, key: &str) -> ApplianceResult<Option<u64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Int(i)) if *i >= 0 => Ok(Some(*i as u64)),
            Some(other) => Err(ApplianceError::invalid_config(format!(
                "{} must be a non-negative integer, got {:?}",
                key, other
            ))),
        }
    }

    fn get_minutes(&self, key: &str) -> ApplianceResult<Option<Duration>> {
        let Some(mins) = self.get_positive(key)? else {
            return Ok(None);
        };
        mins.checked_mul(SECS_PER_MIN)
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| {
                ApplianceError::invalid_config(format!("{} is too large: {}", key, mins))
            })
    }

    fn get_positive(&self, key: &str) -> ApplianceResult<Option<u64>> {
        match self.get_non_negative(key)? {
            Some(0) => Err(ApplianceError::invalid_config(format!(
                "{} must be greater than zero",
                key
            ))),
            value => Ok(value),
        }
    }
}
