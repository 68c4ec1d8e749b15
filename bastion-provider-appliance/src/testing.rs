//! Scripted in-memory `OrderClient` for tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{
    DeviceInterface, DeviceRef, DeviceUuid, InterfaceSlotRequest, OrderClient, OrderId,
    OrderPayload, OrderStatus, ProcessId,
};
use crate::error::{ApplianceError, ApplianceResult};
use crate::inventory::RawInventoryRow;
use crate::types::{DeviceCategory, Locale, OrderKind};

/// Pop the next scripted value, repeating the last one once the script runs dry
fn next<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub kind: OrderKind,
    pub category: DeviceCategory,
    pub locale: Locale,
    pub payload: OrderPayload,
}

#[derive(Default)]
struct Script {
    inventory: HashMap<DeviceCategory, VecDeque<Vec<RawInventoryRow>>>,
    order_status: VecDeque<OrderStatus>,
    process_status: VecDeque<String>,
    uuids: Vec<DeviceUuid>,
    interfaces: HashMap<String, Vec<DeviceInterface>>,
    submitted: Vec<SubmittedOrder>,
    interface_updates: Vec<(DeviceRef, Vec<InterfaceSlotRequest>)>,
    inventory_calls: usize,
    status_calls: usize,
    fail_interface_update: Option<String>,
}

#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue successive inventory listings for a category
    pub fn inventory(self, category: DeviceCategory, snapshots: Vec<Vec<RawInventoryRow>>) -> Self {
        self.script
            .lock()
            .unwrap()
            .inventory
            .insert(category, snapshots.into());
        self
    }

    pub fn order_status(self, statuses: Vec<OrderStatus>) -> Self {
        self.script.lock().unwrap().order_status = statuses.into();
        self
    }

    pub fn process_status(self, statuses: &[&str]) -> Self {
        self.script.lock().unwrap().process_status =
            statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn device(self, hostname: &str, server_uuid: &str, interfaces: Vec<DeviceInterface>) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            script.uuids.push(DeviceUuid {
                hostname: hostname.to_string(),
                server_uuid: server_uuid.to_string(),
            });
            script
                .interfaces
                .insert(server_uuid.to_string(), interfaces);
        }
        self
    }

    pub fn failing_interface_update(self, message: &str) -> Self {
        self.script.lock().unwrap().fail_interface_update = Some(message.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<SubmittedOrder> {
        self.script.lock().unwrap().submitted.clone()
    }

    pub fn interface_updates(&self) -> Vec<(DeviceRef, Vec<InterfaceSlotRequest>)> {
        self.script.lock().unwrap().interface_updates.clone()
    }

    pub fn inventory_calls(&self) -> usize {
        self.script.lock().unwrap().inventory_calls
    }

    pub fn status_calls(&self) -> usize {
        self.script.lock().unwrap().status_calls
    }
}

#[async_trait]
impl OrderClient for ScriptedClient {
    async fn list_inventory(
        &self,
        _tenant_id: &str,
        _locale: Locale,
        category: DeviceCategory,
    ) -> ApplianceResult<Vec<RawInventoryRow>> {
        let mut script = self.script.lock().unwrap();
        script.inventory_calls += 1;
        Ok(script
            .inventory
            .get_mut(&category)
            .and_then(next)
            .unwrap_or_default())
    }

    async fn submit_order(
        &self,
        kind: OrderKind,
        _tenant_id: &str,
        locale: Locale,
        category: DeviceCategory,
        payload: &OrderPayload,
    ) -> ApplianceResult<OrderId> {
        let mut script = self.script.lock().unwrap();
        script.submitted.push(SubmittedOrder {
            kind,
            category,
            locale,
            payload: payload.clone(),
        });
        Ok(OrderId(format!("order-{}", script.submitted.len())))
    }

    async fn get_order_status(
        &self,
        _order_id: &OrderId,
        _tenant_id: &str,
        _locale: Locale,
        _category: DeviceCategory,
    ) -> ApplianceResult<OrderStatus> {
        let mut script = self.script.lock().unwrap();
        script.status_calls += 1;
        Ok(next(&mut script.order_status).unwrap_or_else(|| OrderStatus::in_progress(100)))
    }

    async fn list_device_uuids(&self, _tenant_id: &str) -> ApplianceResult<Vec<DeviceUuid>> {
        Ok(self.script.lock().unwrap().uuids.clone())
    }

    async fn list_device_interfaces(
        &self,
        server_uuid: &str,
        _tenant_id: &str,
    ) -> ApplianceResult<Vec<DeviceInterface>> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .interfaces
            .get(server_uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_interfaces(
        &self,
        device: &DeviceRef,
        _tenant_id: &str,
        slots: &[InterfaceSlotRequest],
    ) -> ApplianceResult<ProcessId> {
        let mut script = self.script.lock().unwrap();
        if let Some(message) = &script.fail_interface_update {
            return Err(ApplianceError::api("update interfaces", message));
        }
        script
            .interface_updates
            .push((device.clone(), slots.to_vec()));
        Ok(ProcessId(format!("process-{}", script.interface_updates.len())))
    }

    async fn get_process_status(
        &self,
        _process_id: &ProcessId,
        _tenant_id: &str,
    ) -> ApplianceResult<String> {
        let mut script = self.script.lock().unwrap();
        Ok(next(&mut script.process_status).unwrap_or_else(|| "ENDED".to_string()))
    }
}

/// Route `log` output through the test harness
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
