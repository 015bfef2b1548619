use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::broadcast::Broadcaster;
use crate::store::OrderStore;

// ============================================================================
// Health Monitor Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Ping the order store on an interval
// - Report broadcaster fan-out
// - Aggregate system-wide health for /health
//
// ============================================================================

pub const ORDER_STORE: &str = "order_store";
pub const BROADCASTER: &str = "broadcaster";

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

impl SystemHealth {
    pub fn to_json(&self) -> serde_json::Value {
        let components: serde_json::Map<String, serde_json::Value> = self
            .components
            .iter()
            .map(|(name, health)| (name.clone(), health.to_json()))
            .collect();

        serde_json::json!({
            "status": self.overall_status.label(),
            "reason": self.overall_status.reason(),
            "components": components,
            "checkTime": self.check_time,
        })
    }
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    store: Arc<dyn OrderStore>,
    broadcaster: Broadcaster,
    interval: Duration,
}

impl HealthMonitorActor {
    pub fn new(store: Arc<dyn OrderStore>, broadcaster: Broadcaster, interval: Duration) -> Self {
        Self {
            components: HashMap::new(),
            store,
            broadcaster,
            interval,
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !self.components.contains_key(ORDER_STORE) {
            // No ping has come back yet.
            has_degraded = true;
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }

    fn probe(&mut self, ctx: &mut Context<Self>) {
        let store = self.store.clone();
        let addr = ctx.address();

        actix::spawn(async move {
            let status = match store.ping().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            addr.do_send(UpdateHealth {
                component: ORDER_STORE.to_string(),
                status,
                details: None,
            });
        });

        let subscribers = self.broadcaster.subscriber_count();
        self.components.insert(
            BROADCASTER.to_string(),
            ComponentHealth::probed(HealthStatus::Healthy, Some(format!("{subscribers} subscribers"))),
        );
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "HealthMonitorActor started");

        self.probe(ctx);
        ctx.run_interval(self.interval, |act, ctx| act.probe(ctx));
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _: &mut Self::Context) {
        let previous = self.components.get(&msg.component).map(|h| h.status.clone());
        let health = ComponentHealth::probed(msg.status.clone(), msg.details);

        if previous.as_ref() != Some(&msg.status) {
            match &msg.status {
                HealthStatus::Healthy => {
                    tracing::info!(component = %msg.component, "Component healthy");
                }
                HealthStatus::Degraded(reason) => {
                    tracing::warn!(component = %msg.component, reason = %reason, "Component degraded");
                }
                HealthStatus::Unhealthy(reason) => {
                    tracing::error!(component = %msg.component, reason = %reason, "Component unhealthy");
                }
            }
        } else {
            tracing::debug!(
                component = %msg.component,
                status = ?msg.status,
                "Updated component health"
            );
        }

        self.components.insert(msg.component, health);
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = MessageResult<GetSystemHealth>;

    fn handle(&mut self, _msg: GetSystemHealth, _: &mut Self::Context) -> Self::Result {
        let overall_status = self.compute_overall_status();

        MessageResult(SystemHealth {
            overall_status,
            components: self.components.clone(),
            check_time: Utc::now(),
        })
    }
}
